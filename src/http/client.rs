//! HTTP client with built-in retry logic and session-level credentials.

use log::{debug, warn};
use reqwest::{Client, Method, RequestBuilder, Response};
use std::time::Duration;

use super::error::HttpError;
use super::retry::{RetryPolicy, is_retryable_transport};
use crate::credentials::Credential;

/// Timeout applied to every single request, independent of the retry policy.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Builds the underlying reqwest client shared by every session.
pub fn default_client() -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(concat!("nexus-configurator/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// HTTP client that retries transient failures with exponential backoff.
///
/// When a credential is attached, every request built through this client
/// carries it as HTTP Basic auth.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    policy: RetryPolicy,
    credential: Option<Credential>,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Starts a request with the session timeout and credentials applied.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url).timeout(REQUEST_TIMEOUT);
        match &self.credential {
            Some(credential) => {
                builder.basic_auth(credential.username(), Some(credential.password()))
            }
            None => builder,
        }
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// Sends a request, retrying connection failures, timeouts and
    /// retryable statuses according to the policy.
    ///
    /// Non-retryable responses are returned as-is, whatever their status.
    /// Once the retries are used up the last failure is returned as an error.
    #[tracing::instrument(skip(self, request))]
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, HttpError> {
        let request = request.build().map_err(HttpError::Request)?;
        let method = request.method().clone();
        let url = request.url().to_string();
        let max_attempts = self.policy.max_attempts();

        debug!("{} {}...", method, url);

        let mut attempt = 1;
        loop {
            let Some(current) = request.try_clone() else {
                debug!("{} {}: body cannot be replayed, sending once", method, url);
                return self
                    .client
                    .execute(request)
                    .await
                    .map_err(HttpError::Request);
            };

            let exhausted = attempt >= max_attempts;
            let reason = match self.client.execute(current).await {
                Ok(response) if self.policy.is_retryable_status(response.status()) => {
                    if exhausted {
                        return Err(HttpError::from_response(response).await);
                    }
                    format!("status {}", response.status())
                }
                Ok(response) => return Ok(response),
                Err(source) if is_retryable_transport(&source) => {
                    if exhausted {
                        return Err(HttpError::Transport {
                            url,
                            attempts: attempt,
                            source,
                        });
                    }
                    source.to_string()
                }
                Err(source) => return Err(HttpError::Request(source)),
            };

            let delay = self.policy.backoff(attempt);
            warn!(
                "{} {}: attempt {}/{} failed ({}), retrying in {}ms...",
                method,
                url,
                attempt,
                max_attempts,
                reason,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
