//! Credentials and the password fallback used to find a working client.

use log::{debug, error, info, warn};
use reqwest::Client;
use std::future::Future;

use crate::http::{HttpClient, RetryPolicy};
use crate::nexus::{ConnectError, NexusClient};
use crate::runtime::Runtime;
use crate::source::{FetchError, ObjectStore, fetch_contents};

/// Username the tool logs in with unless told otherwise.
pub const DEFAULT_USER: &str = "admin";

/// A username and password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// Splits a credential file into passwords, in file order.
///
/// Trailing whitespace is dropped; blank lines are skipped.
pub fn parse_credential_file(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns the primary password followed by the ones in `credential_file`.
///
/// A credential file that does not exist is logged and ignored.
#[tracing::instrument(skip(runtime, http, objects, primary))]
pub async fn collect_passwords<R, S>(
    runtime: &R,
    http: &HttpClient,
    objects: &S,
    primary: &str,
    credential_file: Option<&str>,
) -> Result<Vec<String>, FetchError>
where
    R: Runtime + ?Sized,
    S: ObjectStore + ?Sized,
{
    let mut passwords = vec![primary.to_string()];

    if let Some(location) = credential_file {
        match fetch_contents(runtime, http, objects, location).await {
            Ok(contents) => {
                let extra = parse_credential_file(&contents);
                debug!("Read {} passwords from {}", extra.len(), location);
                passwords.extend(extra);
            }
            Err(FetchError::NotFound(_)) => {
                warn!("No credential file found at {}. Ignoring", location);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(passwords)
}

/// Tries each password in order and returns the first client that connects.
///
/// Rejected credentials and connection failures are logged and the next
/// password is tried; passwords after the accepted one are never used.
/// Any other failure ends the search and is returned as is. `Ok(None)` means
/// every password was tried without success.
pub async fn first_accepted<T, F, Fut>(
    host: &str,
    user: &str,
    passwords: &[String],
    mut connect: F,
) -> Result<Option<T>, ConnectError>
where
    F: FnMut(Credential) -> Fut,
    Fut: Future<Output = Result<T, ConnectError>>,
{
    for (index, password) in passwords.iter().enumerate() {
        debug!("Trying credential {}/{} for {}", index + 1, passwords.len(), user);

        match connect(Credential::new(user, password.as_str())).await {
            Ok(client) => {
                info!("Authenticated to {} as {}", host, user);
                return Ok(Some(client));
            }
            Err(ConnectError::Unauthorized { .. }) => {
                warn!("Credential attempted and was rejected");
            }
            Err(e @ ConnectError::Connectivity { .. }) => {
                error!(
                    "Connection attempted to {} but failed multiple times: {:?}",
                    host, e
                );
            }
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// Returns a client for `host` using the first accepted password.
#[tracing::instrument(skip(client, passwords, policy))]
pub async fn nexus_client(
    client: Client,
    host: &str,
    user: &str,
    passwords: &[String],
    policy: RetryPolicy,
) -> Result<Option<NexusClient>, ConnectError> {
    first_accepted(host, user, passwords, |credential| {
        NexusClient::connect(client.clone(), host, credential, policy.clone())
    })
    .await
}
