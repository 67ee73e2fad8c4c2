//! Errors surfaced by [`HttpClient`](super::HttpClient).

use reqwest::{Response, StatusCode};

#[derive(Debug)]
pub enum HttpError {
    /// The request could not be built or failed in a way retrying won't fix.
    Request(reqwest::Error),
    /// The transport kept failing until the retry budget ran out.
    Transport {
        url: String,
        attempts: usize,
        source: reqwest::Error,
    },
    /// The server answered with a status outside 2xx.
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    /// The response body could not be read or decoded.
    Body(reqwest::Error),
}

impl HttpError {
    /// Consumes a response into a [`HttpError::Status`], keeping its body for diagnostics.
    pub async fn from_response(response: Response) -> Self {
        let url = response.url().to_string();
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        HttpError::Status { url, status, body }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the server could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, HttpError::Transport { .. })
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::Request(source) => write!(f, "Request error: {}", source),
            HttpError::Transport {
                url,
                attempts,
                source,
            } => write!(
                f,
                "Connection to {} failed after {} attempts: {}",
                url, attempts, source
            ),
            HttpError::Status { url, status, body } => {
                if body.is_empty() {
                    write!(f, "HTTP {} from {}", status, url)
                } else {
                    write!(f, "HTTP {} from {}: {}", status, url, body)
                }
            }
            HttpError::Body(source) => write!(f, "Failed to read response body: {}", source),
        }
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HttpError::Request(source)
            | HttpError::Transport { source, .. }
            | HttpError::Body(source) => Some(source),
            HttpError::Status { .. } => None,
        }
    }
}

/// Passes 2xx responses through and turns everything else into [`HttpError::Status`].
pub async fn check_status(response: Response) -> Result<Response, HttpError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(HttpError::from_response(response).await)
    }
}
