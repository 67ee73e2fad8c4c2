use crate::http::HttpError;

/// Why a [`NexusClient`](super::NexusClient) could not be constructed.
#[derive(Debug)]
pub enum ConnectError {
    /// The host is empty or cannot serve as a base URL.
    InvalidHost(String),
    /// The health check answered 401 for this credential.
    Unauthorized { host: String, user: String },
    /// The host could not be reached even after retrying.
    Connectivity { host: String, source: HttpError },
    /// Any other failure of the health check.
    Http(HttpError),
}

impl ConnectError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ConnectError::Unauthorized { .. })
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, ConnectError::Connectivity { .. })
    }
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectError::InvalidHost(host) => write!(f, "Invalid Nexus host '{}'", host),
            ConnectError::Unauthorized { host, user } => {
                write!(f, "Credentials for user '{}' rejected by {}", user, host)
            }
            ConnectError::Connectivity { host, source } => {
                write!(f, "Could not connect to {}: {}", host, source)
            }
            ConnectError::Http(source) => write!(f, "Health check failed: {}", source),
        }
    }
}

impl std::error::Error for ConnectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectError::Connectivity { source, .. } | ConnectError::Http(source) => Some(source),
            _ => None,
        }
    }
}
