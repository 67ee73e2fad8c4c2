//! Reads text documents from local paths, HTTP(S) URLs or S3 objects.

mod s3;

use log::debug;
use percent_encoding::percent_decode_str;
use reqwest::StatusCode;
use std::io;
use std::path::PathBuf;
use url::Url;

use crate::http::{HttpClient, HttpError, check_status};
use crate::runtime::Runtime;

#[cfg(test)]
pub use s3::MockObjectStore;
pub use s3::{ObjectStore, S3Store};

#[derive(Debug)]
pub enum FetchError {
    /// Nothing exists at the location.
    NotFound(String),
    /// The location uses a scheme this tool cannot read.
    UnsupportedScheme { location: String, scheme: String },
    /// The location is malformed for its scheme.
    InvalidLocation(String),
    /// Reading a local file failed for another reason.
    Io {
        location: String,
        source: anyhow::Error,
    },
    /// Fetching a remote document failed.
    Http { location: String, source: HttpError },
    /// Reading an object from object storage failed.
    ObjectStore {
        location: String,
        source: anyhow::Error,
    },
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::NotFound(location) => write!(f, "Nothing found at {}", location),
            FetchError::UnsupportedScheme { location, scheme } => {
                write!(f, "Unsupported scheme '{}' in {}", scheme, location)
            }
            FetchError::InvalidLocation(location) => write!(f, "Invalid location {}", location),
            FetchError::Io { location, source } | FetchError::ObjectStore { location, source } => {
                write!(f, "Failed to read {}: {:#}", location, source)
            }
            FetchError::Http { location, source } => {
                write!(f, "Failed to fetch {}: {}", location, source)
            }
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Io { source, .. } | FetchError::ObjectStore { source, .. } => {
                Some(&**source)
            }
            FetchError::Http { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Where a document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Disk(PathBuf),
    Remote(Url),
    S3 { bucket: String, key: String },
}

impl Location {
    /// Plain paths and `file://` URLs are read from disk, `http(s)://` URLs
    /// are fetched, `s3://bucket/key` is read from S3; anything else is rejected.
    pub fn parse(location: &str) -> Result<Self, FetchError> {
        let url = match Url::parse(location) {
            Ok(url) => url,
            Err(_) => return Ok(Location::Disk(PathBuf::from(location))),
        };

        match url.scheme() {
            "http" | "https" => Ok(Location::Remote(url)),
            "file" => url
                .to_file_path()
                .map(Location::Disk)
                .map_err(|_| FetchError::InvalidLocation(location.to_string())),
            "s3" => {
                let bucket = url.host_str().unwrap_or_default();
                let key = url.path().strip_prefix('/').unwrap_or(url.path());
                let key = decode(key)
                    .ok_or_else(|| FetchError::InvalidLocation(location.to_string()))?;
                if bucket.is_empty() || key.is_empty() {
                    return Err(FetchError::InvalidLocation(location.to_string()));
                }
                Ok(Location::S3 {
                    bucket: bucket.to_string(),
                    key,
                })
            }
            // Windows drive letters parse as a one-letter scheme
            scheme if scheme.len() == 1 => Ok(Location::Disk(PathBuf::from(location))),
            scheme => Err(FetchError::UnsupportedScheme {
                location: location.to_string(),
                scheme: scheme.to_string(),
            }),
        }
    }
}

fn decode(text: &str) -> Option<String> {
    percent_decode_str(text)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Returns the text stored at `location`.
///
/// Credentials embedded in an HTTP(S) URL are sent as Basic auth. `http`
/// should carry no credential of its own.
#[tracing::instrument(skip(runtime, http, objects))]
pub async fn fetch_contents<R, S>(
    runtime: &R,
    http: &HttpClient,
    objects: &S,
    location: &str,
) -> Result<String, FetchError>
where
    R: Runtime + ?Sized,
    S: ObjectStore + ?Sized,
{
    match Location::parse(location)? {
        Location::Disk(path) => {
            debug!("Reading {} from disk...", path.display());
            runtime.read_to_string(&path).map_err(|source| {
                let not_found = source
                    .downcast_ref::<io::Error>()
                    .is_some_and(|e| e.kind() == io::ErrorKind::NotFound);
                if not_found {
                    FetchError::NotFound(location.to_string())
                } else {
                    FetchError::Io {
                        location: location.to_string(),
                        source,
                    }
                }
            })
        }
        Location::Remote(url) => fetch_remote(http, location, url).await,
        Location::S3 { bucket, key } => {
            debug!("Reading s3://{}/{}...", bucket, key);
            match objects.get_object(&bucket, &key).await {
                Ok(Some(contents)) => Ok(contents),
                Ok(None) => Err(FetchError::NotFound(location.to_string())),
                Err(source) => Err(FetchError::ObjectStore {
                    location: location.to_string(),
                    source,
                }),
            }
        }
    }
}

async fn fetch_remote(http: &HttpClient, location: &str, mut url: Url) -> Result<String, FetchError> {
    // Userinfo is kept percent-encoded by the parser
    let invalid = || FetchError::InvalidLocation(location.to_string());
    let username = decode(url.username()).ok_or_else(invalid)?;
    let password = match url.password() {
        Some(password) => Some(decode(password).ok_or_else(invalid)?),
        None => None,
    };
    // Userinfo travels as a header, not in the request line
    let _ = url.set_username("");
    let _ = url.set_password(None);

    debug!("Fetching {}...", url);

    let mut request = http.get(url.as_str());
    if !username.is_empty() {
        request = request.basic_auth(username, password);
    }

    let http_error = |source| FetchError::Http {
        location: location.to_string(),
        source,
    };

    let response = http.send(request).await.map_err(http_error)?;
    if response.status() == StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound(location.to_string()));
    }
    let response = check_status(response).await.map_err(http_error)?;
    response
        .text()
        .await
        .map_err(|e| http_error(HttpError::Body(e)))
}
