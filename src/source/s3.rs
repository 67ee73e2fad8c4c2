//! Object storage reads.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::operation::get_object::GetObjectError;
use tokio::sync::OnceCell;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Text of the object at `key`, or `None` when the bucket has no such key.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<String>>;
}

/// S3 access through the default AWS credential and region chain.
///
/// The SDK configuration is loaded on first use, so runs that never touch
/// S3 never look for AWS credentials.
#[derive(Default)]
pub struct S3Store {
    client: OnceCell<Client>,
}

impl S3Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client: OnceCell::from(client),
        }
    }

    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| async {
                let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
                Client::new(&config)
            })
            .await
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    #[tracing::instrument(skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<String>> {
        let result = self
            .client()
            .await
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(GetObjectError::is_no_such_key) => {
                return Ok(None);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to get s3://{}/{}", bucket, key));
            }
        };

        let bytes = output
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read s3://{}/{}", bucket, key))?
            .into_bytes();
        let text = String::from_utf8(bytes.to_vec())
            .with_context(|| format!("s3://{}/{} is not valid UTF-8", bucket, key))?;
        Ok(Some(text))
    }
}
