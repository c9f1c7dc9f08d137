//! S3 backend, keyed like a Moodle `filedir`.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectStore, RetryConfig};
use tokio::sync::OnceCell;
use tokio_util::io::StreamReader;

use crate::credentials::ChainCredentials;
use crate::error::{LocatorError, Result};
use crate::fetch::{FetchError, ResilientFetch, TtfbPolicy};
use crate::hash::ContentHash;
use crate::locator::ContentLocator;
use crate::stream::ContentStream;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

/// Connection settings for the S3 backend.
#[derive(Debug, Clone)]
pub struct S3Settings {
    /// Bucket name
    pub bucket: String,
    /// Optional key prefix in front of the `ab/cd/hash` layout
    pub prefix: Option<String>,
    /// Bucket region; falls back to `AWS_REGION`/`AWS_DEFAULT_REGION`
    pub region: Option<String>,
    /// Role assumed via STS before reading
    pub assume_role_arn: Option<String>,
    pub ttfb: TtfbPolicy,
}

/// Reads blobs from S3 through [`ResilientFetch`].
///
/// The client (and its credentials) is created on first use and shared by
/// every later call.
#[derive(Debug)]
pub struct S3Locator {
    settings: S3Settings,
    fetch: ResilientFetch,
    store: OnceCell<Arc<dyn ObjectStore>>,
}

impl S3Locator {
    pub fn new(settings: S3Settings) -> Self {
        Self {
            fetch: ResilientFetch::new(settings.ttfb),
            settings,
            store: OnceCell::new(),
        }
    }

    /// Use an already constructed store instead of connecting to S3.
    pub fn with_store(store: Arc<dyn ObjectStore>, settings: S3Settings) -> Self {
        Self {
            fetch: ResilientFetch::new(settings.ttfb),
            settings,
            store: OnceCell::new_with(Some(store)),
        }
    }

    async fn store(&self) -> Result<&Arc<dyn ObjectStore>> {
        self.store.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<Arc<dyn ObjectStore>> {
        let credentials = ChainCredentials::resolve(
            self.settings.region.as_deref(),
            self.settings.assume_role_arn.as_deref(),
        )
        .await?;

        let store = s3_builder(&self.settings)
            .with_credentials(Arc::new(credentials))
            .build()
            .map_err(|e| LocatorError::InvalidConfig(e.to_string()))?;
        tracing::info!(bucket = %self.settings.bucket, "connected to object storage");

        Ok(Arc::new(store))
    }

    fn key(&self, hash: &ContentHash) -> ObjectPath {
        match &self.settings.prefix {
            Some(prefix) => ObjectPath::from(format!("{}/{}", prefix, hash.shard_path())),
            None => ObjectPath::from(hash.shard_path()),
        }
    }
}

/// Client setup shared by every S3 connection.
///
/// The request timeout covers the whole body, so it is sized for the largest
/// blobs. Retries are left to [`ResilientFetch`]: a rejected request is
/// reported at once and a stalled one is retried under its deadline.
fn s3_builder(settings: &S3Settings) -> AmazonS3Builder {
    let client = ClientOptions::new()
        .with_connect_timeout(CONNECT_TIMEOUT)
        .with_timeout(REQUEST_TIMEOUT);
    let retry = RetryConfig {
        max_retries: 0,
        ..RetryConfig::default()
    };

    let mut builder = AmazonS3Builder::from_env()
        .with_bucket_name(&settings.bucket)
        .with_client_options(client)
        .with_retry(retry);
    if let Some(region) = &settings.region {
        builder = builder.with_region(region);
    }
    builder
}

#[async_trait::async_trait]
impl ContentLocator for S3Locator {
    async fn resolve(&self, hash: &ContentHash) -> Result<ContentStream> {
        if hash.is_empty_content() {
            return Ok(ContentStream::empty());
        }

        let store = self.store().await?;
        let key = self.key(hash);

        let result = match self.fetch.run(|| store.get(&key)).await {
            Ok(result) => result,
            Err(FetchError::Rejected(object_store::Error::NotFound { .. })) => {
                return Err(LocatorError::NotFound(hash.to_string()));
            }
            Err(FetchError::Rejected(e)) => return Err(e.into()),
            Err(FetchError::Timeout { attempts, elapsed }) => {
                tracing::warn!(
                    %key,
                    attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "object storage request timed out"
                );
                return Err(LocatorError::Timeout {
                    hash: hash.to_string(),
                    attempts,
                });
            }
        };

        let size = result.meta.size as u64;
        let body = result
            .into_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));

        Ok(ContentStream::new(size, StreamReader::new(body)))
    }
}
