use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use url::Url;

use crate::error::{LocatorError, Result};
use crate::fetch::TtfbPolicy;
use crate::hash::ContentHash;
use crate::http::HttpLocator;
use crate::local::LocalLocator;
use crate::s3::{S3Locator, S3Settings};
use crate::stream::ContentStream;

/// Resolves content hashes to byte streams.
#[async_trait::async_trait]
pub trait ContentLocator: Send + Sync {
    async fn resolve(&self, hash: &ContentHash) -> Result<ContentStream>;
}

/// Backend-specific knobs that do not fit in the content base string.
#[derive(Debug, Clone, Default)]
pub struct LocatorSettings {
    /// Region of the S3 bucket
    pub s3_region: Option<String>,
    /// Role assumed on top of the environment/instance credentials
    pub s3_assume_role_arn: Option<String>,
    /// Retry schedule for S3 reads
    pub ttfb: TtfbPolicy,
}

/// Where content lives, decided once from the configured scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBase {
    /// Moodle `filedir` on local disk
    Local(PathBuf),
    /// `base/<hash>` over HTTP(S); always ends with `/`
    Http(Url),
    /// `s3://bucket[/prefix]`
    S3 {
        bucket: String,
        prefix: Option<String>,
    },
}

impl ContentBase {
    /// Construct the locator for this base.
    pub fn build(&self, settings: LocatorSettings) -> Result<Arc<dyn ContentLocator>> {
        let locator: Arc<dyn ContentLocator> = match self {
            ContentBase::Local(root) => Arc::new(LocalLocator::new(root.clone())),
            ContentBase::Http(base) => Arc::new(HttpLocator::new(base.clone())?),
            ContentBase::S3 { bucket, prefix } => Arc::new(S3Locator::new(S3Settings {
                bucket: bucket.clone(),
                prefix: prefix.clone(),
                region: settings.s3_region,
                assume_role_arn: settings.s3_assume_role_arn,
                ttfb: settings.ttfb,
            })),
        };
        tracing::debug!(base = %self, "content locator ready");
        Ok(locator)
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ContentBase::Local(_))
    }
}

impl FromStr for ContentBase {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(LocatorError::InvalidConfig(
                "content base must not be empty".to_string(),
            ));
        }

        if let Some(rest) = s.strip_prefix("s3://") {
            let rest = rest.trim_matches('/');
            let (bucket, prefix) = match rest.split_once('/') {
                Some((bucket, prefix)) => (bucket, Some(prefix.to_string())),
                None => (rest, None),
            };
            if bucket.is_empty() {
                return Err(LocatorError::InvalidConfig(format!(
                    "no bucket in content base {:?}",
                    s
                )));
            }
            return Ok(ContentBase::S3 {
                bucket: bucket.to_string(),
                prefix,
            });
        }

        if s.starts_with("http://") || s.starts_with("https://") {
            let normalized = if s.ends_with('/') {
                s.to_string()
            } else {
                format!("{}/", s)
            };
            let url = Url::parse(&normalized)
                .map_err(|e| LocatorError::InvalidConfig(format!("{}: {}", s, e)))?;
            return Ok(ContentBase::Http(url));
        }

        Ok(ContentBase::Local(PathBuf::from(s)))
    }
}

impl fmt::Display for ContentBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentBase::Local(root) => write!(f, "{}", root.display()),
            ContentBase::Http(url) => write!(f, "{}", url),
            ContentBase::S3 {
                bucket,
                prefix: Some(prefix),
            } => write!(f, "s3://{}/{}", bucket, prefix),
            ContentBase::S3 {
                bucket,
                prefix: None,
            } => write!(f, "s3://{}", bucket),
        }
    }
}
