//! Filesystem backend over a Moodle `filedir` layout.

use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::{LocatorError, Result};
use crate::hash::ContentHash;
use crate::locator::ContentLocator;
use crate::stream::ContentStream;

#[derive(Debug, Clone)]
pub struct LocalLocator {
    root: PathBuf,
}

impl LocalLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        self.root.join(hash.shard_path())
    }
}

#[async_trait::async_trait]
impl ContentLocator for LocalLocator {
    async fn resolve(&self, hash: &ContentHash) -> Result<ContentStream> {
        if hash.is_empty_content() {
            return Ok(ContentStream::empty());
        }

        let path = self.blob_path(hash);
        let io_err = |source: std::io::Error| match source.kind() {
            ErrorKind::NotFound => LocatorError::NotFound(hash.to_string()),
            _ => LocatorError::Io {
                path: path.clone(),
                source,
            },
        };

        let meta = tokio::fs::metadata(&path).await.map_err(io_err)?;
        if !meta.is_file() {
            return Err(LocatorError::NotFound(hash.to_string()));
        }
        let file = tokio::fs::File::open(&path).await.map_err(io_err)?;

        Ok(ContentStream::new(meta.len(), file))
    }
}
