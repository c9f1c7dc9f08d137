use std::io::Write;
use std::sync::Arc;

use content::{ContentHash, ContentLocator, ContentStream};
use tokio::runtime::Handle;

use super::BackupError;
use crate::archive::{BackupWriter, EntryHeader};

/// Resolves content hashes and appends the blobs to an output archive.
///
/// Runs on a blocking thread; lookups are driven on `rt`.
#[derive(Clone)]
pub struct ContentInjector {
    locator: Arc<dyn ContentLocator>,
    rt: Handle,
}

impl ContentInjector {
    pub fn new(locator: Arc<dyn ContentLocator>, rt: Handle) -> Self {
        Self { locator, rt }
    }

    /// Append the blob for `hash` at `files/<ab>/<hash>`.
    ///
    /// Returns `Ok(false)` when the content could not be resolved; the backup
    /// is still usable without it. Failures while writing are fatal.
    pub fn inject<W: Write>(
        &self,
        hash: &ContentHash,
        writer: &mut BackupWriter<W>,
    ) -> Result<bool, BackupError> {
        let stream = match self.resolve(hash) {
            Some(stream) => stream,
            None => return Ok(false),
        };

        let header = EntryHeader::regular(hash.archive_path(), stream.size());
        tracing::debug!(hash = %hash, size = header.size, "injecting content");
        writer.write_entry(&header, stream.into_blocking(self.rt.clone()))?;
        Ok(true)
    }

    fn resolve(&self, hash: &ContentHash) -> Option<ContentStream> {
        if hash.is_empty_content() {
            return Some(ContentStream::empty());
        }
        match self.rt.block_on(self.locator.resolve(hash)) {
            Ok(stream) => Some(stream),
            Err(e) => {
                tracing::warn!(hash = %hash, error = %e, "unable to read file content, skipping");
                None
            }
        }
    }
}

impl std::fmt::Debug for ContentInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentInjector").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use content::LocalLocator;

    use super::*;
    use crate::archive::BackupReader;

    const HASH: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";

    fn read_back(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut reader = BackupReader::from_gzip(bytes);
        reader
            .entries()
            .unwrap()
            .map(|e| {
                let mut entry = e.unwrap();
                let mut body = Vec::new();
                entry.read_to_end(&mut body).unwrap();
                (entry.header().path.clone(), body)
            })
            .collect()
    }

    #[test]
    fn test_inject_from_filedir() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let temp_dir = tempfile::tempdir().unwrap();
        let blob = temp_dir.path().join("2a/ae").join(HASH);
        std::fs::create_dir_all(blob.parent().unwrap()).unwrap();
        std::fs::write(&blob, b"hello world").unwrap();

        let injector = ContentInjector::new(
            Arc::new(LocalLocator::new(temp_dir.path())),
            rt.handle().clone(),
        );
        let mut writer = BackupWriter::new(Vec::new());
        let hash = ContentHash::parse(HASH).unwrap();
        assert!(injector.inject(&hash, &mut writer).unwrap());
        let bytes = writer.finish().unwrap();

        assert_eq!(
            read_back(&bytes),
            vec![(format!("files/2a/{HASH}"), b"hello world".to_vec())]
        );
    }

    #[test]
    fn test_missing_content_writes_nothing() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let temp_dir = tempfile::tempdir().unwrap();

        let injector = ContentInjector::new(
            Arc::new(LocalLocator::new(temp_dir.path())),
            rt.handle().clone(),
        );
        let mut writer = BackupWriter::new(Vec::new());
        let hash = ContentHash::parse(HASH).unwrap();
        assert!(!injector.inject(&hash, &mut writer).unwrap());
        let bytes = writer.finish().unwrap();

        assert!(read_back(&bytes).is_empty());
    }

    #[test]
    fn test_empty_hash_needs_no_backend() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let injector = ContentInjector::new(
            Arc::new(LocalLocator::new("/nonexistent/filedir")),
            rt.handle().clone(),
        );
        let mut writer = BackupWriter::new(Vec::new());
        assert!(injector.inject(&ContentHash::empty(), &mut writer).unwrap());
        let bytes = writer.finish().unwrap();

        assert_eq!(
            read_back(&bytes),
            vec![(
                "files/da/da39a3ee5e6b4b0d3255bfef95601890afd80709".to_string(),
                Vec::new()
            )]
        );
    }
}
