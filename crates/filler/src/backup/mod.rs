//! Moodle backup documents that need rewriting during hydration.
//!
//! - `files.xml` lists every file record with its content hash; the
//!   referenced blobs are injected right before the manifest is written back.
//! - `moodle_backup.xml` carries the `course_files` setting that marks a
//!   backup as containing files.

mod descriptor;
mod inject;
mod manifest;

use std::collections::HashSet;

use content::ContentHash;
use xmltree::Element;

use crate::archive::ArchiveError;

pub use descriptor::{patch_descriptor, rewrite_descriptor};
pub use inject::ContentInjector;
pub use manifest::{process_manifest, ManifestReport};

pub const MANIFEST_NAME: &str = "files.xml";
pub const DESCRIPTOR_NAME: &str = "moodle_backup.xml";
pub const INDEX_NAME: &str = ".ARCHIVE_INDEX";

/// Hashes whose blob the output archive already holds, shared by the
/// pass-through entries and the manifest injection of one run.
pub type ArchivedBlobs = HashSet<ContentHash>;

/// The hash stored at `path` when it names a `files/<ab>/<hash>` blob.
pub fn blob_hash(path: &str) -> Option<ContentHash> {
    let path = path.strip_prefix("./").unwrap_or(path);
    let name = path.rsplit('/').next()?;
    let hash = ContentHash::parse(name).ok()?;
    (hash.archive_path() == path).then_some(hash)
}

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("files.xml is invalid: {0}")]
    ManifestInvalid(String),

    #[error("moodle_backup.xml is invalid: {0}")]
    DescriptorInvalid(String),

    #[error("unable to parse {name}: {source}")]
    Parse {
        name: &'static str,
        #[source]
        source: xmltree::ParseError,
    },

    #[error("{name} could not be regenerated: {source}")]
    Serialize {
        name: &'static str,
        #[source]
        source: xmltree::Error,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

fn serialize(root: &Element, name: &'static str) -> Result<Vec<u8>, BackupError> {
    let mut buf = Vec::new();
    root.write(&mut buf)
        .map_err(|source| BackupError::Serialize { name, source })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";

    #[test]
    fn test_blob_hash() {
        let hash = ContentHash::parse(HASH).unwrap();
        assert_eq!(blob_hash(&format!("files/2a/{HASH}")), Some(hash.clone()));
        assert_eq!(blob_hash(&format!("./files/2a/{HASH}")), Some(hash));

        assert_eq!(blob_hash(&format!("files/7c/{HASH}")), None);
        assert_eq!(blob_hash(&format!("files/2a/ae/{HASH}")), None);
        assert_eq!(blob_hash(&format!("activities/2a/{HASH}")), None);
        assert_eq!(blob_hash("files/2a/readme.txt"), None);
        assert_eq!(blob_hash("files.xml"), None);
    }
}
