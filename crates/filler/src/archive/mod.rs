//! Sequential read/rewrite of backup archives.
//!
//! Only gzip-compressed tar is handled. Zip backups are recognized by their
//! magic bytes and refused, so they fail loudly instead of being
//! mistreated as corrupt input.

mod detect;
mod reader;
mod writer;

use std::path::PathBuf;

pub use detect::{sniff, ArchiveKind};
pub use reader::{BackupEntries, BackupEntry, BackupReader};
pub use writer::BackupWriter;

/// Regular file type flag.
pub const TYPE_REGULAR: u8 = b'0';

/// Metadata of one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Archive-relative path
    pub path: String,
    pub size: u64,
    pub mode: u32,
    /// Seconds since the epoch
    pub mtime: u64,
    /// Raw tar type flag
    pub type_flag: u8,
    /// Target of hard/symbolic links
    pub link_name: Option<PathBuf>,
}

impl EntryHeader {
    /// Header for a regular file created now with mode `0644`.
    pub fn regular(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            mode: 0o644,
            mtime: chrono::Utc::now().timestamp().max(0) as u64,
            type_flag: TYPE_REGULAR,
            link_name: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("unable to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} formatted backups are not supported")]
    Unsupported(&'static str),

    #[error("unrecognized archive format: {0}")]
    UnrecognizedFormat(PathBuf),

    #[error("entry {path} is truncated: expected {expected} bytes, got {actual}")]
    ShortBody {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),
}
