use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use content::ContentLocator;
use tokio::runtime::Handle;

use crate::archive::{ArchiveError, BackupReader, BackupWriter};
use crate::backup::{
    blob_hash, process_manifest, rewrite_descriptor, ArchivedBlobs, BackupError,
    ContentInjector, ManifestReport, DESCRIPTOR_NAME, INDEX_NAME, MANIFEST_NAME,
};

/// What happens to an input entry, decided from its name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    /// The archive index describes the input layout and would be stale.
    Drop,
    RewriteManifest,
    RewriteDescriptor,
    PassThrough,
}

impl EntryAction {
    pub fn for_path(path: &str) -> Self {
        match path.strip_prefix("./").unwrap_or(path) {
            INDEX_NAME => EntryAction::Drop,
            MANIFEST_NAME => EntryAction::RewriteManifest,
            DESCRIPTOR_NAME => EntryAction::RewriteDescriptor,
            _ => EntryAction::PassThrough,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HydrateReport {
    /// Entries copied unchanged
    pub copied: usize,
    /// The archive index and repeated `files/<ab>/<hash>` blobs
    pub dropped: usize,
    pub descriptor_patched: bool,
    /// `None` when the backup had no `files.xml`
    pub manifest: Option<ManifestReport>,
}

/// Counts for a directory run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub hydrated: Vec<PathBuf>,
    /// Sources whose destination was already present
    pub skipped: Vec<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum HydrateError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("files.xml is invalid: {0}")]
    ManifestInvalid(String),

    #[error("moodle_backup.xml is invalid: {0}")]
    DescriptorInvalid(String),

    #[error(transparent)]
    Xml(BackupError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("hydration task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<BackupError> for HydrateError {
    fn from(err: BackupError) -> Self {
        match err {
            BackupError::ManifestInvalid(reason) => HydrateError::ManifestInvalid(reason),
            BackupError::DescriptorInvalid(reason) => HydrateError::DescriptorInvalid(reason),
            BackupError::Archive(e) => HydrateError::Archive(e),
            other => HydrateError::Xml(other),
        }
    }
}

/// Turns fileless backups into complete ones.
///
/// All methods block; call them from `spawn_blocking` or a plain thread.
/// Content lookups are driven on the runtime behind `rt`.
#[derive(Debug, Clone)]
pub struct Hydrator {
    injector: ContentInjector,
}

impl Hydrator {
    pub fn new(locator: Arc<dyn ContentLocator>, rt: Handle) -> Self {
        Self {
            injector: ContentInjector::new(locator, rt),
        }
    }

    /// Hydrate `source` into `dest`, replacing whatever `dest` held.
    ///
    /// A failure part way leaves a truncated `dest` behind.
    pub fn hydrate(&self, source: &Path, dest: &Path) -> Result<HydrateReport, HydrateError> {
        let mut reader = BackupReader::open(source)?;
        let mut writer = BackupWriter::create(dest)?;

        let report = self.rewrite(&mut reader, &mut writer)?;

        let mut file = writer.finish()?;
        file.flush().map_err(|source| HydrateError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        Ok(report)
    }

    /// Stream every entry of `reader` into `writer`, one at a time.
    ///
    /// Each blob lands in the output once, so hydrating an already hydrated
    /// backup keeps the blobs it carries without fetching them again.
    /// Does not finish `writer`.
    pub fn rewrite<R: Read, W: Write>(
        &self,
        reader: &mut BackupReader<R>,
        writer: &mut BackupWriter<W>,
    ) -> Result<HydrateReport, HydrateError> {
        let mut report = HydrateReport::default();
        let mut archived = ArchivedBlobs::new();

        for entry in reader.entries()? {
            let mut entry = entry?;
            let header = entry.header().clone();

            match EntryAction::for_path(&header.path) {
                EntryAction::Drop => {
                    tracing::debug!(path = %header.path, "dropping entry");
                    report.dropped += 1;
                }
                EntryAction::RewriteManifest => {
                    let manifest = process_manifest(&mut entry, writer, &self.injector, &mut archived)?;
                    report.manifest = Some(manifest);
                }
                EntryAction::RewriteDescriptor => {
                    rewrite_descriptor(&mut entry, writer)?;
                    report.descriptor_patched = true;
                }
                EntryAction::PassThrough => {
                    if let Some(hash) = blob_hash(&header.path) {
                        if !archived.insert(hash) {
                            tracing::debug!(path = %header.path, "blob already written, dropping entry");
                            report.dropped += 1;
                            continue;
                        }
                    }
                    writer.write_entry(&header, &mut entry)?;
                    report.copied += 1;
                }
            }
        }

        if report.manifest.is_none() {
            tracing::warn!("backup has no {MANIFEST_NAME}, no content was injected");
        }
        if !report.descriptor_patched {
            tracing::warn!("backup has no {DESCRIPTOR_NAME}");
        }
        Ok(report)
    }

    /// Hydrate every backup in `source_dir` into `dest_dir` under the same
    /// file name, in lexical order.
    ///
    /// Hidden files are ignored and existing destinations are left alone.
    /// The first failing backup stops the run.
    pub fn hydrate_dir(&self, source_dir: &Path, dest_dir: &Path) -> Result<BatchReport, HydrateError> {
        let io_err = |source| HydrateError::Io {
            path: source_dir.to_path_buf(),
            source,
        };

        let mut names = Vec::new();
        for dirent in std::fs::read_dir(source_dir).map_err(io_err)? {
            let dirent = dirent.map_err(io_err)?;
            let name = dirent.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            if !dirent.file_type().map_err(io_err)?.is_file() {
                tracing::debug!(name = ?name, "not a regular file, skipping");
                continue;
            }
            names.push(name);
        }
        names.sort();

        let mut batch = BatchReport::default();
        for name in names {
            let source = source_dir.join(&name);
            let dest = dest_dir.join(&name);

            if dest.exists() {
                tracing::info!(source = %source.display(), "processed backup already exists, skipping");
                batch.skipped.push(source);
                continue;
            }

            tracing::info!(source = %source.display(), "processing");
            let report = self.hydrate(&source, &dest)?;
            log_report(&source, &report);
            batch.hydrated.push(source);
        }
        Ok(batch)
    }
}

/// Summary line for one finished backup.
pub fn log_report(source: &Path, report: &HydrateReport) {
    let manifest = report.manifest.clone().unwrap_or_default();
    tracing::info!(
        source = %source.display(),
        copied = report.copied,
        injected = manifest.injected,
        present = manifest.present,
        missing = manifest.missing,
        duplicates = manifest.duplicates,
        "backup hydrated"
    );
}
