use std::collections::HashSet;
use std::io::{Read, Write};

use content::ContentHash;
use xmltree::{Element, XMLNode};

use super::{serialize, ArchivedBlobs, BackupError, ContentInjector, MANIFEST_NAME};
use crate::archive::{BackupWriter, EntryHeader};

const ROOT: &str = "files";
const CONTENT_HASH: &str = "contenthash";

/// Outcome of hydrating one `files.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestReport {
    /// File records seen in the manifest
    pub records: usize,
    pub injected: usize,
    /// Distinct hashes whose blob the input archive already carried
    pub present: usize,
    /// Distinct hashes whose content could not be resolved
    pub missing: usize,
    /// Records pointing at a hash already handled
    pub duplicates: usize,
    /// Records without a usable content hash
    pub invalid: usize,
}

/// Inject the blob of every distinct hash referenced by the manifest, then
/// write the manifest itself.
///
/// Blobs land in the output in first-reference order, ahead of `files.xml`.
/// Hashes already in `archived` are not resolved again; injected ones are
/// added to it.
pub fn process_manifest<W: Write>(
    body: impl Read,
    writer: &mut BackupWriter<W>,
    injector: &ContentInjector,
    archived: &mut ArchivedBlobs,
) -> Result<ManifestReport, BackupError> {
    let root = Element::parse(body).map_err(|source| BackupError::Parse {
        name: MANIFEST_NAME,
        source,
    })?;
    if root.name != ROOT {
        return Err(BackupError::ManifestInvalid(format!(
            "expected <{ROOT}> root, found <{}>",
            root.name
        )));
    }

    let mut report = ManifestReport::default();
    let mut seen = HashSet::new();

    for record in root.children.iter().filter_map(XMLNode::as_element) {
        report.records += 1;

        let Some(hash) = record_hash(record) else {
            report.invalid += 1;
            continue;
        };
        if !seen.insert(hash.clone()) {
            report.duplicates += 1;
            continue;
        }
        if archived.contains(&hash) {
            report.present += 1;
            continue;
        }

        if injector.inject(&hash, writer)? {
            report.injected += 1;
            archived.insert(hash);
        } else {
            report.missing += 1;
        }
    }

    let bytes = serialize(&root, MANIFEST_NAME)?;
    writer.write_entry(&EntryHeader::regular(MANIFEST_NAME, bytes.len() as u64), &bytes[..])?;

    tracing::debug!(
        records = report.records,
        injected = report.injected,
        present = report.present,
        missing = report.missing,
        duplicates = report.duplicates,
        "manifest processed"
    );
    Ok(report)
}

fn record_hash(record: &Element) -> Option<ContentHash> {
    let id = record.attributes.get("id").map(String::as_str).unwrap_or("?");
    let text = record
        .get_child(CONTENT_HASH)
        .and_then(Element::get_text)
        .unwrap_or_default();

    match ContentHash::parse(&text) {
        Ok(hash) => Some(hash),
        Err(e) => {
            tracing::warn!(record = id, error = %e, "file record has no usable content hash, skipping");
            None
        }
    }
}
