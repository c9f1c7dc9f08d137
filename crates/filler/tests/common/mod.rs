//! Shared fixtures for hydration integration tests
#![allow(dead_code)]

use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use content::{ContentHash, ContentLocator, ContentStream, LocalLocator};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use xmltree::{Element, XMLNode};

pub const HASH_A: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";
pub const HASH_B: &str = "7c4a8d09ca3762af61e59520943dc26494f8941b";
pub const HASH_MISSING: &str = "0000000000000000000000000000000000000001";
pub const HASH_EMPTY: &str = content::EMPTY_CONTENT_HASH;

/// Store `body` under the Moodle filedir layout.
pub fn store_blob(filedir: &Path, hash: &str, body: &[u8]) {
    let path = filedir.join(&hash[..2]).join(&hash[2..4]).join(hash);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

pub fn manifest_xml(hashes: &[&str]) -> String {
    let records: String = hashes
        .iter()
        .enumerate()
        .map(|(id, hash)| {
            format!(
                "<file id=\"{id}\"><contenthash>{hash}</contenthash><contextid>1</contextid><filename>file{id}.txt</filename></file>"
            )
        })
        .collect();
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<files>{records}</files>")
}

pub fn descriptor_xml(course_files: Option<&str>) -> String {
    let setting = course_files
        .map(|value| {
            format!("<setting><level>root</level><name>course_files</name><value>{value}</value></setting>")
        })
        .unwrap_or_default();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<moodle_backup><information><name>course.mbz</name><settings><setting><level>root</level><name>users</name><value>0</value></setting>{setting}</settings></information></moodle_backup>"
    )
}

/// Write a gzip tar archive with the given entries, in order.
pub fn write_backup(path: &Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for (name, body) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o640);
        header.set_mtime(1_600_000_000);
        header.set_entry_type(tar::EntryType::Regular);
        builder.append_data(&mut header, name, *body).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

/// A typical fileless backup referencing `hashes` from its manifest.
pub fn fileless_backup(path: &Path, hashes: &[&str]) {
    let manifest = manifest_xml(hashes);
    let descriptor = descriptor_xml(None);
    write_backup(
        path,
        &[
            (".ARCHIVE_INDEX", &b"3 entries\n"[..]),
            ("moodle_backup.xml", descriptor.as_bytes()),
            ("course/course.xml", &b"<course id=\"2\"/>"[..]),
            ("files.xml", manifest.as_bytes()),
            ("activities/page_3/page.xml", &b"<activity/>"[..]),
        ],
    );
}

/// Every entry of a gzip tar archive: path, mode and body.
pub fn read_backup(path: &Path) -> Vec<(String, u32, Vec<u8>)> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive
        .entries()
        .unwrap()
        .map(|entry| {
            let mut entry = entry.unwrap();
            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let mode = entry.header().mode().unwrap();
            let mut body = Vec::new();
            entry.read_to_end(&mut body).unwrap();
            (name, mode, body)
        })
        .collect()
}

pub fn entry_names(entries: &[(String, u32, Vec<u8>)]) -> Vec<&str> {
    entries.iter().map(|(name, _, _)| name.as_str()).collect()
}

pub fn entry_body<'a>(entries: &'a [(String, u32, Vec<u8>)], name: &str) -> &'a [u8] {
    entries
        .iter()
        .find(|(n, _, _)| n == name)
        .map(|(_, _, body)| body.as_slice())
        .unwrap()
}

/// Values of every `course_files` setting in a descriptor document.
pub fn course_files_values(descriptor: &[u8]) -> Vec<String> {
    let root = Element::parse(descriptor).unwrap();
    let settings = root
        .get_child("information")
        .and_then(|i| i.get_child("settings"))
        .unwrap();
    settings
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .filter(|s| {
            s.get_child("name")
                .and_then(Element::get_text)
                .is_some_and(|name| name == "course_files")
        })
        .map(|s| {
            s.get_child("value")
                .and_then(Element::get_text)
                .unwrap_or_default()
                .into_owned()
        })
        .collect()
}

/// Filesystem locator that records how often it is asked.
pub struct CountingLocator {
    inner: LocalLocator,
    calls: AtomicUsize,
}

impl CountingLocator {
    pub fn new(filedir: &Path) -> Arc<Self> {
        Arc::new(Self {
            inner: LocalLocator::new(filedir),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ContentLocator for CountingLocator {
    async fn resolve(&self, hash: &ContentHash) -> content::Result<ContentStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(hash).await
    }
}

/// Filesystem locator whose lookups of `stalled` always run out of time.
pub struct StallingLocator {
    inner: LocalLocator,
    stalled: ContentHash,
}

impl StallingLocator {
    pub fn new(filedir: &Path, stalled: &str) -> Arc<Self> {
        Arc::new(Self {
            inner: LocalLocator::new(filedir),
            stalled: ContentHash::parse(stalled).unwrap(),
        })
    }
}

#[async_trait::async_trait]
impl ContentLocator for StallingLocator {
    async fn resolve(&self, hash: &ContentHash) -> content::Result<ContentStream> {
        if *hash == self.stalled {
            return Err(content::LocatorError::Timeout {
                hash: hash.to_string(),
                attempts: 4,
            });
        }
        self.inner.resolve(hash).await
    }
}
