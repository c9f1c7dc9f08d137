use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::GzDecoder;

use super::detect::{sniff, ArchiveKind};
use super::{ArchiveError, EntryHeader};

const SNIFF_LEN: usize = 512;

/// Streaming reader over a gzip-compressed tar backup.
pub struct BackupReader<R: Read> {
    archive: tar::Archive<GzDecoder<R>>,
}

impl BackupReader<BufReader<File>> {
    /// Open a backup, choosing the container by content rather than name.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let open_err = |source| ArchiveError::Open {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(open_err)?;
        let mut head = [0u8; SNIFF_LEN];
        let n = read_up_to(&mut file, &mut head).map_err(open_err)?;
        file.seek(SeekFrom::Start(0)).map_err(open_err)?;

        match sniff(&head[..n]) {
            Some(ArchiveKind::Gzip) => Ok(Self::from_gzip(BufReader::new(file))),
            Some(kind) => Err(ArchiveError::Unsupported(kind.name())),
            None => Err(ArchiveError::UnrecognizedFormat(path.to_path_buf())),
        }
    }
}

impl<R: Read> BackupReader<R> {
    /// Wrap a reader already known to hold gzip data.
    pub fn from_gzip(reader: R) -> Self {
        Self {
            archive: tar::Archive::new(GzDecoder::new(reader)),
        }
    }

    /// Iterate entries in archive order.
    pub fn entries(&mut self) -> Result<BackupEntries<'_, R>, ArchiveError> {
        Ok(BackupEntries {
            inner: self.archive.entries()?,
        })
    }
}

/// Entry iterator. Advancing skips whatever is left of the previous body.
pub struct BackupEntries<'a, R: Read> {
    inner: tar::Entries<'a, GzDecoder<R>>,
}

impl<'a, R: Read> Iterator for BackupEntries<'a, R> {
    type Item = Result<BackupEntry<'a, R>, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.inner.next()? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(e.into())),
        };
        Some(BackupEntry::new(entry))
    }
}

/// The current entry: its header, and its body via [`Read`].
pub struct BackupEntry<'a, R: Read> {
    header: EntryHeader,
    inner: tar::Entry<'a, GzDecoder<R>>,
}

impl<'a, R: Read> BackupEntry<'a, R> {
    fn new(inner: tar::Entry<'a, GzDecoder<R>>) -> Result<Self, ArchiveError> {
        let path = String::from_utf8_lossy(&inner.path_bytes()).into_owned();
        let raw = inner.header();
        let header = EntryHeader {
            path,
            size: inner.size(),
            mode: raw.mode()?,
            mtime: raw.mtime()?,
            type_flag: raw.entry_type().as_byte(),
            link_name: inner.link_name()?.map(|p| p.into_owned()),
        };
        Ok(Self { header, inner })
    }

    pub fn header(&self) -> &EntryHeader {
        &self.header
    }
}

impl<R: Read> Read for BackupEntry<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::archive::BackupWriter;

    fn sample_archive() -> Vec<u8> {
        let mut writer = BackupWriter::new(Vec::new());
        writer
            .write_entry(&EntryHeader::regular("a.txt", 5), &b"hello"[..])
            .unwrap();
        writer
            .write_entry(&EntryHeader::regular("b.txt", 5), &b"world"[..])
            .unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn test_unread_body_is_skipped() {
        let bytes = sample_archive();
        let mut reader = BackupReader::from_gzip(&bytes[..]);

        let mut entries = reader.entries().unwrap();
        let mut first = entries.next().unwrap().unwrap();
        assert_eq!(first.header().path, "a.txt");
        let mut partial = [0u8; 2];
        first.read_exact(&mut partial).unwrap();
        assert_eq!(&partial, b"he");
        drop(first);

        let mut second = entries.next().unwrap().unwrap();
        assert_eq!(second.header().path, "b.txt");
        let mut body = String::new();
        second.read_to_string(&mut body).unwrap();
        assert_eq!(body, "world");
        drop(second);

        assert!(entries.next().is_none());
    }

    #[test]
    fn test_open_rejects_zip_and_garbage() {
        let temp_dir = tempfile::tempdir().unwrap();

        let zip_path = temp_dir.path().join("backup.mbz");
        std::fs::File::create(&zip_path)
            .unwrap()
            .write_all(b"PK\x03\x04\x14\x00\x00\x00")
            .unwrap();
        assert!(matches!(
            BackupReader::open(&zip_path),
            Err(ArchiveError::Unsupported("zip"))
        ));

        let text_path = temp_dir.path().join("notes.txt");
        std::fs::write(&text_path, b"not an archive").unwrap();
        assert!(matches!(
            BackupReader::open(&text_path),
            Err(ArchiveError::UnrecognizedFormat(_))
        ));

        let missing = temp_dir.path().join("missing.mbz");
        assert!(matches!(
            BackupReader::open(&missing),
            Err(ArchiveError::Open { .. })
        ));
    }

    #[test]
    fn test_open_gzip_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("backup.mbz");
        std::fs::write(&path, sample_archive()).unwrap();

        let mut reader = BackupReader::open(&path).unwrap();
        let names: Vec<String> = reader
            .entries()
            .unwrap()
            .map(|e| e.unwrap().header().path.clone())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }
}
