use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{EntryType, Header};

use super::{ArchiveError, EntryHeader};

/// Streaming gzip-compressed tar writer.
pub struct BackupWriter<W: Write> {
    builder: tar::Builder<GzEncoder<W>>,
}

impl BackupWriter<BufWriter<File>> {
    /// Create (or truncate) the destination. Nothing is cleaned up if the
    /// run later fails.
    pub fn create(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::create(path).map_err(|source| ArchiveError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> BackupWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            builder: tar::Builder::new(GzEncoder::new(writer, Compression::default())),
        }
    }

    /// Write one entry, streaming exactly `header.size` bytes from `body`.
    pub fn write_entry(&mut self, header: &EntryHeader, body: impl Read) -> Result<(), ArchiveError> {
        let mut raw = Header::new_gnu();
        raw.set_size(header.size);
        raw.set_mode(header.mode);
        raw.set_mtime(header.mtime);
        raw.set_entry_type(EntryType::new(header.type_flag));

        if let Some(target) = &header.link_name {
            self.builder.append_link(&mut raw, &header.path, target)?;
            return Ok(());
        }

        let mut body = Counted::new(body.take(header.size));
        self.builder.append_data(&mut raw, &header.path, &mut body)?;
        if body.count != header.size {
            return Err(ArchiveError::ShortBody {
                path: header.path.clone(),
                expected: header.size,
                actual: body.count,
            });
        }
        Ok(())
    }

    /// Write the tar trailer and gzip footer, returning the inner writer.
    pub fn finish(self) -> Result<W, ArchiveError> {
        let encoder = self.builder.into_inner()?;
        Ok(encoder.finish()?)
    }
}

struct Counted<R> {
    inner: R,
    count: u64,
}

impl<R> Counted<R> {
    fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }
}

impl<R: Read> Read for Counted<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::archive::BackupReader;

    #[test]
    fn test_preserves_headers() {
        let header = EntryHeader {
            path: "course/course.xml".to_string(),
            size: 3,
            mode: 0o600,
            mtime: 1_500_000_000,
            type_flag: b'0',
            link_name: None,
        };
        let link = EntryHeader {
            path: "course/latest".to_string(),
            size: 0,
            mode: 0o777,
            mtime: 1_500_000_001,
            type_flag: b'2',
            link_name: Some(PathBuf::from("course.xml")),
        };

        let mut writer = BackupWriter::new(Vec::new());
        writer.write_entry(&header, &b"abc"[..]).unwrap();
        writer.write_entry(&link, io::empty()).unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = BackupReader::from_gzip(&bytes[..]);
        let headers: Vec<EntryHeader> = reader
            .entries()
            .unwrap()
            .map(|e| e.unwrap().header().clone())
            .collect();
        assert_eq!(headers, vec![header, link]);
    }

    #[test]
    fn test_long_paths() {
        let path = format!("activities/{}/inforef.xml", "x".repeat(150));
        let header = EntryHeader::regular(path.clone(), 2);

        let mut writer = BackupWriter::new(Vec::new());
        writer.write_entry(&header, &b"ok"[..]).unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = BackupReader::from_gzip(&bytes[..]);
        let entry = reader.entries().unwrap().next().unwrap().unwrap();
        assert_eq!(entry.header().path, path);
    }

    #[test]
    fn test_short_body_is_an_error() {
        let mut writer = BackupWriter::new(Vec::new());
        let err = writer
            .write_entry(&EntryHeader::regular("a.txt", 10), &b"abc"[..])
            .unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::ShortBody {
                expected: 10,
                actual: 3,
                ..
            }
        ));
    }
}
