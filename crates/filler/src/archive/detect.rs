const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Container formats recognized by magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// gzip-wrapped tar
    Gzip,
    Zip,
}

impl ArchiveKind {
    pub fn name(self) -> &'static str {
        match self {
            ArchiveKind::Gzip => "gzip",
            ArchiveKind::Zip => "zip",
        }
    }
}

/// Identify a container from its leading bytes.
pub fn sniff(header: &[u8]) -> Option<ArchiveKind> {
    if header.len() >= 2 && header[..2] == GZIP_MAGIC {
        return Some(ArchiveKind::Gzip);
    }
    if is_zip_magic(header) {
        return Some(ArchiveKind::Zip);
    }
    None
}

fn is_zip_magic(header: &[u8]) -> bool {
    if header.len() < 4 || header[0] != b'P' || header[1] != b'K' {
        return false;
    }
    // local file, central directory, end of central directory, spanned
    matches!((header[2], header[3]), (1, 2) | (3, 4) | (5, 6) | (7, 8))
}
