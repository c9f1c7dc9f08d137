use std::fmt;
use std::io::Read;

use tokio::io::AsyncRead;
use tokio::runtime::Handle;
use tokio_util::io::SyncIoBridge;

type Body = Box<dyn AsyncRead + Send + Unpin>;

/// A resolved blob: a readable body plus the size it declared.
///
/// The caller owns the stream; dropping it releases the underlying file
/// handle or connection.
pub struct ContentStream {
    size: u64,
    body: Body,
}

impl ContentStream {
    pub fn new(size: u64, body: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            size,
            body: Box::new(body),
        }
    }

    /// Zero-length stream, synthesized for the empty content hash.
    pub fn empty() -> Self {
        Self::new(0, tokio::io::empty())
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn into_reader(self) -> Body {
        self.body
    }

    /// Bridge the body into a blocking reader driven by `rt`.
    ///
    /// Must be called off the runtime's worker threads (for example inside
    /// `spawn_blocking`).
    pub fn into_blocking(self, rt: Handle) -> impl Read + Send {
        SyncIoBridge::new_with_handle(self.body, rt)
    }
}

impl fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStream")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
