//! Content-addressed blob retrieval
//!
//! This crate resolves Moodle content hashes to sized byte streams. The
//! backend is picked once from the configured content base:
//!
//! - a local directory laid out like a Moodle `filedir` (`ab/cd/abcd...`)
//! - an HTTP endpoint serving `base/<hash>`
//! - an S3 bucket keyed like `filedir`, read through a time-to-first-byte
//!   guarded retry loop
//!
//! # Example
//!
//! ```rust,no_run
//! use content::{ContentBase, ContentHash, LocatorSettings};
//!
//! # async fn example() -> Result<(), content::LocatorError> {
//! let base: ContentBase = "/var/moodledata/filedir".parse()?;
//! let locator = base.build(LocatorSettings::default())?;
//!
//! let hash = ContentHash::parse("2aae6c35c94fcfb415dbe95f408b9ce91ee846ed")?;
//! let stream = locator.resolve(&hash).await?;
//! println!("{} bytes", stream.size());
//! # Ok(())
//! # }
//! ```

mod credentials;
mod error;
mod fetch;
mod hash;
mod http;
mod local;
mod locator;
mod s3;
mod stream;

pub use error::{LocatorError, Result};
pub use fetch::{FetchError, ResilientFetch, TtfbPolicy};
pub use hash::{ContentHash, EMPTY_CONTENT_HASH};
pub use http::HttpLocator;
pub use local::LocalLocator;
pub use locator::{ContentBase, ContentLocator, LocatorSettings};
pub use s3::{S3Locator, S3Settings};
pub use stream::ContentStream;
