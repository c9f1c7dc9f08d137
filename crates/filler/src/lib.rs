//! Hydration of fileless Moodle course backups.
//!
//! A fileless backup lists its files in `files.xml` by content hash but does
//! not carry the blobs. [`hydrate::Hydrator`] streams such a backup into a new
//! archive, pulling each referenced blob from a [`content::ContentLocator`]
//! and marking the result as containing files.

pub mod archive;
pub mod backup;
pub mod config;
pub mod hydrate;
pub mod logging;
pub mod version;
