pub mod hydrate;
pub mod version;

pub use hydrate::Hydrate;
pub use version::Version;
