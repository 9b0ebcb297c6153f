//! Shared types and wire format for pkgq.
//!
//! Everything here is plain data: catalog axes, glob paths, package
//! records, and crawl progress. Behaviour that needs a catalog or a cache
//! lives in `pkgq-core`.

/// Catalog content fingerprints.
pub mod fingerprint;
pub mod glob;
/// Target platform identifiers.
pub mod platform;
/// Crawl progress state machine.
pub mod progress;
/// Package metadata records.
pub mod record;
/// Catalog axes: subtrees, stabilities, prefixes, and locations.
pub mod types;
pub mod version;

// Re-exports
pub use fingerprint::Fingerprint;
pub use glob::{AttrPart, GlobPath, InvalidPathError, WILDCARD_TOKEN};
pub use platform::Platform;
pub use progress::CrawlProgress;
pub use record::PackageRecord;
pub use types::*;
