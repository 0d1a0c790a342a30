//! Connection Metadata
//!
//! Versioned, per-(account, region) records of what is deployed and how it
//! is configured. Owns the on-disk format and its migrations.

mod migration;
mod store;
mod types;

pub use migration::{is_legacy_shape, parse_document, FormatError, LegacyConnectionMetadata, StoredDocument};
pub use store::{LoadResult, MetadataStore, StoreError};
pub use types::*;
