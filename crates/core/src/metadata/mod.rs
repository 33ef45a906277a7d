//! Store metadata: the remote source, the on-disk cache in front of it, and
//! background enrichment of discovered records.

/// Per-id metadata and image cache.
pub mod cache;
/// Background enrichment and update publishing.
pub mod enrich;
/// Remote store access.
pub mod source;

pub use cache::{resolve_cache_dir, CachedMetadata, MetadataCache};
pub use enrich::{EnrichmentEngine, EnrichmentUpdate, MetadataPatch};
pub use source::{parse_app_details, MetadataSource, SteamStoreClient, StoreApp};
