//! Item sources: where library entries come from.
//!
//! Two interchangeable production implementations exist: [`DirectorySource`]
//! walks the `<id>.info/` directory convention on disk, [`CatalogSource`]
//! queries a remote catalog API. Both produce the same [`Item`] shape.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::LibraryConfig;
use crate::item::{Item, ItemId, LightItem};
use crate::source_kind::SourceKind;

pub mod catalog;
pub mod directory;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
mod metadata;

pub use catalog::CatalogSource;
pub use directory::DirectorySource;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemorySource;

/// Errors raised by item sources.
///
/// "No such item" is not an error: lookups return `Ok(None)` for missing or
/// malformed entries.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The library path or catalog is not available yet.
    #[error("Library is not configured: {reason}")]
    Unconfigured {
        /// Why the library is unavailable
        reason: String,
    },

    /// The remote catalog failed or answered with an error.
    #[error("Catalog request failed: {reason}")]
    Upstream {
        /// Description of the upstream failure
        reason: String,
    },

    /// Filesystem access failed for a reason other than "not found".
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path that could not be read
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The identifier cannot name an item (empty, or contains path syntax).
    #[error("Invalid item identifier: {id:?}")]
    InvalidId {
        /// The rejected identifier
        id: String,
    },
}

impl SourceError {
    pub fn is_upstream(&self) -> bool {
        matches!(self, SourceError::Upstream { .. })
    }

    pub fn is_unconfigured(&self) -> bool {
        matches!(self, SourceError::Unconfigured { .. })
    }
}

/// Result type for item source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Origin of library items.
///
/// Implementations must return a fresh snapshot from every
/// [`enumerate_ids`](ItemSource::enumerate_ids) call and must tolerate items
/// disappearing between enumeration and lookup.
#[async_trait]
pub trait ItemSource: Send + Sync + std::fmt::Debug {
    /// Lists every currently known item identifier.
    ///
    /// # Errors
    /// - `SourceError::Unconfigured` - Library path or catalog not available
    /// - `SourceError::Upstream` - Catalog request failed
    /// - `SourceError::Io` - Library directory could not be read
    async fn enumerate_ids(&self) -> SourceResult<Vec<ItemId>>;

    /// Fetches only what filtering needs. Never reads the payload.
    ///
    /// # Errors
    /// - `SourceError::InvalidId` - Identifier is not usable
    /// - `SourceError::Unconfigured` - Library path or catalog not available
    /// - `SourceError::Upstream` - Catalog request failed
    async fn get_lightweight(&self, id: &ItemId) -> SourceResult<Option<LightItem>>;

    /// Fetches the complete record including payload location and size.
    ///
    /// # Errors
    /// - `SourceError::InvalidId` - Identifier is not usable
    /// - `SourceError::Unconfigured` - Library path or catalog not available
    /// - `SourceError::Upstream` - Catalog request failed
    async fn get_full(&self, id: &ItemId) -> SourceResult<Option<Item>>;

    /// Full lookup of an id returned by an enumeration of the running query.
    /// Sources that already hold the listed record may answer from it; the
    /// default asks again.
    ///
    /// # Errors
    /// Same as [`get_full`](ItemSource::get_full).
    async fn get_full_listed(&self, id: &ItemId) -> SourceResult<Option<Item>> {
        self.get_full(id).await
    }

    /// Root directory of the library, when known.
    fn library_root(&self) -> Option<PathBuf>;

    /// Short name of this source type, for logs and service info.
    fn source_type(&self) -> &'static str;
}

/// Placeholder used until the host supplies a library.
///
/// Every call fails with [`SourceError::Unconfigured`].
#[derive(Debug, Clone)]
pub struct UnconfiguredSource {
    reason: String,
}

impl UnconfiguredSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> SourceError {
        SourceError::Unconfigured {
            reason: self.reason.clone(),
        }
    }
}

#[async_trait]
impl ItemSource for UnconfiguredSource {
    async fn enumerate_ids(&self) -> SourceResult<Vec<ItemId>> {
        Err(self.error())
    }

    async fn get_lightweight(&self, _id: &ItemId) -> SourceResult<Option<LightItem>> {
        Err(self.error())
    }

    async fn get_full(&self, _id: &ItemId) -> SourceResult<Option<Item>> {
        Err(self.error())
    }

    fn library_root(&self) -> Option<PathBuf> {
        None
    }

    fn source_type(&self) -> &'static str {
        "unconfigured"
    }
}

/// Builds the source described by the library configuration.
///
/// Missing settings produce an [`UnconfiguredSource`] rather than an error so
/// the server can still start and answer with 503.
pub fn from_config(config: &LibraryConfig) -> Arc<dyn ItemSource> {
    match config.source {
        SourceKind::Directory => match &config.path {
            Some(path) => Arc::new(DirectorySource::new(path.clone())),
            None => Arc::new(UnconfiguredSource::new("no library path configured")),
        },
        SourceKind::Catalog => match &config.catalog_url {
            Some(url) => {
                let mut source =
                    CatalogSource::new(url.clone()).with_list_limit(config.catalog_list_limit);
                if let Some(token) = &config.catalog_token {
                    source = source.with_token(token.clone());
                }
                if let Some(path) = &config.path {
                    source = source.with_library_root(path.clone());
                }
                Arc::new(source)
            }
            None => Arc::new(UnconfiguredSource::new("no catalog URL configured")),
        },
    }
}

/// Rejects identifiers that cannot safely name an item.
pub(crate) fn ensure_path_safe(id: &ItemId) -> SourceResult<()> {
    if id.is_path_safe() {
        Ok(())
    } else {
        Err(SourceError::InvalidId {
            id: id.as_str().to_string(),
        })
    }
}
