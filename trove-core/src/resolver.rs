//! Resolution of identifiers to streamable payloads.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::item::{Item, ItemId};
use crate::media_type::{FileKind, extension_of, mime_for_extension};
use crate::source::{ItemSource, SourceError};

/// Errors raised while resolving a payload.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No metadata exists for the identifier.
    #[error("Item not found: {id}")]
    NotFound {
        /// The requested identifier
        id: ItemId,
    },

    /// Metadata exists but the payload file is gone.
    #[error("Payload for item {id} is missing at {}", path.display())]
    PayloadMissing {
        /// The requested identifier
        id: ItemId,
        /// Where the payload was expected
        path: PathBuf,
    },

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// A payload that was verified to exist at resolution time.
#[derive(Debug, Clone)]
pub struct PayloadHandle {
    pub item: Item,
    pub path: PathBuf,
    /// Byte length from the filesystem at resolution time.
    pub size: u64,
    pub mime_type: String,
    pub kind: FileKind,
    /// Download name including the extension.
    pub filename: String,
}

/// Resolves items lazily on each request. Nothing is cached.
#[derive(Debug, Clone)]
pub struct ItemResolver {
    source: Arc<dyn ItemSource>,
}

impl ItemResolver {
    pub fn new(source: Arc<dyn ItemSource>) -> Self {
        Self { source }
    }

    /// Looks up `id` and verifies its payload.
    ///
    /// # Errors
    /// - `ResolveError::NotFound` - No metadata for this identifier
    /// - `ResolveError::PayloadMissing` - Payload file no longer exists
    /// - `ResolveError::Source` - Source failed (unconfigured, upstream, invalid id)
    pub async fn resolve(&self, id: &ItemId) -> Result<PayloadHandle, ResolveError> {
        let item = self
            .source
            .get_full(id)
            .await?
            .ok_or_else(|| ResolveError::NotFound { id: id.clone() })?;
        self.resolve_payload(item).await
    }

    /// Verifies that the payload of an already loaded item still exists and
    /// derives its serving attributes.
    ///
    /// # Errors
    /// - `ResolveError::PayloadMissing` - Payload file no longer exists
    /// - `ResolveError::Source` - Payload could not be inspected
    pub async fn resolve_payload(&self, item: Item) -> Result<PayloadHandle, ResolveError> {
        let path = item.payload.clone();
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => {
                warn!(id = %item.id, path = %path.display(), "Payload is not a regular file");
                return Err(ResolveError::PayloadMissing { id: item.id, path });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(id = %item.id, path = %path.display(), "Payload missing");
                return Err(ResolveError::PayloadMissing { id: item.id, path });
            }
            Err(source) => {
                warn!(id = %item.id, path = %path.display(), error = %source, "Failed to stat payload");
                return Err(SourceError::Io { path, source }.into());
            }
        };

        let extension = if item.extension.is_empty() {
            extension_of(&path.to_string_lossy())
        } else {
            item.extension.clone()
        };

        Ok(PayloadHandle {
            size: metadata.len(),
            mime_type: mime_for_extension(&extension),
            kind: FileKind::from_extension(&extension),
            filename: download_name(&item.name, &extension),
            path,
            item,
        })
    }
}

/// Item name with the extension appended unless it already ends with it.
fn download_name(name: &str, extension: &str) -> String {
    if extension.is_empty() || extension_of(name) == extension {
        name.to_string()
    } else {
        format!("{name}{extension}")
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::source::MemorySource;

    #[test]
    fn test_download_name() {
        assert_eq!(download_name("Sunset", ".png"), "Sunset.png");
        assert_eq!(download_name("Sunset.PNG", ".png"), "Sunset.PNG");
        assert_eq!(download_name("notes", ""), "notes");
    }

    #[tokio::test]
    async fn test_resolves_existing_payload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"0123456789abcdef").unwrap();

        let item = Item::new("V", "Holiday clip", &path).with_extension("mp4").with_size(3);
        let resolver = ItemResolver::new(Arc::new(MemorySource::with_items([item])));

        let handle = resolver.resolve(&ItemId::new("V")).await.unwrap();
        assert_eq!(handle.size, 16);
        assert_eq!(handle.mime_type, "video/mp4");
        assert_eq!(handle.kind, FileKind::Video);
        assert_eq!(handle.filename, "Holiday clip.mp4");
        assert_eq!(handle.path, path);
    }

    #[tokio::test]
    async fn test_unknown_extension_is_octet_stream() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.qqq");
        std::fs::write(&path, b"x").unwrap();

        let resolver = ItemResolver::new(Arc::new(MemorySource::new()));
        let handle = resolver
            .resolve_payload(Item::new("Q", "blob.qqq", &path))
            .await
            .unwrap();
        assert_eq!(handle.mime_type, "application/octet-stream");
        assert_eq!(handle.kind, FileKind::Other);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let resolver = ItemResolver::new(Arc::new(MemorySource::new()));
        let err = resolver.resolve(&ItemId::new("nope")).await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_deleted_payload_is_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.png");
        std::fs::write(&path, b"x").unwrap();
        let source = Arc::new(MemorySource::with_items([Item::new("G", "gone.png", &path)]));
        let resolver = ItemResolver::new(source);

        std::fs::remove_file(&path).unwrap();
        let err = resolver.resolve(&ItemId::new("G")).await.unwrap_err();
        assert!(matches!(err, ResolveError::PayloadMissing { .. }));
    }

    #[tokio::test]
    async fn test_directory_payload_is_missing() {
        let dir = TempDir::new().unwrap();
        let resolver = ItemResolver::new(Arc::new(MemorySource::new()));
        let err = resolver
            .resolve_payload(Item::new("D", "dir", dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::PayloadMissing { .. }));
    }

    #[tokio::test]
    async fn test_source_errors_pass_through() {
        let source = MemorySource::new();
        source.set_upstream_failure(true);
        let resolver = ItemResolver::new(Arc::new(source));
        let err = resolver.resolve(&ItemId::new("A")).await.unwrap_err();
        assert!(matches!(err, ResolveError::Source(SourceError::Upstream { .. })));
    }
}
