//! Directory-convention item source.
//!
//! Layout on disk:
//!
//! ```text
//! <library>/images/<id>.info/metadata.json
//! <library>/images/<id>.info/<payload file>
//! <library>/images/<id>.info/<name>_thumbnail.png
//! ```
//!
//! The `images/` level is optional; when it does not exist the `.info`
//! directories are expected directly under the library root.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::metadata::{FsFacts, MetadataRecord};
use super::{ItemSource, SourceError, SourceResult, ensure_path_safe};
use crate::item::{Item, ItemId, LightItem};
use crate::media_type::{FileKind, extension_of};

const ITEMS_SUBDIR: &str = "images";
const ITEM_DIR_SUFFIX: &str = ".info";
const METADATA_FILE: &str = "metadata.json";
const THUMBNAIL_SUFFIX: &str = "_thumbnail";

/// Reads items from the `<id>.info/` directory convention.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Creates a source rooted at the library directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the `.info` folders.
    ///
    /// # Errors
    /// - `SourceError::Unconfigured` - Library root missing or not a directory
    pub async fn items_dir(&self) -> SourceResult<PathBuf> {
        match tokio::fs::metadata(&self.root).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                return Err(SourceError::Unconfigured {
                    reason: format!("{} is not a directory", self.root.display()),
                });
            }
            Err(e) => {
                return Err(SourceError::Unconfigured {
                    reason: format!("library root {} unavailable: {e}", self.root.display()),
                });
            }
        }

        let nested = self.root.join(ITEMS_SUBDIR);
        match tokio::fs::metadata(&nested).await {
            Ok(metadata) if metadata.is_dir() => Ok(nested),
            _ => Ok(self.root.clone()),
        }
    }

    /// Path of the directory that holds one item.
    pub fn item_dir(items_dir: &Path, id: &ItemId) -> PathBuf {
        items_dir.join(format!("{id}{ITEM_DIR_SUFFIX}"))
    }

    /// Reads and parses `metadata.json`. Missing, unreadable, malformed or
    /// deleted entries yield `None`.
    async fn read_metadata(&self, id: &ItemId) -> SourceResult<Option<(PathBuf, MetadataRecord)>> {
        ensure_path_safe(id)?;
        let item_dir = Self::item_dir(&self.items_dir().await?, id);
        let metadata_path = item_dir.join(METADATA_FILE);

        let bytes = match tokio::fs::read(&metadata_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(%id, path = %metadata_path.display(), "No metadata file");
                return Ok(None);
            }
            Err(e) => {
                warn!(%id, path = %metadata_path.display(), error = %e, "Failed to read metadata");
                return Ok(None);
            }
        };

        let record = match MetadataRecord::parse(&bytes) {
            Ok(record) => record,
            Err(e) => {
                warn!(%id, path = %metadata_path.display(), error = %e, "Malformed metadata");
                return Ok(None);
            }
        };

        if record.is_deleted() {
            debug!(%id, "Item is marked deleted");
            return Ok(None);
        }

        Ok(Some((item_dir, record)))
    }
}

#[async_trait]
impl ItemSource for DirectorySource {
    async fn enumerate_ids(&self) -> SourceResult<Vec<ItemId>> {
        let items_dir = self.items_dir().await?;
        let io_error = |source| SourceError::Io {
            path: items_dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&items_dir).await.map_err(io_error)?;
        let mut ids = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let is_dir = entry
                .file_type()
                .await
                .map(|file_type| file_type.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }

            let file_name = entry.file_name();
            let Some(stem) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(ITEM_DIR_SUFFIX))
            else {
                continue;
            };

            let id = ItemId::new(stem);
            if id.is_path_safe() {
                ids.push(id);
            }
        }

        ids.sort();
        debug!(count = ids.len(), dir = %items_dir.display(), "Enumerated library items");
        Ok(ids)
    }

    async fn get_lightweight(&self, id: &ItemId) -> SourceResult<Option<LightItem>> {
        Ok(self
            .read_metadata(id)
            .await?
            .map(|(_, record)| record.into_light(id.clone())))
    }

    async fn get_full(&self, id: &ItemId) -> SourceResult<Option<Item>> {
        let Some((item_dir, record)) = self.read_metadata(id).await? else {
            return Ok(None);
        };

        let payload = match locate_payload(&item_dir).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                warn!(%id, dir = %item_dir.display(), "No payload file in item directory");
                return Ok(None);
            }
            Err(e) => {
                warn!(%id, dir = %item_dir.display(), error = %e, "Failed to scan item directory");
                return Ok(None);
            }
        };

        let facts = match tokio::fs::metadata(&payload).await {
            Ok(metadata) => Some(FsFacts::from_metadata(&metadata)),
            Err(e) => {
                warn!(%id, path = %payload.display(), error = %e, "Failed to stat payload");
                None
            }
        };

        Ok(Some(record.into_item(id.clone(), payload, facts)))
    }

    fn library_root(&self) -> Option<PathBuf> {
        Some(self.root.clone())
    }

    fn source_type(&self) -> &'static str {
        "directory"
    }
}

/// Picks the payload file of an item directory.
///
/// Rule: among the regular files, sorted by file name, the first that is
/// neither a `.json` sidecar nor a generated thumbnail image.
pub(crate) async fn locate_payload(item_dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(item_dir).await?;
    let mut first: Option<PathBuf> = None;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        if is_sidecar(&path) {
            continue;
        }
        if first.as_ref().is_none_or(|current| path < *current) {
            first = Some(path);
        }
    }

    Ok(first)
}

fn is_sidecar(path: &Path) -> bool {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let extension = extension_of(file_name);
    if extension == ".json" {
        return true;
    }

    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    stem.ends_with(THUMBNAIL_SUFFIX) && FileKind::from_extension(&extension) == FileKind::Image
}
