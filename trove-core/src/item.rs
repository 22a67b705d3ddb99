//! Library item model shared by every source.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media_type::{FileKind, extension_of, normalize_extension};

/// Opaque identifier assigned to an item by the external library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id can be used as a single path component.
    ///
    /// Sources that map ids onto the filesystem refuse anything else so a
    /// request can never escape the library root.
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && self.0 != "."
            && !self.0.contains("..")
            && !self.0.contains(['/', '\\', '\0'])
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Read access to the fields consulted by filter predicates.
///
/// Implemented by both [`LightItem`] and [`Item`] so the same predicate runs
/// before and after full resolution.
pub trait Filterable {
    /// Display name.
    fn name(&self) -> &str;
    /// Normalized extension (`.png`), empty when unknown.
    fn extension(&self) -> &str;
    /// Tags with their original casing.
    fn tags(&self) -> &[String];
    /// Folders with their original casing.
    fn folders(&self) -> &[String];
    /// Serialized metadata blob searched by keyword filters.
    fn metadata_text(&self) -> &str;
}

/// Fields needed to evaluate a filter, without touching the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct LightItem {
    pub id: ItemId,
    pub name: String,
    pub extension: String,
    pub tags: Vec<String>,
    pub folders: Vec<String>,
    pub metadata: String,
}

impl Filterable for LightItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn folders(&self) -> &[String] {
        &self.folders
    }

    fn metadata_text(&self) -> &str {
        &self.metadata
    }
}

/// Fully resolved library entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub extension: String,
    pub kind: FileKind,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub folders: Vec<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub metadata: String,
    /// Where the payload bytes live. Never serialized to clients.
    pub payload: PathBuf,
}

impl Item {
    /// Creates an item whose extension and kind are derived from `name`.
    ///
    /// Remaining fields start empty and are filled with the `with_*` helpers.
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>, payload: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let extension = extension_of(&name);
        Self {
            id: id.into(),
            kind: FileKind::from_extension(&extension),
            extension,
            name,
            size: 0,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            modified_at: DateTime::<Utc>::UNIX_EPOCH,
            tags: Vec::new(),
            folders: Vec::new(),
            width: None,
            height: None,
            metadata: String::new(),
            payload: payload.into(),
        }
    }

    /// Overrides the derived extension (and kind).
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = normalize_extension(extension);
        self.kind = FileKind::from_extension(&self.extension);
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_folders<I, S>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.folders = folders.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_times(mut self, created_at: DateTime<Utc>, modified_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.modified_at = modified_at;
        self
    }

    /// Sets dimensions; ignored for non-visual kinds.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        if self.kind.is_visual() {
            self.width = Some(width);
            self.height = Some(height);
        }
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Projects the filter-relevant fields.
    pub fn light(&self) -> LightItem {
        LightItem {
            id: self.id.clone(),
            name: self.name.clone(),
            extension: self.extension.clone(),
            tags: self.tags.clone(),
            folders: self.folders.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Client-facing view without the payload location.
    pub fn summary(&self) -> ItemSummary {
        ItemSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            size: self.size,
            created: self.created_at,
            modified: self.modified_at,
            tags: self.tags.clone(),
            folders: self.folders.clone(),
            ext: self.extension.clone(),
            width: self.width,
            height: self.height,
        }
    }
}

impl Filterable for Item {
    fn name(&self) -> &str {
        &self.name
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn folders(&self) -> &[String] {
        &self.folders
    }

    fn metadata_text(&self) -> &str {
        &self.metadata
    }
}

/// JSON shape of an item in list and random responses.
///
/// Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: ItemId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub size: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub modified: DateTime<Utc>,
    pub tags: Vec<String>,
    pub folders: Vec<String>,
    pub ext: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}
