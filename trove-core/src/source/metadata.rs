//! Stored item metadata as written by the library (`metadata.json`) and as
//! returned by the catalog API. Both use the same camelCase record.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::item::{Item, ItemId, LightItem};
use crate::media_type::{FileKind, extension_of, normalize_extension};

/// One metadata record. Every field is optional; unknown fields stay in the
/// raw blob kept alongside.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct StoredMetadata {
    pub id: Option<String>,
    pub name: Option<String>,
    pub ext: Option<String>,
    pub size: Option<u64>,
    pub tags: Option<Vec<String>>,
    pub folders: Option<Vec<String>>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Creation time, epoch milliseconds.
    pub btime: Option<i64>,
    /// Modification time, epoch milliseconds.
    pub mtime: Option<i64>,
    pub modification_time: Option<i64>,
    pub last_modified: Option<i64>,
    pub is_deleted: Option<bool>,
    /// Absolute payload path, supplied by some catalogs.
    pub file_path: Option<String>,
}

/// Metadata plus the serialized blob searched by keyword filters.
#[derive(Debug, Clone)]
pub(crate) struct MetadataRecord {
    pub fields: StoredMetadata,
    pub text: String,
}

impl MetadataRecord {
    /// Parses raw JSON bytes.
    pub fn parse(bytes: &[u8]) -> serde_json::Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Interprets an already decoded JSON value.
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        let text = value.to_string();
        let fields = serde_json::from_value(value)?;
        Ok(Self { fields, text })
    }

    pub fn is_deleted(&self) -> bool {
        self.fields.is_deleted.unwrap_or(false)
    }

    /// Display name, falling back to the identifier.
    fn name(&self, id: &ItemId) -> String {
        self.fields
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string())
    }

    /// Explicit `ext` wins over the one derived from the name.
    fn extension(&self, name: &str) -> String {
        self.fields
            .ext
            .as_deref()
            .map(normalize_extension)
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| extension_of(name))
    }

    pub fn into_light(self, id: ItemId) -> LightItem {
        let name = self.name(&id);
        LightItem {
            extension: self.extension(&name),
            name,
            tags: self.fields.tags.unwrap_or_default(),
            folders: self.fields.folders.unwrap_or_default(),
            metadata: self.text,
            id,
        }
    }

    /// Merges stored metadata with filesystem facts about the payload.
    ///
    /// Timestamps prefer the library's values; size prefers the filesystem.
    pub fn into_item(self, id: ItemId, payload: PathBuf, facts: Option<FsFacts>) -> Item {
        let name = self.name(&id);
        let extension = self.extension(&name);
        let kind = FileKind::from_extension(&extension);
        let fields = self.fields;

        let created_at = fields
            .btime
            .and_then(DateTime::from_timestamp_millis)
            .or_else(|| facts.as_ref().and_then(|f| f.created.or(f.modified)))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let modified_at = fields
            .mtime
            .or(fields.modification_time)
            .or(fields.last_modified)
            .and_then(DateTime::from_timestamp_millis)
            .or_else(|| facts.as_ref().and_then(|f| f.modified))
            .unwrap_or(created_at);
        let size = facts
            .as_ref()
            .map(|f| f.size)
            .or(fields.size)
            .unwrap_or(0);
        let (width, height) = if kind.is_visual() {
            (fields.width, fields.height)
        } else {
            (None, None)
        };

        Item {
            id,
            name,
            extension,
            kind,
            size,
            created_at,
            modified_at,
            tags: fields.tags.unwrap_or_default(),
            folders: fields.folders.unwrap_or_default(),
            width,
            height,
            metadata: self.text,
            payload,
        }
    }
}

/// What the filesystem knows about a payload file.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FsFacts {
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl FsFacts {
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        Self {
            size: metadata.len(),
            created: metadata.created().ok().map(DateTime::<Utc>::from),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "K1",
        "name": "Harbour at dusk",
        "ext": "JPG",
        "size": 999,
        "tags": ["Sea", "evening"],
        "folders": ["F1"],
        "width": 4000,
        "height": 3000,
        "btime": 1700000000000,
        "mtime": 1700000500000,
        "annotation": "taken from the pier",
        "palettes": [{"color": [1, 2, 3]}]
    }"#;

    #[test]
    fn test_light_projection() {
        let record = MetadataRecord::parse(SAMPLE.as_bytes()).unwrap();
        let light = record.into_light(ItemId::new("K1"));

        assert_eq!(light.name, "Harbour at dusk");
        assert_eq!(light.extension, ".jpg");
        assert_eq!(light.tags, vec!["Sea", "evening"]);
        assert_eq!(light.folders, vec!["F1"]);
        assert!(light.metadata.contains("taken from the pier"));
    }

    #[test]
    fn test_library_timestamps_win_filesystem_size_wins() {
        let record = MetadataRecord::parse(SAMPLE.as_bytes()).unwrap();
        let facts = FsFacts {
            size: 12,
            created: DateTime::from_timestamp(1, 0),
            modified: DateTime::from_timestamp(2, 0),
        };
        let item = record.into_item(ItemId::new("K1"), "/x/K1.info/a.jpg".into(), Some(facts));

        assert_eq!(item.size, 12);
        assert_eq!(item.created_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(item.modified_at.timestamp_millis(), 1_700_000_500_000);
        assert_eq!(item.kind, FileKind::Image);
        assert_eq!((item.width, item.height), (Some(4000), Some(3000)));
    }

    #[test]
    fn test_filesystem_fallbacks() {
        let record = MetadataRecord::parse(br#"{"name": "clip.mp3", "width": 10}"#).unwrap();
        let facts = FsFacts {
            size: 42,
            created: None,
            modified: DateTime::from_timestamp(50, 0),
        };
        let item = record.into_item(ItemId::new("C"), "/x/C.info/clip.mp3".into(), Some(facts));

        assert_eq!(item.extension, ".mp3");
        assert_eq!(item.size, 42);
        assert_eq!(item.created_at.timestamp(), 50);
        assert_eq!(item.modified_at.timestamp(), 50);
        assert_eq!(item.width, None);
    }

    #[test]
    fn test_library_size_when_file_unreadable() {
        let record = MetadataRecord::parse(br#"{"name": "a", "ext": "png", "size": 7}"#).unwrap();
        let item = record.into_item(ItemId::new("A"), "/gone".into(), None);
        assert_eq!(item.size, 7);
        assert_eq!(item.created_at, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_nulls_are_tolerated() {
        let record =
            MetadataRecord::parse(br#"{"name": null, "tags": null, "folders": null}"#).unwrap();
        let light = record.into_light(ItemId::new("Z"));
        assert_eq!(light.name, "Z");
        assert!(light.tags.is_empty());
        assert!(light.folders.is_empty());
    }

    #[test]
    fn test_deleted_flag() {
        let record = MetadataRecord::parse(br#"{"isDeleted": true}"#).unwrap();
        assert!(record.is_deleted());
        let record = MetadataRecord::parse(br#"{}"#).unwrap();
        assert!(!record.is_deleted());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(MetadataRecord::parse(b"{not json").is_err());
        assert!(MetadataRecord::parse(br#"{"tags": "not-a-list"}"#).is_err());
    }
}
