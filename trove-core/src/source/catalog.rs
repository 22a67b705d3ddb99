//! Remote catalog item source.
//!
//! Talks to a catalog service exposing `/api/item/list`, `/api/item/info`
//! and `/api/library/info`. Every response is wrapped in a
//! `{"status": "success", "data": ...}` envelope.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::directory::{DirectorySource, locate_payload};
use super::metadata::{FsFacts, MetadataRecord};
use super::{ItemSource, SourceError, SourceResult, ensure_path_safe};
use crate::item::{Item, ItemId, LightItem};

/// Default upper bound on items requested from `/api/item/list`.
pub const DEFAULT_LIST_LIMIT: usize = 100_000;

const STATUS_SUCCESS: &str = "success";

/// Catalog response envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    data: Value,
}

impl Envelope {
    fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// Item source backed by a remote catalog API.
///
/// Each enumeration keeps a snapshot of the listed records so that the
/// lookups of the same query do not issue one request per item. A plain
/// [`get_full`](ItemSource::get_full) always asks the catalog.
#[derive(Debug)]
pub struct CatalogSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    list_limit: usize,
    library_root: RwLock<Option<PathBuf>>,
    snapshot: RwLock<HashMap<ItemId, MetadataRecord>>,
}

impl CatalogSource {
    /// Create a source for the catalog at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: None,
            list_limit: DEFAULT_LIST_LIMIT,
            library_root: RwLock::new(None),
            snapshot: RwLock::new(HashMap::new()),
        }
    }

    /// Access token appended to every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Library root used to locate payloads the catalog gives no path for.
    /// When unset it is fetched from `/api/library/info` on first use.
    pub fn with_library_root(self, root: impl Into<PathBuf>) -> Self {
        *self.library_root.write() = Some(root.into());
        self
    }

    pub fn with_list_limit(mut self, limit: usize) -> Self {
        self.list_limit = limit;
        self
    }

    /// Builds an endpoint URL with the given query parameters and the token.
    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> SourceResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .and_then(|base| base.join(path))
            .map_err(|e| SourceError::Unconfigured {
                reason: format!("invalid catalog URL {:?}: {e}", self.base_url),
            })?;

        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            if let Some(token) = &self.token {
                query.append_pair("token", token);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }

    /// Issues a GET and decodes the envelope. `Ok(None)` when the catalog
    /// answers 404.
    async fn fetch(&self, url: Url) -> SourceResult<Option<Envelope>> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SourceError::Upstream {
                reason: format!("request to {} failed: {e}", url.path()),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SourceError::Upstream {
                reason: format!("{} answered HTTP {status}", url.path()),
            });
        }

        let envelope = response
            .json::<Envelope>()
            .await
            .map_err(|e| SourceError::Upstream {
                reason: format!("{} returned an unreadable body: {e}", url.path()),
            })?;
        Ok(Some(envelope))
    }

    /// Fetches a single record from `/api/item/info`.
    async fn fetch_record(&self, id: &ItemId) -> SourceResult<Option<MetadataRecord>> {
        let url = self.endpoint("/api/item/info", &[("id", id.as_str())])?;
        let Some(envelope) = self.fetch(url).await? else {
            debug!(%id, "Catalog has no such item");
            return Ok(None);
        };
        if !envelope.is_success() || envelope.data.is_null() {
            debug!(%id, status = %envelope.status, "Catalog declined item lookup");
            return Ok(None);
        }

        match MetadataRecord::from_value(envelope.data) {
            Ok(record) if record.is_deleted() => Ok(None),
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(%id, error = %e, "Malformed catalog record");
                Ok(None)
            }
        }
    }

    /// Configured library root, or the one reported by the catalog.
    async fn resolve_library_root(&self) -> SourceResult<Option<PathBuf>> {
        let configured = self.library_root.read().clone();
        if configured.is_some() {
            return Ok(configured);
        }

        let url = self.endpoint("/api/library/info", &[])?;
        let root = match self.fetch(url).await? {
            Some(envelope) if envelope.is_success() => library_path(&envelope.data),
            _ => None,
        };

        if let Some(root) = &root {
            debug!(root = %root.display(), "Catalog reported library root");
            *self.library_root.write() = Some(root.clone());
        }
        Ok(root)
    }

    /// Payload path from `filePath`, or by the directory convention under
    /// the library root.
    async fn payload_path(
        &self,
        id: &ItemId,
        record: &MetadataRecord,
    ) -> SourceResult<Option<PathBuf>> {
        if let Some(path) = record
            .fields
            .file_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
        {
            return Ok(Some(PathBuf::from(path)));
        }

        let Some(root) = self.resolve_library_root().await? else {
            warn!(%id, "Catalog gave no file path and no library root is known");
            return Ok(None);
        };

        let items_dir = DirectorySource::new(root).items_dir().await?;
        let item_dir = DirectorySource::item_dir(&items_dir, id);
        match locate_payload(&item_dir).await {
            Ok(found) => Ok(found),
            Err(e) => {
                warn!(%id, dir = %item_dir.display(), error = %e, "Failed to scan item directory");
                Ok(None)
            }
        }
    }

    /// Locates and stats the payload of a catalog record.
    async fn complete(&self, id: &ItemId, record: MetadataRecord) -> SourceResult<Option<Item>> {
        let Some(payload) = self.payload_path(id, &record).await? else {
            return Ok(None);
        };

        let facts = match tokio::fs::metadata(&payload).await {
            Ok(metadata) => Some(FsFacts::from_metadata(&metadata)),
            Err(e) => {
                debug!(%id, path = %payload.display(), error = %e, "Payload not readable locally");
                None
            }
        };

        Ok(Some(record.into_item(id.clone(), payload, facts)))
    }
}

#[async_trait]
impl ItemSource for CatalogSource {
    async fn enumerate_ids(&self) -> SourceResult<Vec<ItemId>> {
        let limit = self.list_limit.to_string();
        let url = self.endpoint("/api/item/list", &[("limit", &limit)])?;

        let envelope = self
            .fetch(url)
            .await?
            .ok_or_else(|| SourceError::Upstream {
                reason: "item list endpoint not found".to_string(),
            })?;
        if !envelope.is_success() {
            return Err(SourceError::Upstream {
                reason: format!("item list returned status {:?}", envelope.status),
            });
        }

        let records = parse_listing(envelope.data)?;
        let ids: Vec<ItemId> = records.iter().map(|(id, _)| id.clone()).collect();
        debug!(count = ids.len(), "Enumerated catalog items");

        *self.snapshot.write() = records.into_iter().collect();
        Ok(ids)
    }

    async fn get_lightweight(&self, id: &ItemId) -> SourceResult<Option<LightItem>> {
        ensure_path_safe(id)?;
        let cached = self.snapshot.read().get(id).cloned();
        let record = match cached {
            Some(record) => Some(record),
            None => self.fetch_record(id).await?,
        };
        Ok(record.map(|record| record.into_light(id.clone())))
    }

    async fn get_full(&self, id: &ItemId) -> SourceResult<Option<Item>> {
        ensure_path_safe(id)?;
        match self.fetch_record(id).await? {
            Some(record) => self.complete(id, record).await,
            None => Ok(None),
        }
    }

    async fn get_full_listed(&self, id: &ItemId) -> SourceResult<Option<Item>> {
        ensure_path_safe(id)?;
        let listed = self.snapshot.read().get(id).cloned();
        match listed {
            Some(record) => self.complete(id, record).await,
            None => self.get_full(id).await,
        }
    }

    fn library_root(&self) -> Option<PathBuf> {
        self.library_root.read().clone()
    }

    fn source_type(&self) -> &'static str {
        "catalog"
    }
}

/// Splits an item listing into identified records. Entries without an id,
/// malformed entries and deleted entries are skipped.
fn parse_listing(data: Value) -> SourceResult<Vec<(ItemId, MetadataRecord)>> {
    let Value::Array(entries) = data else {
        return Err(SourceError::Upstream {
            reason: "item list data is not an array".to_string(),
        });
    };

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let record = match MetadataRecord::from_value(entry) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Skipping malformed catalog entry");
                continue;
            }
        };
        let Some(id) = record.fields.id.clone().map(ItemId::new) else {
            warn!("Skipping catalog entry without id");
            continue;
        };
        if record.is_deleted() || !id.is_path_safe() {
            continue;
        }
        records.push((id, record));
    }
    Ok(records)
}

/// Library path from a `/api/library/info` payload.
fn library_path(data: &Value) -> Option<PathBuf> {
    data.pointer("/library/path")
        .or_else(|| data.get("path"))
        .and_then(Value::as_str)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}
