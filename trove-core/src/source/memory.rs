//! In-memory item source for tests.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ItemSource, SourceError, SourceResult};
use crate::item::{Item, ItemId, LightItem};

/// Item source holding items in memory and counting lookups.
///
/// Enumeration is in identifier order. Failure modes can be switched on to
/// exercise error handling in callers.
#[derive(Debug, Default)]
pub struct MemorySource {
    items: Mutex<BTreeMap<ItemId, Item>>,
    light_calls: AtomicUsize,
    full_calls: AtomicUsize,
    full_calls_by_id: Mutex<HashMap<ItemId, usize>>,
    upstream_failure: AtomicBool,
    vanishing: AtomicBool,
    root: Option<PathBuf>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source pre-filled with `items`.
    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let source = Self::new();
        for item in items {
            source.insert(item);
        }
        source
    }

    /// Reports `root` as the library root.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn insert(&self, item: Item) {
        self.items.lock().insert(item.id.clone(), item);
    }

    pub fn remove(&self, id: &ItemId) -> Option<Item> {
        self.items.lock().remove(id)
    }

    /// Makes every call fail with [`SourceError::Upstream`].
    pub fn set_upstream_failure(&self, failing: bool) {
        self.upstream_failure.store(failing, Ordering::SeqCst);
    }

    /// Keeps listing items but answers `None` to every full lookup, as if
    /// they were deleted right after enumeration.
    pub fn set_vanishing(&self, vanishing: bool) {
        self.vanishing.store(vanishing, Ordering::SeqCst);
    }

    /// Number of `get_lightweight` calls so far.
    pub fn light_calls(&self) -> usize {
        self.light_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_full` calls so far.
    pub fn full_calls(&self) -> usize {
        self.full_calls.load(Ordering::SeqCst)
    }

    pub fn full_calls_for(&self, id: &ItemId) -> usize {
        self.full_calls_by_id.lock().get(id).copied().unwrap_or(0)
    }

    fn check_upstream(&self) -> SourceResult<()> {
        if self.upstream_failure.load(Ordering::SeqCst) {
            Err(SourceError::Upstream {
                reason: "memory source switched to failure mode".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ItemSource for MemorySource {
    async fn enumerate_ids(&self) -> SourceResult<Vec<ItemId>> {
        self.check_upstream()?;
        Ok(self.items.lock().keys().cloned().collect())
    }

    async fn get_lightweight(&self, id: &ItemId) -> SourceResult<Option<LightItem>> {
        self.light_calls.fetch_add(1, Ordering::SeqCst);
        self.check_upstream()?;
        Ok(self.items.lock().get(id).map(Item::light))
    }

    async fn get_full(&self, id: &ItemId) -> SourceResult<Option<Item>> {
        self.full_calls.fetch_add(1, Ordering::SeqCst);
        *self.full_calls_by_id.lock().entry(id.clone()).or_insert(0) += 1;
        self.check_upstream()?;
        if self.vanishing.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.items.lock().get(id).cloned())
    }

    fn library_root(&self) -> Option<PathBuf> {
        self.root.clone()
    }

    fn source_type(&self) -> &'static str {
        "memory"
    }
}
