//! Filter matching, ordering and pagination over library items.
//!
//! The free functions are pure and work on any [`Filterable`] value. The
//! [`QueryEngine`] drives them against an [`ItemSource`]: it filters on
//! lightweight records first and only resolves the survivors in full.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::entropy::Entropy;
use crate::filter::{OrderBy, QueryFilter};
use crate::item::{Filterable, Item, ItemId};
use crate::media_type::normalize_extension;
use crate::source::{ItemSource, SourceError, SourceResult};

/// Concurrent source lookups per query.
const LOOKUP_CONCURRENCY: usize = 16;

/// Whether `item` satisfies every constraint in `filter`.
pub fn matches<T: Filterable + ?Sized>(item: &T, filter: &QueryFilter) -> bool {
    if let Some(keyword) = &filter.keyword {
        let needle = keyword.to_lowercase();
        let hit = item.name().to_lowercase().contains(&needle)
            || item
                .tags()
                .iter()
                .any(|tag| tag.to_lowercase().contains(&needle))
            || item.metadata_text().to_lowercase().contains(&needle);
        if !hit {
            return false;
        }
    }

    if let Some(extension) = &filter.extension {
        if normalize_extension(item.extension()) != normalize_extension(extension) {
            return false;
        }
    }

    // Tags: all of them. Folders: any of them.
    if !filter
        .tags
        .iter()
        .all(|wanted| contains_ignore_case(item.tags(), wanted))
    {
        return false;
    }
    if !filter.folders.is_empty()
        && !filter
            .folders
            .iter()
            .any(|wanted| contains_ignore_case(item.folders(), wanted))
    {
        return false;
    }

    true
}

fn contains_ignore_case(values: &[String], wanted: &str) -> bool {
    let wanted = wanted.to_lowercase();
    values.iter().any(|value| value.to_lowercase() == wanted)
}

/// Returns a sorted copy of `items`; the input is left untouched.
pub fn sort<R: Rng + ?Sized>(items: &[Item], order_by: OrderBy, rng: &mut R) -> Vec<Item> {
    sort_owned(items.to_vec(), order_by, rng)
}

/// Sorts an owned list. Key orders are stable; [`OrderBy::Random`] is a
/// uniform shuffle.
pub fn sort_owned<R: Rng + ?Sized>(mut items: Vec<Item>, order_by: OrderBy, rng: &mut R) -> Vec<Item> {
    match order_by {
        OrderBy::Random => items.shuffle(rng),
        OrderBy::NameAsc => items.sort_by(|a, b| a.name.cmp(&b.name)),
        OrderBy::NameDesc => items.sort_by(|a, b| b.name.cmp(&a.name)),
        OrderBy::CreatedAsc => items.sort_by_key(|item| item.created_at),
        OrderBy::CreatedDesc => items.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        OrderBy::ModifiedAsc => items.sort_by_key(|item| item.modified_at),
        OrderBy::ModifiedDesc => items.sort_by(|a, b| b.modified_at.cmp(&a.modified_at)),
        OrderBy::SizeAsc => items.sort_by_key(|item| item.size),
        OrderBy::SizeDesc => items.sort_by(|a, b| b.size.cmp(&a.size)),
    }
    items
}

/// One page of a filtered, ordered result.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Length of the whole filtered result, not of this page.
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

impl<T> Page<T> {
    pub fn empty(limit: usize, offset: usize) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            limit,
            offset,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Slices `items[offset..offset + limit]`, clamped to the list.
pub fn paginate<T>(items: Vec<T>, limit: usize, offset: usize) -> Page<T> {
    let total = items.len();
    let items = items.into_iter().skip(offset).take(limit).collect();
    Page {
        items,
        total,
        limit,
        offset,
    }
}

/// Identifiers whose lightweight record satisfies `filter`, in enumeration
/// order. Never performs a full lookup.
pub(crate) async fn matching_ids(
    source: &Arc<dyn ItemSource>,
    filter: &QueryFilter,
) -> SourceResult<Vec<ItemId>> {
    let ids = source.enumerate_ids().await?;
    let candidates = ids.len();
    let lights: Vec<_> = stream::iter(ids)
        .map(|id| {
            let source = Arc::clone(source);
            async move { source.get_lightweight(&id).await }
        })
        .buffered(LOOKUP_CONCURRENCY)
        .try_collect()
        .await?;

    let matching: Vec<ItemId> = lights
        .into_iter()
        .flatten()
        .filter(|light| matches(light, filter))
        .map(|light| light.id)
        .collect();

    debug!(candidates, matching = matching.len(), "Filtered lightweight records");
    Ok(matching)
}

/// Runs list queries against an item source.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    source: Arc<dyn ItemSource>,
    entropy: Entropy,
}

impl QueryEngine {
    pub fn new(source: Arc<dyn ItemSource>, entropy: Entropy) -> Self {
        Self { source, entropy }
    }

    /// Filters, orders and paginates the library.
    ///
    /// Items that disappear between enumeration and full lookup are skipped.
    /// A failing catalog yields an empty page.
    ///
    /// # Errors
    /// - `SourceError::Unconfigured` - Library path or catalog not available
    /// - `SourceError::Io` - Library directory could not be read
    pub async fn list(&self, filter: &QueryFilter) -> SourceResult<Page<Item>> {
        match self.collect(filter).await {
            Ok(items) => {
                let ordered = self
                    .entropy
                    .with_rng(|rng| sort_owned(items, filter.order_by, rng));
                Ok(paginate(ordered, filter.limit, filter.offset))
            }
            Err(SourceError::Upstream { reason }) => {
                warn!(%reason, "Catalog failed during list query, returning empty result");
                Ok(Page::empty(filter.limit, filter.offset))
            }
            Err(e) => Err(e),
        }
    }

    async fn collect(&self, filter: &QueryFilter) -> SourceResult<Vec<Item>> {
        let ids = matching_ids(&self.source, filter).await?;

        let items: Vec<Option<Item>> = stream::iter(ids)
            .map(|id| {
                let source = Arc::clone(&self.source);
                async move { source.get_full_listed(&id).await }
            })
            .buffered(LOOKUP_CONCURRENCY)
            .try_collect()
            .await?;

        let resolved = items.len();
        let items: Vec<Item> = items
            .into_iter()
            .flatten()
            .filter(|item| matches(item, filter))
            .collect();
        if items.len() < resolved {
            debug!(
                dropped = resolved - items.len(),
                "Items vanished or changed during query"
            );
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::source::MemorySource;

    fn item(id: &str, name: &str, size: u64) -> Item {
        Item::new(id, name, format!("/library/{id}.info/{name}")).with_size(size)
    }

    fn tagged(tags: &[&str]) -> Item {
        item("T", "t.png", 1).with_tags(tags.iter().copied())
    }

    fn in_folders(folders: &[&str]) -> Item {
        item("F", "f.png", 1).with_folders(folders.iter().copied())
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_keyword_matches_name_tags_or_metadata() {
        let item = item("K", "Harbour.JPG", 1)
            .with_tags(["Evening"])
            .with_metadata(r#"{"annotation":"Taken from the PIER"}"#);

        assert!(matches(&item, &QueryFilter::new().with_keyword("harbour")));
        assert!(matches(&item, &QueryFilter::new().with_keyword("EVEN")));
        assert!(matches(&item, &QueryFilter::new().with_keyword("pier")));
        assert!(!matches(&item, &QueryFilter::new().with_keyword("mountain")));
    }

    #[test]
    fn test_extension_is_normalized() {
        let item = item("E", "photo.PNG", 1);
        assert!(matches(&item, &QueryFilter::new().with_extension("png")));
        assert!(matches(&item, &QueryFilter::new().with_extension(".Png")));
        assert!(!matches(&item, &QueryFilter::new().with_extension("jpg")));
    }

    #[test]
    fn test_tags_require_all() {
        let filter = QueryFilter::new().with_tags(["a", "B"]);
        assert!(matches(&tagged(&["A", "b", "c"]), &filter));
        assert!(!matches(&tagged(&["a"]), &filter));
        assert!(!matches(&tagged(&[]), &filter));
    }

    #[test]
    fn test_folders_require_any() {
        let filter = QueryFilter::new().with_folders(["x", "Y"]);
        assert!(matches(&in_folders(&["y"]), &filter));
        assert!(matches(&in_folders(&["X", "z"]), &filter));
        assert!(!matches(&in_folders(&["z"]), &filter));
        assert!(!matches(&in_folders(&[]), &filter));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(matches(&item("A", "", 0), &QueryFilter::new()));
    }

    #[test]
    fn test_named_orders() {
        let at = |secs| DateTime::from_timestamp(secs, 0).unwrap();
        let items = vec![
            item("1", "b.png", 20).with_times(at(3), at(1)),
            item("2", "a.png", 30).with_times(at(1), at(2)),
            item("3", "c.png", 10).with_times(at(2), at(3)),
        ];
        let ids = |sorted: Vec<Item>| sorted.into_iter().map(|i| i.id.to_string()).collect::<Vec<_>>();
        let mut rng = rng();

        assert_eq!(ids(sort(&items, OrderBy::NameAsc, &mut rng)), ["2", "1", "3"]);
        assert_eq!(ids(sort(&items, OrderBy::NameDesc, &mut rng)), ["3", "1", "2"]);
        assert_eq!(ids(sort(&items, OrderBy::CreatedAsc, &mut rng)), ["2", "3", "1"]);
        assert_eq!(ids(sort(&items, OrderBy::CreatedDesc, &mut rng)), ["1", "3", "2"]);
        assert_eq!(ids(sort(&items, OrderBy::ModifiedAsc, &mut rng)), ["1", "2", "3"]);
        assert_eq!(ids(sort(&items, OrderBy::ModifiedDesc, &mut rng)), ["3", "2", "1"]);
        assert_eq!(ids(sort(&items, OrderBy::SizeAsc, &mut rng)), ["3", "1", "2"]);
        assert_eq!(ids(sort(&items, OrderBy::SizeDesc, &mut rng)), ["2", "1", "3"]);
    }

    #[test]
    fn test_sort_leaves_input_untouched() {
        let items = vec![item("1", "c", 3), item("2", "a", 1), item("3", "b", 2)];
        let before = items.clone();
        let _ = sort(&items, OrderBy::NameAsc, &mut rng());
        let _ = sort(&items, OrderBy::Random, &mut rng());
        assert_eq!(items, before);
    }

    #[test]
    fn test_random_order_is_uniform() {
        let items = vec![item("a", "a", 0), item("b", "b", 0), item("c", "c", 0)];
        let mut rng = rng();
        let mut counts = std::collections::HashMap::new();
        let trials = 6_000;

        for _ in 0..trials {
            let order: String = sort(&items, OrderBy::Random, &mut rng)
                .iter()
                .map(|i| i.id.to_string())
                .collect();
            *counts.entry(order).or_insert(0usize) += 1;
        }

        assert_eq!(counts.len(), 6, "every permutation appears");
        for (order, count) in counts {
            assert!(
                (800..=1_200).contains(&count),
                "permutation {order} seen {count} times"
            );
        }
    }

    #[test]
    fn test_paginate_tail_page() {
        let page = paginate((0..100).collect::<Vec<_>>(), 10, 95);
        assert_eq!(page.items, vec![95, 96, 97, 98, 99]);
        assert_eq!(page.total, 100);
        assert_eq!((page.limit, page.offset), (10, 95));
    }

    #[test]
    fn test_paginate_past_end_and_zero_limit() {
        let page = paginate(vec![1, 2, 3], 10, 3);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);

        let page = paginate(vec![1, 2, 3], 0, 0);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
    }

    proptest! {
        #[test]
        fn prop_tags_and_semantics(tags in prop::collection::vec(prop::sample::select(vec!["a", "A", "b", "c", "d"]), 0..6)) {
            let item = tagged(&tags);
            let has = |t: &str| tags.iter().any(|x| x.eq_ignore_ascii_case(t));
            let filter = QueryFilter::new().with_tags(["a", "b"]);
            prop_assert_eq!(matches(&item, &filter), has("a") && has("b"));
        }

        #[test]
        fn prop_folders_or_semantics(folders in prop::collection::vec(prop::sample::select(vec!["x", "Y", "z", "w"]), 0..6)) {
            let item = in_folders(&folders);
            let has = |f: &str| folders.iter().any(|x| x.eq_ignore_ascii_case(f));
            let filter = QueryFilter::new().with_folders(["x", "y"]);
            prop_assert_eq!(matches(&item, &filter), has("x") || has("y"));
        }

        #[test]
        fn prop_size_asc_is_non_decreasing(sizes in prop::collection::vec(0u64..1_000, 0..40), seed in any::<u64>()) {
            let items: Vec<Item> = sizes
                .iter()
                .enumerate()
                .map(|(i, size)| item(&i.to_string(), "x", *size))
                .collect();
            let sorted = sort(&items, OrderBy::SizeAsc, &mut ChaCha8Rng::seed_from_u64(seed));
            prop_assert_eq!(sorted.len(), items.len());
            prop_assert!(sorted.windows(2).all(|w| w[0].size <= w[1].size));
        }

        #[test]
        fn prop_shuffle_is_a_permutation(len in 0usize..30, seed in any::<u64>()) {
            let items: Vec<Item> = (0..len).map(|i| item(&i.to_string(), "x", i as u64)).collect();
            let mut shuffled = sort(&items, OrderBy::Random, &mut ChaCha8Rng::seed_from_u64(seed));
            shuffled.sort_by_key(|i| i.size);
            prop_assert_eq!(shuffled, items);
        }
    }

    fn scenario_source() -> Arc<MemorySource> {
        Arc::new(MemorySource::with_items([
            item("A", "a.png", 10).with_tags(["x"]),
            item("B", "b.png", 20).with_tags(["x", "y"]),
            item("C", "c.png", 5).with_tags(["y"]),
        ]))
    }

    #[tokio::test]
    async fn test_scenario_tag_filter_sorted_by_size() {
        let engine = QueryEngine::new(scenario_source(), Entropy::seeded(1));
        let filter = QueryFilter::new()
            .with_tags(["x"])
            .ordered_by(OrderBy::SizeAsc);

        let page = engine.list(&filter).await.unwrap();
        let got: Vec<_> = page.items.iter().map(|i| (i.id.as_str(), i.size)).collect();
        assert_eq!(got, vec![("A", 10), ("B", 20)]);
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_scenario_second_page_by_name() {
        let engine = QueryEngine::new(scenario_source(), Entropy::seeded(1));
        let filter = QueryFilter::new()
            .ordered_by(OrderBy::NameAsc)
            .paginated(1, 1);

        let page = engine.list(&filter).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id.as_str(), "B");
        assert_eq!((page.total, page.limit, page.offset), (3, 1, 1));
    }

    #[tokio::test]
    async fn test_only_survivors_are_fully_resolved() {
        let source = scenario_source();
        let engine = QueryEngine::new(source.clone(), Entropy::seeded(1));

        engine
            .list(&QueryFilter::new().with_tags(["y"]))
            .await
            .unwrap();
        assert_eq!(source.light_calls(), 3);
        assert_eq!(source.full_calls(), 2);
        assert_eq!(source.full_calls_for(&ItemId::new("A")), 0);
    }

    #[tokio::test]
    async fn test_vanished_items_are_skipped() {
        let source = scenario_source();
        source.set_vanishing(true);
        let engine = QueryEngine::new(source, Entropy::seeded(1));

        let page = engine.list(&QueryFilter::new()).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_an_empty_page() {
        let source = scenario_source();
        source.set_upstream_failure(true);
        let engine = QueryEngine::new(source, Entropy::seeded(1));

        let page = engine.list(&QueryFilter::new().paginated(5, 2)).await.unwrap();
        assert_eq!(page, Page::empty(5, 2));
    }

    #[tokio::test]
    async fn test_unconfigured_source_propagates() {
        let source = Arc::new(crate::source::UnconfiguredSource::new("no library"));
        let engine = QueryEngine::new(source, Entropy::seeded(1));
        let err = engine.list(&QueryFilter::new()).await.unwrap_err();
        assert!(err.is_unconfigured());
    }

    #[tokio::test]
    async fn test_queries_run_on_spawned_tasks() {
        let source = scenario_source();
        let engine = QueryEngine::new(source.clone(), Entropy::seeded(1));
        let selector = crate::RandomSelector::new(source, Entropy::seeded(1));

        let page = tokio::spawn(async move { engine.list(&QueryFilter::new()).await })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(page.total, 3);

        let picked = tokio::spawn(async move {
            selector
                .pick_full(&QueryFilter::new().with_tags(["x", "y"]))
                .await
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(picked.map(|item| item.id), Some(ItemId::new("B")));
    }
}
