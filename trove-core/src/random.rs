//! Uniform random selection of one matching item.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::entropy::Entropy;
use crate::filter::QueryFilter;
use crate::item::{Item, ItemId};
use crate::query::matching_ids;
use crate::source::{ItemSource, SourceError, SourceResult};

/// Picks a random item matching a filter.
///
/// Candidates are narrowed using lightweight records only. The winner is the
/// single item ever resolved in full.
#[derive(Debug, Clone)]
pub struct RandomSelector {
    source: Arc<dyn ItemSource>,
    entropy: Entropy,
}

impl RandomSelector {
    pub fn new(source: Arc<dyn ItemSource>, entropy: Entropy) -> Self {
        Self { source, entropy }
    }

    /// Chooses a matching identifier, each with equal probability.
    ///
    /// Returns `None` when nothing matches or the catalog is failing.
    ///
    /// # Errors
    /// - `SourceError::Unconfigured` - Library path or catalog not available
    /// - `SourceError::Io` - Library directory could not be read
    pub async fn pick_id(&self, filter: &QueryFilter) -> SourceResult<Option<ItemId>> {
        let mut candidates = match matching_ids(&self.source, filter).await {
            Ok(ids) => ids,
            Err(SourceError::Upstream { reason }) => {
                warn!(%reason, "Catalog failed during random selection");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let count = candidates.len();
        let picked = self
            .entropy
            .index(count)
            .map(|index| candidates.swap_remove(index));
        debug!(candidates = count, picked = ?picked, "Random pick");
        Ok(picked)
    }

    /// Chooses a matching item and resolves it in full.
    ///
    /// A winner that vanished before resolution yields `None`; the pick is
    /// not retried.
    ///
    /// # Errors
    /// - `SourceError::Unconfigured` - Library path or catalog not available
    /// - `SourceError::Io` - Library directory could not be read
    pub async fn pick_full(&self, filter: &QueryFilter) -> SourceResult<Option<Item>> {
        let Some(id) = self.pick_id(filter).await? else {
            return Ok(None);
        };

        match self.source.get_full_listed(&id).await {
            Ok(Some(item)) => Ok(Some(item)),
            Ok(None) => {
                debug!(%id, "Picked item vanished before resolution");
                Ok(None)
            }
            Err(SourceError::Upstream { reason }) => {
                warn!(%id, %reason, "Catalog failed while resolving random pick");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::source::MemorySource;

    fn library() -> Arc<MemorySource> {
        Arc::new(MemorySource::with_items([
            Item::new("A", "a.png", "/a.png").with_tags(["x"]),
            Item::new("B", "b.png", "/b.png").with_tags(["x", "y"]),
            Item::new("C", "c.mp4", "/c.mp4").with_tags(["y"]),
            Item::new("D", "d.txt", "/d.txt").with_tags(["x"]),
        ]))
    }

    #[tokio::test]
    async fn test_pick_never_resolves_rejected_candidates() {
        let source = library();
        let selector = RandomSelector::new(source.clone(), Entropy::seeded(9));
        let filter = QueryFilter::new().with_tags(["x"]);

        for _ in 0..200 {
            let item = selector.pick_full(&filter).await.unwrap().unwrap();
            assert!(item.tags.iter().any(|t| t == "x"));
        }

        assert_eq!(source.full_calls(), 200);
        assert_eq!(source.full_calls_for(&ItemId::new("C")), 0);
    }

    #[tokio::test]
    async fn test_pick_id_does_no_full_lookups() {
        let source = library();
        let selector = RandomSelector::new(source.clone(), Entropy::seeded(9));

        for _ in 0..50 {
            selector
                .pick_id(&QueryFilter::new().with_extension("png"))
                .await
                .unwrap();
        }
        assert_eq!(source.full_calls(), 0);
        assert_eq!(source.light_calls(), 200);
    }

    #[tokio::test]
    async fn test_pick_is_uniform_over_matches() {
        let selector = RandomSelector::new(library(), Entropy::seeded(2024));
        let filter = QueryFilter::new().with_tags(["x"]);
        let trials = 3_000;
        let mut counts: HashMap<String, usize> = HashMap::new();

        for _ in 0..trials {
            let id = selector.pick_id(&filter).await.unwrap().unwrap();
            *counts.entry(id.to_string()).or_default() += 1;
        }

        assert_eq!(counts.len(), 3);
        let expected = trials / 3;
        for (id, count) in counts {
            assert!(
                count.abs_diff(expected) < expected / 5,
                "{id} picked {count} times, expected about {expected}"
            );
        }
    }

    #[tokio::test]
    async fn test_no_match_is_none() {
        let selector = RandomSelector::new(library(), Entropy::seeded(1));
        let filter = QueryFilter::new().with_folders(["nonexistent"]);
        assert!(selector.pick_id(&filter).await.unwrap().is_none());
        assert!(selector.pick_full(&filter).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_vanished_winner_is_not_retried() {
        let source = library();
        source.set_vanishing(true);
        let selector = RandomSelector::new(source.clone(), Entropy::seeded(1));

        assert!(selector.pick_full(&QueryFilter::new()).await.unwrap().is_none());
        assert_eq!(source.full_calls(), 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_none() {
        let source = library();
        source.set_upstream_failure(true);
        let selector = RandomSelector::new(source, Entropy::seeded(1));
        assert!(selector.pick_full(&QueryFilter::new()).await.unwrap().is_none());
    }
}
