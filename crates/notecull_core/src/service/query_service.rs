//! Read path: fetch a collection and select the matching items.
//!
//! # Responsibility
//! - Resolve filter sets against the store's current collection.
//! - Optionally short-circuit fetches through the snapshot cache.
//!
//! # Invariants
//! - Returned items are live, unique by id, and in store order.
//! - A missing or corrupt snapshot falls back to the store; it is never read
//!   as an empty collection.

use crate::cache::snapshot::SnapshotCache;
use crate::collection::{live_unique, project_references};
use crate::model::filter::{select, FilterSet};
use crate::model::item::{Item, ItemReference, ItemType};
use crate::store::{FetchHints, ItemStore, StoreResult};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Last fetched raw collection for one item type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub item_type: ItemType,
    pub items: Vec<Item>,
}

pub struct QueryService<S: ItemStore> {
    store: S,
    snapshot: Option<SnapshotCache>,
}

impl<S: ItemStore> QueryService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            snapshot: None,
        }
    }

    pub fn with_snapshot(mut self, cache: SnapshotCache) -> Self {
        self.snapshot = Some(cache);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetches fresh and returns the items matching `filter_set`.
    pub fn select(&self, item_type: &ItemType, filter_set: &FilterSet) -> StoreResult<Vec<Item>> {
        let started_at = Instant::now();
        let hints = FetchHints {
            label: filter_set.label_hint().map(str::to_string),
            include_deleted: false,
        };
        let fetched = self.fetch_logged(item_type, &hints)?;
        let matched = select(&fetched, filter_set);
        info!(
            "event=select module=query status=ok item_type={} fetched={} matched={} duration_ms={}",
            item_type,
            fetched.len(),
            matched.len(),
            started_at.elapsed().as_millis()
        );
        Ok(matched)
    }

    /// Like [`Self::select`], but reads the snapshot before fetching and
    /// refreshes it after a successful fetch.
    pub fn select_cached(
        &self,
        item_type: &ItemType,
        filter_set: &FilterSet,
    ) -> StoreResult<Vec<Item>> {
        let collection = self.cached_collection(item_type)?;
        Ok(select(&collection, filter_set))
    }

    /// All live, unique items of one type.
    pub fn list_live(&self, item_type: &ItemType) -> StoreResult<Vec<Item>> {
        let fetched = self.fetch_logged(item_type, &FetchHints::default())?;
        Ok(live_unique(&fetched))
    }

    pub fn references(&self, item_type: &ItemType) -> StoreResult<Vec<ItemReference>> {
        Ok(project_references(&self.list_live(item_type)?))
    }

    /// Fetches the full collection and rewrites the snapshot, if one is set.
    pub fn refresh_snapshot(&self, item_type: &ItemType) -> StoreResult<Vec<Item>> {
        let items = self.fetch_logged(item_type, &FetchHints::default())?;
        self.write_snapshot(item_type, &items);
        Ok(items)
    }

    fn cached_collection(&self, item_type: &ItemType) -> StoreResult<Vec<Item>> {
        let Some(cache) = self.snapshot.as_ref() else {
            return self.fetch_logged(item_type, &FetchHints::default());
        };

        match cache.load::<CollectionSnapshot>() {
            Ok(snapshot) if &snapshot.item_type == item_type => {
                debug!(
                    "event=snapshot_hit module=query status=ok item_type={} items={}",
                    item_type,
                    snapshot.items.len()
                );
                return Ok(snapshot.items);
            }
            Ok(snapshot) => debug!(
                "event=snapshot_miss module=query status=ok reason=type_mismatch cached_type={} item_type={}",
                snapshot.item_type, item_type
            ),
            Err(err) if err.is_miss() => {
                debug!("event=snapshot_miss module=query status=ok reason=absent item_type={item_type}")
            }
            Err(err) => warn!(
                "event=snapshot_miss module=query status=error reason=unreadable item_type={item_type} error={err}"
            ),
        }

        self.refresh_snapshot(item_type)
    }

    fn write_snapshot(&self, item_type: &ItemType, items: &[Item]) {
        let Some(cache) = self.snapshot.as_ref() else {
            return;
        };
        let snapshot = CollectionSnapshot {
            item_type: item_type.clone(),
            items: items.to_vec(),
        };
        if let Err(err) = cache.save(&snapshot) {
            warn!(
                "event=snapshot_save module=query status=error item_type={item_type} error={err}"
            );
        }
    }

    fn fetch_logged(&self, item_type: &ItemType, hints: &FetchHints) -> StoreResult<Vec<Item>> {
        self.store.fetch(item_type, hints).map_err(|err| {
            error!(
                "event=fetch module=query status=error item_type={item_type} error={err}"
            );
            err
        })
    }
}
