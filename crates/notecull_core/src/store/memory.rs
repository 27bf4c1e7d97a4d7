//! In-process Item Store used as an isolated per-scenario fixture.
//!
//! Behaves like a raw sync endpoint: fetches return tombstoned items as well as
//! live ones, and can be told to repeat items the way overlapping pages do.
//! Failures can be injected per call or per item.

use super::{FetchHints, ItemFailure, ItemStore, StoreError, StoreResult, SubmitOutcome};
use crate::model::item::{Item, ItemDraft, ItemId, ItemType};
use parking_lot::Mutex;
use std::collections::HashSet;

/// Whole-call failure to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    Cancelled,
    Network,
    Unauthorized,
    QuotaExceeded,
}

impl InjectedFailure {
    fn to_error(self) -> StoreError {
        match self {
            Self::Cancelled => StoreError::Cancelled,
            Self::Network => StoreError::Network("injected network failure".to_string()),
            Self::Unauthorized => StoreError::Unauthorized("session expired".to_string()),
            Self::QuotaExceeded => StoreError::QuotaExceeded("injected quota failure".to_string()),
        }
    }
}

type FetchHook = Box<dyn FnMut(&mut Vec<Item>) + Send>;

#[derive(Default)]
struct MemoryState {
    items: Vec<Item>,
    next_seq: u64,
    duplicate_on_fetch: bool,
    rejected_ids: HashSet<ItemId>,
    fetch_failure: Option<InjectedFailure>,
    create_failure: Option<InjectedFailure>,
    /// Fails the submit call with this zero-based index.
    submit_failure: Option<(usize, InjectedFailure)>,
    after_fetch: Option<FetchHook>,
    fetch_calls: usize,
    submit_calls: usize,
    submitted_batch_sizes: Vec<usize>,
}

/// Thread-safe in-memory store.
pub struct MemoryItemStore {
    state: Mutex<MemoryState>,
    max_batch_size: usize,
}

impl Default for MemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            max_batch_size: usize::MAX,
        }
    }

    /// Limits how many items a single `submit` accepts.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    /// Seeds a raw item exactly as given, tombstoned or not.
    pub fn insert(&self, item: Item) {
        self.state.lock().items.push(item);
    }

    /// Makes every fetch return each item twice.
    pub fn duplicate_on_fetch(&self, enabled: bool) {
        self.state.lock().duplicate_on_fetch = enabled;
    }

    /// Makes `submit` refuse these items individually.
    pub fn reject_ids<I: IntoIterator<Item = ItemId>>(&self, ids: I) {
        self.state.lock().rejected_ids.extend(ids);
    }

    pub fn fail_fetch(&self, failure: Option<InjectedFailure>) {
        self.state.lock().fetch_failure = failure;
    }

    pub fn fail_create(&self, failure: Option<InjectedFailure>) {
        self.state.lock().create_failure = failure;
    }

    /// Fails the submit call with zero-based index `call_index`.
    pub fn fail_submit_call(&self, call_index: usize, failure: InjectedFailure) {
        self.state.lock().submit_failure = Some((call_index, failure));
    }

    /// Runs `hook` against the stored items right after each fetch snapshot is
    /// taken, simulating another writer racing the engine.
    pub fn on_after_fetch<F>(&self, hook: F)
    where
        F: FnMut(&mut Vec<Item>) + Send + 'static,
    {
        self.state.lock().after_fetch = Some(Box::new(hook));
    }

    pub fn get(&self, id: &ItemId) -> Option<Item> {
        self.state
            .lock()
            .items
            .iter()
            .find(|item| &item.id == id)
            .cloned()
    }

    /// Live items of one type, in insertion order.
    pub fn live_items(&self, item_type: &ItemType) -> Vec<Item> {
        self.state
            .lock()
            .items
            .iter()
            .filter(|item| &item.item_type == item_type && item.is_live())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.lock().fetch_calls
    }

    pub fn submit_calls(&self) -> usize {
        self.state.lock().submit_calls
    }

    /// Sizes of accepted submit calls, in arrival order.
    pub fn submitted_batch_sizes(&self) -> Vec<usize> {
        self.state.lock().submitted_batch_sizes.clone()
    }
}

impl ItemStore for MemoryItemStore {
    fn fetch(&self, item_type: &ItemType, hints: &FetchHints) -> StoreResult<Vec<Item>> {
        let mut state = self.state.lock();
        state.fetch_calls += 1;
        if let Some(failure) = state.fetch_failure {
            return Err(failure.to_error());
        }

        let mut fetched: Vec<Item> = state
            .items
            .iter()
            .filter(|item| &item.item_type == item_type)
            .filter(|item| match hints.label.as_deref() {
                Some(label) => item.label() == Some(label),
                None => true,
            })
            .cloned()
            .collect();
        if state.duplicate_on_fetch {
            let repeated = fetched.clone();
            fetched.extend(repeated);
        }

        if let Some(mut hook) = state.after_fetch.take() {
            hook(&mut state.items);
            state.after_fetch = Some(hook);
        }

        Ok(fetched)
    }

    fn submit(&self, items: &[Item]) -> StoreResult<SubmitOutcome> {
        let mut state = self.state.lock();
        let call_index = state.submit_calls;
        state.submit_calls += 1;
        if let Some((failing_call, failure)) = state.submit_failure {
            if failing_call == call_index {
                return Err(failure.to_error());
            }
        }
        if items.len() > self.max_batch_size {
            return Err(StoreError::Rejected(format!(
                "batch of {} exceeds limit {}",
                items.len(),
                self.max_batch_size
            )));
        }
        state.submitted_batch_sizes.push(items.len());

        let mut outcome = SubmitOutcome::default();
        for item in items {
            if state.rejected_ids.contains(&item.id) {
                outcome.failures.push(ItemFailure {
                    id: item.id.clone(),
                    reason: "rejected by store".to_string(),
                });
                continue;
            }
            match state.items.iter_mut().find(|stored| stored.id == item.id) {
                Some(stored) => {
                    *stored = item.clone();
                    outcome.succeeded += 1;
                }
                None => outcome.failures.push(ItemFailure {
                    id: item.id.clone(),
                    reason: "unknown item".to_string(),
                }),
            }
        }
        Ok(outcome)
    }

    fn create(&self, draft: &ItemDraft) -> StoreResult<Item> {
        let mut state = self.state.lock();
        if let Some(failure) = state.create_failure {
            return Err(failure.to_error());
        }
        state.next_seq += 1;
        let stamp = format!("{:020}", state.next_seq);

        let mut item = draft.clone().into_item(ItemId::generate());
        item.created_at = Some(stamp.clone());
        item.updated_at = Some(stamp);
        state.items.push(item.clone());
        Ok(item)
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}
