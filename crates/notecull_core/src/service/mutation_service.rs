//! Write path: add, delete and wipe.
//!
//! # Responsibility
//! - Resolve deletion targets through the predicate model.
//! - Tombstone targets and submit them to the store in batches.
//! - Report exact accepted counts, including on partial failure.
//!
//! # Invariants
//! - Validation (regex compilation) happens before any store call.
//! - Only live, unique items are ever submitted for tombstoning.
//! - Targets are tombstoned copies; the fetched collection is not edited.
//! - A hard store error aborts with `MutationError::Store`; no count is
//!   reported as a result in that case.
//! - Any write that may have reached the store clears the attached snapshot,
//!   including one that aborted after some batches committed.

use crate::cache::snapshot::SnapshotCache;
use crate::collection::{live_unique, project_references};
use crate::config::EngineConfig;
use crate::model::filter::{evaluate_filter_set, FilterError};
use crate::model::item::{Item, ItemDraft, ItemReference, ItemType};
use crate::model::request::{DeletionRequest, LabelMatch, WipeRequest};
use crate::store::{FetchHints, ItemFailure, ItemStore, StoreError, SubmitOutcome};
use log::{error, info, warn};
use rayon::prelude::*;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

#[derive(Debug)]
pub enum MutationError {
    /// Rejected before any store call.
    Validation(FilterError),
    /// The store failed a whole call. `committed` counts items accepted by
    /// batches that completed before the failure; `failures` lists the items
    /// those batches refused.
    Store {
        source: StoreError,
        committed: usize,
        failures: Vec<ItemFailure>,
    },
}

impl Display for MutationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store {
                source,
                committed,
                failures,
            } => write!(
                f,
                "{source} (committed before failure: {committed}, refused: {})",
                failures.len()
            ),
        }
    }
}

impl Error for MutationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store { source, .. } => Some(source),
        }
    }
}

impl From<FilterError> for MutationError {
    fn from(value: FilterError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for MutationError {
    fn from(value: StoreError) -> Self {
        Self::Store {
            source: value,
            committed: 0,
            failures: Vec::new(),
        }
    }
}

/// Outcome of a delete or wipe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationReport {
    /// Items selected for tombstoning, in store order.
    pub matched: Vec<ItemReference>,
    /// Items the store accepted as deleted.
    pub deleted: usize,
    /// Items the store refused individually.
    pub failures: Vec<ItemFailure>,
}

impl MutationReport {
    /// True when every matched item was accepted.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.deleted == self.matched.len()
    }
}

pub struct MutationService<S: ItemStore> {
    store: S,
    parallel_submit: bool,
    snapshot: Option<SnapshotCache>,
}

impl<S: ItemStore> MutationService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            parallel_submit: true,
            snapshot: None,
        }
    }

    /// Applies `parallel_submit` and attaches `snapshot_path` when configured.
    pub fn with_config(store: S, config: &EngineConfig) -> Self {
        Self {
            store,
            parallel_submit: config.parallel_submit,
            snapshot: config.snapshot_path.clone().map(SnapshotCache::new),
        }
    }

    /// Snapshot to clear after every write.
    pub fn with_snapshot(mut self, cache: SnapshotCache) -> Self {
        self.snapshot = Some(cache);
        self
    }

    pub fn with_parallel_submit(mut self, enabled: bool) -> Self {
        self.parallel_submit = enabled;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates one item and returns it with its store-assigned id.
    pub fn add_item(&self, draft: &ItemDraft) -> Result<Item, MutationError> {
        let started_at = Instant::now();
        match self.store.create(draft) {
            Ok(item) => {
                self.invalidate_snapshot();
                info!(
                    "event=add_item module=mutation status=ok item_type={} item_id={} duration_ms={}",
                    item.item_type,
                    item.id,
                    started_at.elapsed().as_millis()
                );
                Ok(item)
            }
            Err(err) => {
                error!(
                    "event=add_item module=mutation status=error item_type={} error={err}",
                    draft.item_type
                );
                Err(err.into())
            }
        }
    }

    pub fn add_note(
        &self,
        label: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Item, MutationError> {
        self.add_item(&ItemDraft::note(label, body))
    }

    /// Creates `count` notes labelled `note-0001`, `note-0002`, ... whose
    /// bodies hold `paragraphs` paragraphs of filler text.
    ///
    /// Stops at the first store error; notes created before it stay.
    pub fn create_notes(
        &self,
        count: usize,
        paragraphs: usize,
    ) -> Result<Vec<Item>, MutationError> {
        let started_at = Instant::now();
        let mut created = Vec::with_capacity(count);
        let mut failure = None;
        for n in 1..=count {
            let draft = ItemDraft::note(format!("note-{n:04}"), filler_text(paragraphs));
            match self.store.create(&draft) {
                Ok(item) => created.push(item),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        if !created.is_empty() {
            self.invalidate_snapshot();
        }

        match failure {
            None => {
                info!(
                    "event=create_notes module=mutation status=ok created={} duration_ms={}",
                    created.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(created)
            }
            Some(err) => {
                error!(
                    "event=create_notes module=mutation status=error created={} requested={count} error={err}",
                    created.len()
                );
                Err(err.into())
            }
        }
    }

    pub fn delete_by_identifiers<I, T>(
        &self,
        item_type: &ItemType,
        ids: I,
    ) -> Result<MutationReport, MutationError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.delete(&DeletionRequest::by_identifiers(ids).with_item_type(item_type.clone()))
    }

    pub fn delete_by_labels<I, T>(
        &self,
        item_type: &ItemType,
        labels: I,
        mode: LabelMatch,
    ) -> Result<MutationReport, MutationError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.delete(&DeletionRequest::by_labels(labels, mode).with_item_type(item_type.clone()))
    }

    /// Tombstones the union of identifier, label and pattern matches.
    ///
    /// Zero matches is not an error; the report is simply empty.
    pub fn delete(&self, request: &DeletionRequest) -> Result<MutationReport, MutationError> {
        let started_at = Instant::now();
        let Some(filter_set) = request.to_filter_set()? else {
            return Ok(MutationReport::default());
        };

        let fetched = self.fetch(&request.item_type)?;
        let targets: Vec<Item> = live_unique(&fetched)
            .into_iter()
            .filter(|item| evaluate_filter_set(item, &filter_set))
            .collect();

        let report = self.tombstone_and_submit(&targets)?;
        log_report("delete", &request.item_type, &report, started_at);
        Ok(report)
    }

    /// Tombstones every live item of the requested type seen by one fetch.
    ///
    /// Items created after that fetch are left alone. Calling it again on a
    /// wiped type returns an empty report.
    pub fn wipe(&self, request: &WipeRequest) -> Result<MutationReport, MutationError> {
        let started_at = Instant::now();
        let fetched = self.fetch(&request.item_type)?;
        let targets = live_unique(&fetched);

        let report = self.tombstone_and_submit(&targets)?;
        log_report("wipe", &request.item_type, &report, started_at);
        Ok(report)
    }

    fn fetch(&self, item_type: &ItemType) -> Result<Vec<Item>, MutationError> {
        self.store
            .fetch(item_type, &FetchHints::default())
            .map_err(|err| {
                error!(
                    "event=fetch module=mutation status=error item_type={item_type} error={err}"
                );
                err.into()
            })
    }

    fn tombstone_and_submit(&self, targets: &[Item]) -> Result<MutationReport, MutationError> {
        let matched = project_references(targets);
        if targets.is_empty() {
            return Ok(MutationReport {
                matched,
                ..MutationReport::default()
            });
        }

        let tombstoned: Vec<Item> = targets.iter().map(Item::tombstoned).collect();
        let submitted = self.submit_batches(&tombstoned);
        self.invalidate_snapshot();
        let outcome = submitted?;
        Ok(MutationReport {
            matched,
            deleted: outcome.succeeded,
            failures: outcome.failures,
        })
    }

    fn submit_batches(&self, items: &[Item]) -> Result<SubmitOutcome, MutationError> {
        let batch_size = self.store.max_batch_size().max(1);
        let batches: Vec<&[Item]> = items.chunks(batch_size).collect();

        if !self.parallel_submit || batches.len() < 2 {
            let mut total = SubmitOutcome::default();
            for batch in batches {
                match self.store.submit(batch) {
                    Ok(outcome) => total = total.merge(outcome),
                    Err(source) => return Err(abort(source, total)),
                }
            }
            return Ok(total);
        }

        let results: Vec<_> = batches
            .par_iter()
            .map(|batch| self.store.submit(batch))
            .collect();

        let mut total = SubmitOutcome::default();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(outcome) => total = total.merge(outcome),
                Err(source) => {
                    first_error.get_or_insert(source);
                }
            }
        }
        match first_error {
            Some(source) => Err(abort(source, total)),
            None => Ok(total),
        }
    }

    fn invalidate_snapshot(&self) {
        let Some(cache) = self.snapshot.as_ref() else {
            return;
        };
        if let Err(err) = cache.invalidate() {
            warn!("event=snapshot_invalidate module=mutation status=error error={err}");
        }
    }
}

const FILLER_PARAGRAPH: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do \
eiusmod tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, quis \
nostrud exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat.";

fn filler_text(paragraphs: usize) -> String {
    vec![FILLER_PARAGRAPH; paragraphs].join("\n\n")
}

fn abort(source: StoreError, partial: SubmitOutcome) -> MutationError {
    error!(
        "event=submit module=mutation status=error committed={} refused={} error={source}",
        partial.succeeded,
        partial.failures.len()
    );
    MutationError::Store {
        source,
        committed: partial.succeeded,
        failures: partial.failures,
    }
}

fn log_report(operation: &str, item_type: &ItemType, report: &MutationReport, started_at: Instant) {
    if report.failures.is_empty() {
        info!(
            "event={operation} module=mutation status=ok item_type={item_type} matched={} deleted={} duration_ms={}",
            report.matched.len(),
            report.deleted,
            started_at.elapsed().as_millis()
        );
    } else {
        let failed_ids: Vec<&str> = report.failures.iter().map(|f| f.id.as_str()).collect();
        warn!(
            "event={operation} module=mutation status=partial item_type={item_type} matched={} deleted={} failed={} failed_ids={} duration_ms={}",
            report.matched.len(),
            report.deleted,
            report.failures.len(),
            failed_ids.join(","),
            started_at.elapsed().as_millis()
        );
    }
}
