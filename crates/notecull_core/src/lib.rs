//! Filter and bulk-mutation engine for notes held in a remote item store.
//! Selects items with field predicates and tombstones them in safe,
//! count-exact batches.

pub mod cache;
pub mod collection;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use cache::snapshot::{load_snapshot, save_snapshot, CacheError, SnapshotCache};
pub use collection::{comma_split, deduplicate, filter_tombstoned, labels, project_references};
pub use config::{ConfigError, EngineConfig};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::filter::{
    evaluate, evaluate_filter_set, select, Comparator, FieldSelector, FieldValue, FilterError,
    FilterSet, MatchPolicy, Predicate,
};
pub use model::item::{Item, ItemDraft, ItemId, ItemReference, ItemState, ItemType};
pub use model::request::{DeletionRequest, FilterSpec, LabelMatch, PredicateSpec, WipeRequest};
pub use service::mutation_service::{MutationError, MutationReport, MutationService};
pub use service::query_service::{CollectionSnapshot, QueryService};
pub use store::{
    FetchHints, ItemFailure, ItemStore, MemoryItemStore, SqliteItemStore, StoreError,
    StoreResult, SubmitOutcome,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
