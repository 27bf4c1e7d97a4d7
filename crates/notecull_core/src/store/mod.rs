//! Item Store collaborator contract and implementations.
//!
//! # Responsibility
//! - Define the narrow fetch/submit/create contract the engine consumes.
//! - Provide a SQLite-backed local store and an in-memory fixture store.
//!
//! # Invariants
//! - The store is the only source of truth for item identity.
//! - Fetch results may contain duplicates and tombstones; callers filter.
//! - `submit` reports per-item failures instead of collapsing them into one error.

use crate::db::DbError;
use crate::model::item::{Item, ItemDraft, ItemId, ItemType};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryItemStore;
pub use sqlite::SqliteItemStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Whole-call failure reported by an Item Store.
#[derive(Debug)]
pub enum StoreError {
    Unauthorized(String),
    Network(String),
    QuotaExceeded(String),
    /// The call was cancelled or timed out by the store's own contract.
    Cancelled,
    Rejected(String),
    Db(DbError),
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized(message) => write!(f, "store rejected credentials: {message}"),
            Self::Network(message) => write!(f, "store network failure: {message}"),
            Self::QuotaExceeded(message) => write!(f, "store quota exceeded: {message}"),
            Self::Cancelled => write!(f, "store call cancelled"),
            Self::Rejected(message) => write!(f, "store rejected request: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid stored item data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Advisory fetch narrowing. Stores may ignore hints entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchHints {
    /// Exact label the caller is looking for.
    pub label: Option<String>,
    /// Whether tombstoned items should be returned.
    pub include_deleted: bool,
}

impl FetchHints {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            include_deleted: false,
        }
    }
}

/// One item the store refused during a batch submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub id: ItemId,
    pub reason: String,
}

/// Result of one batch submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub succeeded: usize,
    pub failures: Vec<ItemFailure>,
}

impl SubmitOutcome {
    /// Folds another batch outcome into this one.
    pub fn merge(mut self, other: SubmitOutcome) -> Self {
        self.succeeded += other.succeeded;
        self.failures.extend(other.failures);
        self
    }
}

/// Remote, authoritative item store.
///
/// `Sync` so that batch submissions can run concurrently.
pub trait ItemStore: Sync {
    /// Fetches the current collection for one item type.
    fn fetch(&self, item_type: &ItemType, hints: &FetchHints) -> StoreResult<Vec<Item>>;
    /// Persists mutated items, reporting per-item failures.
    fn submit(&self, items: &[Item]) -> StoreResult<SubmitOutcome>;
    /// Creates one item and returns it with its store-assigned identity.
    fn create(&self, draft: &ItemDraft) -> StoreResult<Item>;
    /// Largest batch `submit` accepts.
    fn max_batch_size(&self) -> usize {
        usize::MAX
    }
}

impl<S: ItemStore + ?Sized> ItemStore for &S {
    fn fetch(&self, item_type: &ItemType, hints: &FetchHints) -> StoreResult<Vec<Item>> {
        (**self).fetch(item_type, hints)
    }

    fn submit(&self, items: &[Item]) -> StoreResult<SubmitOutcome> {
        (**self).submit(items)
    }

    fn create(&self, draft: &ItemDraft) -> StoreResult<Item> {
        (**self).create(draft)
    }

    fn max_batch_size(&self) -> usize {
        (**self).max_batch_size()
    }
}
