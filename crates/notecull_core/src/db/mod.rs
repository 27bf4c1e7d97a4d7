//! SQLite bootstrap for the local Item Store.
//!
//! # Responsibility
//! - Open connections backing `SqliteItemStore`.
//! - Bring the `items` schema up to date and confirm its shape.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - A connection is handed out only after migrations succeed and the
//!   `items` table carries every column the store reads.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was written by a newer notecull.
    SchemaTooNew { found: u32, supported: u32 },
    /// One migration script failed; nothing from the run was committed.
    Migration { version: u32, source: rusqlite::Error },
    /// The file claims a known version but is not an item store.
    NotAnItemStore { missing_column: &'static str },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "item store sqlite error: {err}"),
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "item store was written with schema v{found}; this build reads up to v{supported}"
            ),
            Self::Migration { version, source } => {
                write!(f, "item store migration to v{version} failed: {source}")
            }
            Self::NotAnItemStore { missing_column } => write!(
                f,
                "database is not a notecull item store (items.{missing_column} missing)"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Migration { source: err, .. } => Some(err),
            Self::SchemaTooNew { .. } | Self::NotAnItemStore { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
