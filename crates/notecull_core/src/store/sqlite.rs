//! SQLite-backed local Item Store.
//!
//! # Responsibility
//! - Persist decrypted items for local use of the engine and CLI.
//! - Honor the same fetch/submit/create contract as a remote store.
//!
//! # Invariants
//! - Fetch order is insertion order (`seq ASC`).
//! - One `submit` call is one transaction; unknown ids are per-item failures.
//! - Rows that fail to decode are rejected, never masked.

use super::{FetchHints, ItemFailure, ItemStore, StoreError, StoreResult, SubmitOutcome};
use crate::db::{open_db, open_db_in_memory};
use crate::model::item::{Item, ItemDraft, ItemId, ItemState, ItemType, LABEL_FIELD};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::BTreeMap;
use std::path::Path;

/// Items accepted per submit call unless configured otherwise.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 150;

const ITEM_SELECT_SQL: &str = "SELECT
    uuid,
    content_type,
    fields,
    is_deleted,
    created_at,
    updated_at
FROM items";

pub struct SqliteItemStore {
    conn: Mutex<Connection>,
    max_batch_size: usize,
}

impl SqliteItemStore {
    /// Wraps a migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }

    /// Opens (and migrates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    /// Reads one item by id, tombstoned or not.
    pub fn get(&self, id: &ItemId) -> StoreResult<Option<Item>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("{ITEM_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query(params![id.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?));
        }

        Ok(None)
    }
}

impl ItemStore for SqliteItemStore {
    fn fetch(&self, item_type: &ItemType, hints: &FetchHints) -> StoreResult<Vec<Item>> {
        let mut sql = format!("{ITEM_SELECT_SQL} WHERE content_type = ?");
        let mut bind_values: Vec<Value> = vec![Value::Text(item_type.as_str().to_string())];

        if !hints.include_deleted {
            sql.push_str(" AND is_deleted = 0");
        }
        if let Some(label) = hints.label.as_deref() {
            sql.push_str(&format!(" AND json_extract(fields, '$.{LABEL_FIELD}') = ?"));
            bind_values.push(Value::Text(label.to_string()));
        }
        sql.push_str(" ORDER BY seq ASC");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn submit(&self, items: &[Item]) -> StoreResult<SubmitOutcome> {
        if items.len() > self.max_batch_size {
            return Err(StoreError::Rejected(format!(
                "batch of {} exceeds limit {}",
                items.len(),
                self.max_batch_size
            )));
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut outcome = SubmitOutcome::default();
        for item in items {
            let changed = tx.execute(
                "UPDATE items
                 SET
                    content_type = ?1,
                    fields = ?2,
                    is_deleted = ?3,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?4;",
                params![
                    item.item_type.as_str(),
                    encode_fields(&item.fields)?,
                    state_to_db(item.state),
                    item.id.as_str(),
                ],
            )?;
            if changed == 0 {
                outcome.failures.push(ItemFailure {
                    id: item.id.clone(),
                    reason: "unknown item".to_string(),
                });
            } else {
                outcome.succeeded += 1;
            }
        }
        tx.commit()?;
        Ok(outcome)
    }

    fn create(&self, draft: &ItemDraft) -> StoreResult<Item> {
        let id = ItemId::generate();
        {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO items (uuid, content_type, fields, is_deleted)
                 VALUES (?1, ?2, ?3, 0);",
                params![
                    id.as_str(),
                    draft.item_type.as_str(),
                    encode_fields(&draft.fields())?,
                ],
            )?;
        }

        self.get(&id)?.ok_or_else(|| {
            StoreError::InvalidData(format!("created item `{id}` missing in read-back"))
        })
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}

fn parse_item_row(row: &Row<'_>) -> StoreResult<Item> {
    let uuid: String = row.get("uuid")?;
    let fields_text: String = row.get("fields")?;
    let fields: BTreeMap<String, String> =
        serde_json::from_str(&fields_text).map_err(|err| {
            StoreError::InvalidData(format!("invalid fields json for item `{uuid}`: {err}"))
        })?;

    let state = match row.get::<_, i64>("is_deleted")? {
        0 => ItemState::Live,
        1 => ItemState::Tombstoned,
        other => {
            return Err(StoreError::InvalidData(format!(
                "invalid is_deleted value `{other}` in items.is_deleted"
            )));
        }
    };

    Ok(Item {
        id: ItemId::new(uuid),
        item_type: ItemType::new(row.get::<_, String>("content_type")?),
        fields,
        state,
        created_at: Some(row.get::<_, i64>("created_at")?.to_string()),
        updated_at: Some(row.get::<_, i64>("updated_at")?.to_string()),
    })
}

fn encode_fields(fields: &BTreeMap<String, String>) -> StoreResult<String> {
    serde_json::to_string(fields)
        .map_err(|err| StoreError::InvalidData(format!("failed to encode fields: {err}")))
}

fn state_to_db(state: ItemState) -> i64 {
    match state {
        ItemState::Live => 0,
        ItemState::Tombstoned => 1,
    }
}
