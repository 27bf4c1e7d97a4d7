//! Item store schema steps.
//!
//! # Invariants
//! - Steps are listed in ascending `version` order.
//! - A run applies every pending step in one transaction, or none of them.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "items",
        sql: include_str!("0001_items.sql"),
    },
    SchemaStep {
        version: 2,
        name: "item_type_index",
        sql: include_str!("0002_item_type_index.sql"),
    },
];

/// Columns `SqliteItemStore` reads from `items`.
const ITEM_COLUMNS: &[&str] = &[
    "seq",
    "uuid",
    "content_type",
    "fields",
    "is_deleted",
    "created_at",
    "updated_at",
];

/// Newest schema version this build can write.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Schema version recorded in the database file.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}

/// Upgrades the item schema to [`latest_version`] and checks the result.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found = schema_version(conn)?;
    let supported = latest_version();
    if found > supported {
        return Err(DbError::SchemaTooNew { found, supported });
    }

    let pending: Vec<&SchemaStep> = STEPS.iter().filter(|step| step.version > found).collect();
    if !pending.is_empty() {
        let tx = conn.transaction()?;
        for step in &pending {
            tx.execute_batch(step.sql)
                .and_then(|()| tx.pragma_update(None, "user_version", step.version))
                .map_err(|source| DbError::Migration {
                    version: step.version,
                    source,
                })?;
            info!(
                "event=db_migrate module=db status=ok step={} version={}",
                step.name, step.version
            );
        }
        tx.commit()?;
    }

    verify_items_table(conn)
}

fn verify_items_table(conn: &Connection) -> DbResult<()> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('items');")?;
    let present = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    match ITEM_COLUMNS
        .iter()
        .find(|column| !present.iter().any(|name| name.as_str() == **column))
    {
        Some(&missing_column) => Err(DbError::NotAnItemStore { missing_column }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version, schema_version};
    use crate::db::DbError;
    use rusqlite::Connection;

    #[test]
    fn fresh_database_reaches_latest_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), latest_version());
        apply_migrations(&mut conn).unwrap();
    }

    #[test]
    fn current_version_without_items_table_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", latest_version())
            .unwrap();
        let err = apply_migrations(&mut conn).unwrap_err();
        assert!(matches!(
            err,
            DbError::NotAnItemStore {
                missing_column: "seq"
            }
        ));
    }
}
