//! Provenance schema revisions.
//!
//! Revision `n` is the SQL script that upgrades a store from `n - 1`.
//! Pending revisions run inside one transaction, so a store is either at
//! its old revision or fully upgraded.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// Ordered by revision, starting at 1 with no gaps.
const REVISIONS: &[(u32, &str)] = &[(1, include_str!("0001_init.sql"))];

/// Newest schema revision this build can read and write.
pub fn latest_version() -> u32 {
    REVISIONS.last().map_or(0, |(revision, _)| *revision)
}

/// Brings `conn` up to `latest_version()`.
///
/// # Errors
/// - `SchemaTooNew` when the store is ahead of this build; nothing is touched.
/// - `Sqlite` when a script fails; the transaction is rolled back.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found = schema_revision(conn)?;
    let supported = latest_version();
    if found > supported {
        return Err(DbError::SchemaTooNew { found, supported });
    }

    let pending = REVISIONS
        .iter()
        .filter(|(revision, _)| *revision > found)
        .collect::<Vec<_>>();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (revision, script) in &pending {
        tx.execute_batch(script)?;
        tx.pragma_update(None, "user_version", revision)?;
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from={found} to={supported}");
    Ok(())
}

fn schema_revision(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
