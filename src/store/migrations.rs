//! Versioned, additive schema migrations.
//!
//! Each migration is idempotent and only ever adds tables or columns —
//! existing rows are never destroyed. The applied version is recorded in
//! the `schema_version` marker table and checked once at open.

use rusqlite::Connection;
use tracing::warn;

use super::StoreError;

/// Ordered migration list. Index + 1 is the schema version.
const MIGRATIONS: &[&str] = &[
    // v1: the base append-only analysis log with the cache-key index.
    "CREATE TABLE IF NOT EXISTS analysis_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
        diff_hash TEXT,
        prompt_hash TEXT,
        model TEXT,
        response TEXT,
        cost REAL
    );
    CREATE INDEX IF NOT EXISTS idx_cache
        ON analysis_history (diff_hash, prompt_hash, model);",
    // v2: repo scoping, curated summaries/tags, entry classification, and
    // the audit snapshot.
    "ALTER TABLE analysis_history ADD COLUMN repo_name TEXT DEFAULT '';
    ALTER TABLE analysis_history ADD COLUMN summary TEXT DEFAULT '';
    ALTER TABLE analysis_history ADD COLUMN tags TEXT DEFAULT '';
    ALTER TABLE analysis_history ADD COLUMN entry_type TEXT DEFAULT 'review';
    ALTER TABLE analysis_history ADD COLUMN config_snapshot TEXT;
    CREATE INDEX IF NOT EXISTS idx_repo ON analysis_history (repo_name);",
];

/// Full-text index over summary and tags. Created outside the versioned
/// list because FTS5 availability depends on the SQLite build — failure
/// degrades search to LIKE matching instead of blocking the store.
const FTS_SCHEMA: &str = "CREATE VIRTUAL TABLE IF NOT EXISTS history_fts
    USING fts5(summary, tags);";

/// Apply pending migrations and report whether full-text search is usable.
pub fn apply(conn: &Connection) -> Result<bool, StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let current: i64 = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i64>>(0)
        })?
        .unwrap_or(0);

    for (idx, sql) in MIGRATIONS.iter().enumerate() {
        let version = idx as i64 + 1;
        if version <= current {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    }

    let fts = match conn.execute_batch(FTS_SCHEMA) {
        Ok(()) => {
            backfill_fts(conn)?;
            true
        }
        Err(e) => {
            warn!("full-text index unavailable, falling back to substring search: {e}");
            false
        }
    };

    Ok(fts)
}

/// Index any rows missing from the FTS table (e.g. written before the FTS
/// migration or by a build without FTS5).
fn backfill_fts(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO history_fts (rowid, summary, tags)
         SELECT id, summary, tags FROM analysis_history
         WHERE id NOT IN (SELECT rowid FROM history_fts)",
        [],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply(&conn).unwrap();
        apply(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, MIGRATIONS.len() as i64);
    }

    #[test]
    fn v1_rows_survive_later_migrations() {
        let conn = Connection::open_in_memory().unwrap();

        // Simulate a v1-era database with existing data.
        conn.execute_batch(MIGRATIONS[0]).unwrap();
        conn.execute(
            "CREATE TABLE schema_version (version INTEGER NOT NULL)",
            [],
        )
        .unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])
            .unwrap();
        conn.execute(
            "INSERT INTO analysis_history (diff_hash, prompt_hash, model, response, cost)
             VALUES ('d', 'p', 'm', 'old response', 0.0)",
            [],
        )
        .unwrap();

        apply(&conn).unwrap();

        let (response, entry_type): (String, String) = conn
            .query_row(
                "SELECT response, entry_type FROM analysis_history WHERE diff_hash = 'd'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(response, "old response");
        assert_eq!(entry_type, "review");
    }
}
