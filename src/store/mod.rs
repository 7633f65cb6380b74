//! Persistent analysis-history store.
//!
//! One SQLite database per installation holds an append-only log of past
//! analyses. The same log backs two concerns: content-addressed caching
//! (exact lookup on diff hash + base-prompt hash + model) and historical
//! context retrieval (recency- or relevance-ranked entries injected into
//! new prompts).
//!
//! Concurrent CLI invocations share the database; WAL journaling handles
//! reader/writer coexistence, so there are no in-process locks. Store
//! failures are never fatal to a workflow — callers degrade to a cache
//! miss or empty context.

mod migrations;

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use strum::{Display, EnumString};
use thiserror::Error;

use crate::constants;
use crate::env::Env;

/// Errors from the history store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("could not determine data directory")]
    NoDataDir,

    #[error("no history entry with id {0}")]
    NotFound(i64),

    #[error("failed to create data directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Classification of a history entry.
///
/// `AgentSession` entries are curated lessons recorded from reviewed agent
/// sessions; they rank ahead of routine `Review` output when context is
/// assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    #[default]
    Review,
    AgentSession,
}

/// A new entry to append to the analysis log.
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub diff_hash: String,
    pub prompt_hash: String,
    pub model: String,
    pub response: String,
    pub cost: Option<f64>,
    pub repo_name: String,
    pub summary: String,
    /// Comma-joined; normalised to sorted form on write.
    pub tags: String,
    pub entry_type: EntryType,
    pub config_snapshot: Option<String>,
}

/// A stored history entry, as listed by the `history` command.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub timestamp: String,
    pub diff_hash: String,
    pub prompt_hash: String,
    pub model: String,
    pub response: String,
    pub cost: Option<f64>,
    pub repo_name: String,
    pub summary: String,
    pub tags: String,
    pub entry_type: String,
    pub config_snapshot: Option<String>,
}

/// A context entry handed to prompt templates.
///
/// `status` is `"ok"` for real entries and `"no_history"` for the sentinel
/// returned when a repository has no usable history — templates render a
/// stable placeholder instead of branching on an empty list.
#[derive(Debug, Clone, Serialize)]
pub struct ContextEntry {
    pub id: i64,
    pub timestamp: String,
    pub model: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub entry_type: String,
    pub status: String,
}

impl ContextEntry {
    /// The sentinel entry returned when nothing matches.
    pub fn no_history() -> Self {
        Self {
            id: 0,
            timestamp: String::new(),
            model: String::new(),
            summary: "No prior analysis history for this repository.".to_string(),
            tags: Vec::new(),
            entry_type: String::new(),
            status: "no_history".to_string(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.status == "no_history"
    }
}

/// The analysis-history store.
pub struct CacheStore {
    conn: Connection,
    /// Whether the FTS5 index is available; when false, search degrades to
    /// LIKE substring matching.
    fts: bool,
}

impl CacheStore {
    /// Open (creating if needed) the store at `path` and apply pending
    /// schema migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let conn = Connection::open(path)?;
        // WAL lets concurrent invocations read while one writes.
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let fts = migrations::apply(&conn)?;
        Ok(Self { conn, fts })
    }

    /// Open an in-memory store (tests).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let fts = migrations::apply(&conn)?;
        Ok(Self { conn, fts })
    }

    /// Resolve the default database path: `$REDLINE_DB`, else
    /// `~/.local/share/redline/history.sqlite3`.
    pub fn default_path(env: &Env) -> Result<PathBuf, StoreError> {
        if let Ok(path) = env.var(constants::ENV_DB) {
            return Ok(PathBuf::from(path));
        }
        dirs::data_dir()
            .map(|d| d.join(constants::CONFIG_DIR).join(constants::DB_FILENAME))
            .ok_or(StoreError::NoDataDir)
    }

    /// Exact cache lookup. Multiple entries may share a key (the log is
    /// append-only); the newest wins.
    pub fn get_cache(
        &self,
        diff_hash: &str,
        prompt_hash: &str,
        model: &str,
    ) -> Result<Option<String>, StoreError> {
        let response = self
            .conn
            .query_row(
                "SELECT response FROM analysis_history
                 WHERE diff_hash = ?1 AND prompt_hash = ?2 AND model = ?3
                 ORDER BY timestamp DESC, id DESC LIMIT 1",
                params![diff_hash, prompt_hash, model],
                |row| row.get(0),
            )
            .optional()?;
        Ok(response)
    }

    /// Append a new entry and return its id.
    pub fn save_cache(&self, entry: &NewEntry) -> Result<i64, StoreError> {
        let tags = normalize_tags(&entry.tags);
        self.conn.execute(
            "INSERT INTO analysis_history
             (diff_hash, prompt_hash, model, response, cost, repo_name,
              summary, tags, entry_type, config_snapshot)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.diff_hash,
                entry.prompt_hash,
                entry.model,
                entry.response,
                entry.cost.unwrap_or(0.0),
                entry.repo_name,
                entry.summary,
                tags,
                entry.entry_type.to_string(),
                entry.config_snapshot,
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        if self.fts {
            self.conn.execute(
                "INSERT INTO history_fts (rowid, summary, tags) VALUES (?1, ?2, ?3)",
                params![id, entry.summary, tags],
            )?;
        }

        Ok(id)
    }

    /// Retrieve historical context for a repository.
    ///
    /// Without a query: the most recent entries, with `agent_session`
    /// entries ranked ahead of `review` entries. With a query: relevance-
    /// ranked full-text search over summary and tags, scoped to the repo,
    /// degrading to substring matching when FTS is unavailable.
    ///
    /// Never returns an empty list — a single "no history" sentinel stands
    /// in when nothing matches.
    pub fn get_context(
        &self,
        repo_name: &str,
        limit: usize,
        query: Option<&str>,
    ) -> Result<Vec<ContextEntry>, StoreError> {
        let entries = match query.map(str::trim).filter(|q| !q.is_empty()) {
            None => self.context_by_recency(repo_name, limit)?,
            Some(q) if self.fts => match self.context_by_fts(repo_name, limit, q) {
                Ok(entries) => entries,
                // A malformed FTS query string shouldn't kill the lookup.
                Err(StoreError::Database(_)) => self.context_by_like(repo_name, limit, q)?,
                Err(e) => return Err(e),
            },
            Some(q) => self.context_by_like(repo_name, limit, q)?,
        };

        if entries.is_empty() {
            return Ok(vec![ContextEntry::no_history()]);
        }
        Ok(entries)
    }

    fn context_by_recency(
        &self,
        repo_name: &str,
        limit: usize,
    ) -> Result<Vec<ContextEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, model, summary, tags, entry_type
             FROM analysis_history
             WHERE repo_name = ?1
             ORDER BY CASE entry_type WHEN 'agent_session' THEN 0 ELSE 1 END,
                      timestamp DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![repo_name, limit as i64], row_to_context)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn context_by_fts(
        &self,
        repo_name: &str,
        limit: usize,
        query: &str,
    ) -> Result<Vec<ContextEntry>, StoreError> {
        // Quote the user's words as a phrase so FTS punctuation operators
        // can't break the query.
        let phrase = format!("\"{}\"", query.replace('"', "\"\""));
        let mut stmt = self.conn.prepare(
            "SELECT h.id, h.timestamp, h.model, h.summary, h.tags, h.entry_type
             FROM history_fts f
             JOIN analysis_history h ON h.id = f.rowid
             WHERE history_fts MATCH ?1 AND h.repo_name = ?2
             ORDER BY rank
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![phrase, repo_name, limit as i64], row_to_context)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn context_by_like(
        &self,
        repo_name: &str,
        limit: usize,
        query: &str,
    ) -> Result<Vec<ContextEntry>, StoreError> {
        let needle = format!("%{query}%");
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, model, summary, tags, entry_type
             FROM analysis_history
             WHERE repo_name = ?1 AND (summary LIKE ?2 OR tags LIKE ?2)
             ORDER BY timestamp DESC, id DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![repo_name, needle, limit as i64], row_to_context)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// List recent entries, optionally scoped to a repository.
    pub fn recent(
        &self,
        repo_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, diff_hash, prompt_hash, model, response,
                    cost, repo_name, summary, tags, entry_type, config_snapshot
             FROM analysis_history
             WHERE (?1 IS NULL OR repo_name = ?1)
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![repo_name, limit as i64], row_to_entry)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Fetch a single entry by id.
    pub fn entry(&self, id: i64) -> Result<HistoryEntry, StoreError> {
        self.conn
            .query_row(
                "SELECT id, timestamp, diff_hash, prompt_hash, model, response,
                        cost, repo_name, summary, tags, entry_type, config_snapshot
                 FROM analysis_history WHERE id = ?1",
                params![id],
                row_to_entry,
            )
            .optional()?
            .ok_or(StoreError::NotFound(id))
    }

    /// Edit an entry's tags: set union with `add`, set difference with
    /// `remove`, re-serialized sorted. The only in-place mutation the
    /// store permits.
    pub fn update_tags(
        &self,
        id: i64,
        add: &[String],
        remove: &[String],
    ) -> Result<String, StoreError> {
        let current: Option<String> = self
            .conn
            .query_row(
                "SELECT tags FROM analysis_history WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let current = current.ok_or(StoreError::NotFound(id))?;

        let mut tags: Vec<String> = split_tags(&current);
        for tag in add {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }
        tags.retain(|t| !remove.iter().any(|r| r.trim() == t));
        tags.sort();
        let joined = tags.join(",");

        self.conn.execute(
            "UPDATE analysis_history SET tags = ?1 WHERE id = ?2",
            params![joined, id],
        )?;
        if self.fts {
            self.conn.execute(
                "UPDATE history_fts SET tags = ?1 WHERE rowid = ?2",
                params![joined, id],
            )?;
        }
        Ok(joined)
    }

    /// Whether full-text search is active (surfaced by `doctor`).
    pub fn fts_enabled(&self) -> bool {
        self.fts
    }
}

fn row_to_context(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContextEntry> {
    Ok(ContextEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        model: row.get(2)?,
        summary: row.get(3)?,
        tags: split_tags(&row.get::<_, String>(4)?),
        entry_type: row.get(5)?,
        status: "ok".to_string(),
    })
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        diff_hash: row.get(2)?,
        prompt_hash: row.get(3)?,
        model: row.get(4)?,
        response: row.get(5)?,
        cost: row.get(6)?,
        repo_name: row.get(7)?,
        summary: row.get(8)?,
        tags: row.get(9)?,
        entry_type: row.get(10)?,
        config_snapshot: row.get(11)?,
    })
}

/// Split a comma-joined tag string into trimmed, non-empty tags.
fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Normalise a comma-joined tag string to sorted, deduplicated form.
fn normalize_tags(tags: &str) -> String {
    let mut tags = split_tags(tags);
    tags.sort();
    tags.dedup();
    tags.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(diff: &str, prompt: &str, model: &str, response: &str) -> NewEntry {
        NewEntry {
            diff_hash: diff.to_string(),
            prompt_hash: prompt.to_string(),
            model: model.to_string(),
            response: response.to_string(),
            repo_name: "myrepo".to_string(),
            summary: format!("{response} summary"),
            tags: "pr_review".to_string(),
            ..NewEntry::default()
        }
    }

    #[test]
    fn cache_roundtrip() {
        let store = CacheStore::open_in_memory().unwrap();
        store.save_cache(&entry("d1", "p1", "m1", "the response")).unwrap();

        let cached = store.get_cache("d1", "p1", "m1").unwrap();
        assert_eq!(cached.as_deref(), Some("the response"));
    }

    #[test]
    fn cache_miss_returns_none() {
        let store = CacheStore::open_in_memory().unwrap();
        assert!(store.get_cache("nope", "nope", "nope").unwrap().is_none());
    }

    #[test]
    fn newest_entry_wins_on_duplicate_key() {
        let store = CacheStore::open_in_memory().unwrap();
        store.save_cache(&entry("d1", "p1", "m1", "old")).unwrap();
        store.save_cache(&entry("d1", "p1", "m1", "new")).unwrap();

        let cached = store.get_cache("d1", "p1", "m1").unwrap();
        assert_eq!(cached.as_deref(), Some("new"));
    }

    #[test]
    fn key_components_all_matter() {
        let store = CacheStore::open_in_memory().unwrap();
        store.save_cache(&entry("d1", "p1", "m1", "r")).unwrap();

        assert!(store.get_cache("d2", "p1", "m1").unwrap().is_none());
        assert!(store.get_cache("d1", "p2", "m1").unwrap().is_none());
        assert!(store.get_cache("d1", "p1", "m2").unwrap().is_none());
    }

    #[test]
    fn context_sentinel_when_empty() {
        let store = CacheStore::open_in_memory().unwrap();
        let context = store.get_context("myrepo", 5, None).unwrap();
        assert_eq!(context.len(), 1);
        assert!(context[0].is_sentinel());
        assert_eq!(context[0].status, "no_history");
    }

    #[test]
    fn context_scoped_to_repo() {
        let store = CacheStore::open_in_memory().unwrap();
        let mut other = entry("d1", "p1", "m1", "elsewhere");
        other.repo_name = "other".to_string();
        store.save_cache(&other).unwrap();

        let context = store.get_context("myrepo", 5, None).unwrap();
        assert!(context[0].is_sentinel());
    }

    #[test]
    fn agent_sessions_rank_ahead_of_reviews() {
        let store = CacheStore::open_in_memory().unwrap();
        store.save_cache(&entry("d1", "p1", "m1", "review one")).unwrap();
        store.save_cache(&entry("d2", "p2", "m1", "review two")).unwrap();
        let mut lesson = entry("d3", "p3", "summarizer", "lesson");
        lesson.entry_type = EntryType::AgentSession;
        store.save_cache(&lesson).unwrap();

        let context = store.get_context("myrepo", 3, None).unwrap();
        assert_eq!(context[0].entry_type, "agent_session");
        assert_eq!(context[0].summary, "lesson summary");
        // Remaining entries newest first
        assert_eq!(context[1].summary, "review two summary");
    }

    #[test]
    fn search_matches_summary_and_tags() {
        let store = CacheStore::open_in_memory().unwrap();
        store.save_cache(&entry("d1", "p1", "m1", "refactored the parser")).unwrap();
        let mut tagged = entry("d2", "p2", "m1", "other work");
        tagged.tags = "parser,hotfix".to_string();
        store.save_cache(&tagged).unwrap();
        store.save_cache(&entry("d3", "p3", "m1", "unrelated")).unwrap();

        let hits = store.get_context("myrepo", 10, Some("parser")).unwrap();
        assert_eq!(hits.len(), 2, "expected both parser entries: {hits:?}");
        assert!(hits.iter().all(|h| !h.is_sentinel()));

        let none = store.get_context("myrepo", 10, Some("nonexistent-term")).unwrap();
        assert_eq!(none.len(), 1);
        assert!(none[0].is_sentinel());
    }

    #[test]
    fn like_fallback_matches_without_fts() {
        let mut store = CacheStore::open_in_memory().unwrap();
        store.save_cache(&entry("d1", "p1", "m1", "refactored the parser")).unwrap();
        store.fts = false;

        let hits = store.get_context("myrepo", 10, Some("parser")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].summary, "refactored the parser summary");
    }

    #[test]
    fn update_tags_union_and_difference_sorted() {
        let store = CacheStore::open_in_memory().unwrap();
        let mut e = entry("d1", "p1", "m1", "r");
        e.tags = "zeta,alpha".to_string();
        let id = store.save_cache(&e).unwrap();

        let tags = store
            .update_tags(id, &["mid".to_string(), "alpha".to_string()], &["zeta".to_string()])
            .unwrap();
        assert_eq!(tags, "alpha,mid");

        let stored = store.entry(id).unwrap();
        assert_eq!(stored.tags, "alpha,mid");
    }

    #[test]
    fn update_tags_unknown_id_is_not_found() {
        let store = CacheStore::open_in_memory().unwrap();
        let err = store.update_tags(42, &[], &[]).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
    }

    #[test]
    fn recent_lists_all_repos_unless_scoped() {
        let store = CacheStore::open_in_memory().unwrap();
        store.save_cache(&entry("d1", "p1", "m1", "one")).unwrap();
        let mut other = entry("d2", "p2", "m1", "two");
        other.repo_name = "other".to_string();
        store.save_cache(&other).unwrap();

        assert_eq!(store.recent(None, 10).unwrap().len(), 2);
        assert_eq!(store.recent(Some("myrepo"), 10).unwrap().len(), 1);
    }

    #[test]
    fn save_normalizes_tags() {
        let store = CacheStore::open_in_memory().unwrap();
        let mut e = entry("d1", "p1", "m1", "r");
        e.tags = "zeta, alpha,zeta".to_string();
        let id = store.save_cache(&e).unwrap();
        assert_eq!(store.entry(id).unwrap().tags, "alpha,zeta");
    }

    #[test]
    fn snapshot_roundtrips() {
        let store = CacheStore::open_in_memory().unwrap();
        let mut e = entry("d1", "p1", "m1", "r");
        e.config_snapshot = Some("{\"repo_name\":\"myrepo\"}".to_string());
        let id = store.save_cache(&e).unwrap();
        assert_eq!(
            store.entry(id).unwrap().config_snapshot.as_deref(),
            Some("{\"repo_name\":\"myrepo\"}")
        );
    }

    #[test]
    fn reopen_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.sqlite3");
        {
            let store = CacheStore::open(&path).unwrap();
            store.save_cache(&entry("d1", "p1", "m1", "persisted")).unwrap();
        }
        let store = CacheStore::open(&path).unwrap();
        assert_eq!(
            store.get_cache("d1", "p1", "m1").unwrap().as_deref(),
            Some("persisted")
        );
    }
}
