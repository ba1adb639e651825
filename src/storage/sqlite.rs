//! `SQLite` store for rules, flows and the FTS5 knowledge base.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::{FlowStore, KnowledgeHit, KnowledgeStore, RuleStore};
use crate::core::{ConversationFlow, KeywordRule, MatchType, ResponseType};
use crate::error::StorageError;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS keyword_rules (
    seq            INTEGER PRIMARY KEY AUTOINCREMENT,
    id             TEXT NOT NULL UNIQUE,
    name           TEXT NOT NULL,
    keywords       TEXT NOT NULL,
    match_type     TEXT NOT NULL,
    response_type  TEXT NOT NULL,
    response       TEXT NOT NULL,
    priority       INTEGER NOT NULL DEFAULT 0,
    enabled        INTEGER NOT NULL DEFAULT 1,
    case_sensitive INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS conversation_flows (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    id         TEXT NOT NULL UNIQUE,
    name       TEXT NOT NULL,
    definition TEXT NOT NULL
);

CREATE VIRTUAL TABLE IF NOT EXISTS knowledge USING fts5(
    title,
    content,
    tokenize = 'unicode61 remove_diacritics 2'
);
";

/// `SQLite`-backed store.
///
/// The connection sits behind a mutex so the store can be shared with the
/// engine; knowledge searches run on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database file.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    /// Opens an in-memory database.
    pub fn in_memory() -> Result<Self, StorageError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Task("sqlite connection lock poisoned".to_string()))
    }

    /// Creates the schema if it does not exist.
    pub fn init(&self) -> Result<(), StorageError> {
        self.lock()?.execute_batch(SCHEMA)?;
        debug!("schema initialized");
        Ok(())
    }

    /// Whether [`init`](Self::init) has run on this database.
    pub fn is_initialized(&self) -> Result<bool, StorageError> {
        let found: Option<String> = self
            .lock()?
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'keyword_rules'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Inserts or replaces a rule. Replacing keeps the rule's original
    /// load position.
    pub fn upsert_rule(&self, rule: &KeywordRule) -> Result<(), StorageError> {
        let keywords = serde_json::to_string(&rule.keywords)?;
        self.lock()?.execute(
            "INSERT INTO keyword_rules
                 (id, name, keywords, match_type, response_type, response, priority, enabled, case_sensitive)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 keywords = excluded.keywords,
                 match_type = excluded.match_type,
                 response_type = excluded.response_type,
                 response = excluded.response,
                 priority = excluded.priority,
                 enabled = excluded.enabled,
                 case_sensitive = excluded.case_sensitive",
            params![
                rule.id,
                rule.name,
                keywords,
                rule.match_type.as_str(),
                rule.response_type.as_str(),
                rule.response,
                rule.priority,
                rule.enabled,
                rule.case_sensitive,
            ],
        )?;
        Ok(())
    }

    /// Every rule, enabled or not, in load order.
    pub fn list_rules(&self) -> Result<Vec<KeywordRule>, StorageError> {
        self.query_rules("SELECT id, name, keywords, match_type, response_type, response, priority, enabled, case_sensitive
                          FROM keyword_rules ORDER BY seq")
    }

    fn query_rules(&self, sql: &str) -> Result<Vec<KeywordRule>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, bool>(7)?,
                row.get::<_, bool>(8)?,
            ))
        })?;

        let mut rules = Vec::new();
        for row in rows {
            let (id, name, keywords, match_type, response_type, response, priority, enabled, case_sensitive) =
                row?;
            let match_type = MatchType::parse(&match_type).ok_or_else(|| {
                StorageError::Invalid(format!("rule {id}: unknown match type {match_type:?}"))
            })?;
            let response_type = ResponseType::parse(&response_type).ok_or_else(|| {
                StorageError::Invalid(format!("rule {id}: unknown response type {response_type:?}"))
            })?;
            rules.push(KeywordRule {
                keywords: serde_json::from_str(&keywords)?,
                id,
                name,
                match_type,
                response_type,
                response,
                priority,
                enabled,
                case_sensitive,
            });
        }
        Ok(rules)
    }

    /// Inserts or replaces a flow definition.
    pub fn upsert_flow(&self, flow: &ConversationFlow) -> Result<(), StorageError> {
        let definition = serde_json::to_string(flow)?;
        self.lock()?.execute(
            "INSERT INTO conversation_flows (id, name, definition) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, definition = excluded.definition",
            params![flow.id, flow.name, definition],
        )?;
        Ok(())
    }

    /// Adds a knowledge document and returns its row id.
    pub fn add_document(&self, title: &str, content: &str) -> Result<i64, StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO knowledge (title, content) VALUES (?1, ?2)",
            params![title, content],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Number of knowledge documents.
    pub fn document_count(&self) -> Result<usize, StorageError> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM knowledge", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn search_blocking(
        conn: &Connection,
        keywords: &[String],
        limit: usize,
        min_score: f64,
    ) -> Result<Vec<KnowledgeHit>, StorageError> {
        let query = fts_query(keywords);
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare(
            "SELECT title, content, -bm25(knowledge) AS s
             FROM knowledge
             WHERE knowledge MATCH ?1
             ORDER BY bm25(knowledge)
             LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![query, limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;

        let rows = rows.collect::<Result<Vec<_>, _>>()?;
        let best = rows.first().map_or(0.0, |(_, _, raw)| *raw);

        Ok(rows
            .into_iter()
            .map(|(title, content, raw)| KnowledgeHit {
                title,
                content,
                score: relevance(raw, best),
            })
            .filter(|hit| hit.score >= min_score)
            .collect())
    }
}

/// BM25 score relative to the best hit of the same query, in `[0, 1]`.
///
/// FTS5 floors the IDF of terms present in half the corpus or more, so
/// absolute scores are near zero for small knowledge bases.
fn relevance(raw: f64, best: f64) -> f64 {
    if best <= 0.0 {
        return 1.0;
    }
    (raw.max(0.0) / best).clamp(0.0, 1.0)
}

/// OR-query of quoted terms, so user text never hits FTS5 syntax.
fn fts_query(keywords: &[String]) -> String {
    keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|k| format!("\"{}\"", k.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

impl RuleStore for SqliteStore {
    fn load_rules(&self) -> Result<Vec<KeywordRule>, StorageError> {
        self.query_rules("SELECT id, name, keywords, match_type, response_type, response, priority, enabled, case_sensitive
                          FROM keyword_rules WHERE enabled = 1 ORDER BY seq")
    }
}

impl FlowStore for SqliteStore {
    fn load_flows(&self) -> Result<Vec<ConversationFlow>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT definition FROM conversation_flows ORDER BY seq")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut flows = Vec::new();
        for row in rows {
            flows.push(serde_json::from_str(&row?)?);
        }
        Ok(flows)
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn search(
        &self,
        keywords: &[String],
        limit: usize,
        min_score: f64,
    ) -> Result<Vec<KnowledgeHit>, StorageError> {
        let store = self.clone();
        let keywords = keywords.to_vec();
        tokio::task::spawn_blocking(move || {
            let conn = store.lock()?;
            Self::search_blocking(&conn, &keywords, limit, min_score)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}
