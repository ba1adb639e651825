//! Persistence for the engine's reference data.
//!
//! The engine reads keyword rules and flows once (and on explicit reload)
//! and queries the knowledge base per AI turn. Sessions are not stored
//! here; the transport owns them.

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryStore, NoKnowledge};
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{ConversationFlow, KeywordRule};
use crate::error::StorageError;

/// Default database path, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".receptionist/receptionist.db";

/// Source of keyword rules.
pub trait RuleStore: Send + Sync {
    /// Enabled rules in load order.
    fn load_rules(&self) -> Result<Vec<KeywordRule>, StorageError>;
}

/// Source of conversation flows.
pub trait FlowStore: Send + Sync {
    /// All flow definitions in load order.
    fn load_flows(&self) -> Result<Vec<ConversationFlow>, StorageError>;
}

/// A ranked knowledge-base snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeHit {
    /// Document title.
    pub title: String,
    /// Snippet text.
    pub content: String,
    /// Relevance in `[0, 1]`, higher is better.
    pub score: f64,
}

/// Full-text search over business documents.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Returns at most `limit` hits scoring at least `min_score`, best first.
    async fn search(
        &self,
        keywords: &[String],
        limit: usize,
        min_score: f64,
    ) -> Result<Vec<KnowledgeHit>, StorageError>;
}
