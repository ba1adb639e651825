//! In-process stores for tests and embedding.

use std::sync::RwLock;

use async_trait::async_trait;

use super::{FlowStore, KnowledgeHit, KnowledgeStore, RuleStore};
use crate::core::{ConversationFlow, KeywordRule};
use crate::error::StorageError;

/// Rules, flows and documents held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rules: RwLock<Vec<KeywordRule>>,
    flows: RwLock<Vec<ConversationFlow>>,
    documents: RwLock<Vec<(String, String)>>,
}

fn poisoned() -> StorageError {
    StorageError::Task("memory store lock poisoned".to_string())
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-loaded with rules and flows.
    #[must_use]
    pub fn with_data(rules: Vec<KeywordRule>, flows: Vec<ConversationFlow>) -> Self {
        Self {
            rules: RwLock::new(rules),
            flows: RwLock::new(flows),
            documents: RwLock::default(),
        }
    }

    /// Appends a rule.
    pub fn add_rule(&self, rule: KeywordRule) -> Result<(), StorageError> {
        self.rules.write().map_err(|_| poisoned())?.push(rule);
        Ok(())
    }

    /// Appends a flow.
    pub fn add_flow(&self, flow: ConversationFlow) -> Result<(), StorageError> {
        self.flows.write().map_err(|_| poisoned())?.push(flow);
        Ok(())
    }

    /// Appends a knowledge document.
    pub fn add_document(&self, title: &str, content: &str) -> Result<(), StorageError> {
        self.documents
            .write()
            .map_err(|_| poisoned())?
            .push((title.to_string(), content.to_string()));
        Ok(())
    }
}

impl RuleStore for MemoryStore {
    fn load_rules(&self) -> Result<Vec<KeywordRule>, StorageError> {
        Ok(self
            .rules
            .read()
            .map_err(|_| poisoned())?
            .iter()
            .filter(|r| r.enabled)
            .cloned()
            .collect())
    }
}

impl FlowStore for MemoryStore {
    fn load_flows(&self) -> Result<Vec<ConversationFlow>, StorageError> {
        Ok(self.flows.read().map_err(|_| poisoned())?.clone())
    }
}

/// Scores a document by the share of keywords it contains.
#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn search(
        &self,
        keywords: &[String],
        limit: usize,
        min_score: f64,
    ) -> Result<Vec<KnowledgeHit>, StorageError> {
        if keywords.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let documents = self.documents.read().map_err(|_| poisoned())?;

        #[allow(clippy::cast_precision_loss)]
        let total = keywords.len() as f64;
        let mut hits: Vec<KnowledgeHit> = documents
            .iter()
            .filter_map(|(title, content)| {
                let haystack = format!("{title} {content}").to_lowercase();
                let found = keywords
                    .iter()
                    .filter(|k| haystack.contains(k.to_lowercase().as_str()))
                    .count();
                #[allow(clippy::cast_precision_loss)]
                let score = found as f64 / total;
                (found > 0 && score >= min_score).then(|| KnowledgeHit {
                    title: title.clone(),
                    content: content.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }
}

/// Knowledge store with no documents; every search is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoKnowledge;

#[async_trait]
impl KnowledgeStore for NoKnowledge {
    async fn search(
        &self,
        _keywords: &[String],
        _limit: usize,
        _min_score: f64,
    ) -> Result<Vec<KnowledgeHit>, StorageError> {
        Ok(Vec::new())
    }
}
