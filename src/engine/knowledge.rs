//! Knowledge-base retrieval for AI grounding.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::storage::{KnowledgeStore, NoKnowledge};

/// Most keywords sent to the store per query.
pub const MAX_KEYWORDS: usize = 10;
/// Default number of snippets returned.
pub const DEFAULT_MAX_CHUNKS: usize = 3;
/// Default minimum relevance score.
pub const DEFAULT_MIN_RELEVANCE: f64 = 0.3;

/// Spanish and English words that carry no search signal.
const STOP_WORDS: &[&str] = &[
    // es
    "que", "qué", "los", "las", "del", "por", "para", "con", "una", "uno", "unos", "unas", "como",
    "cómo", "cual", "cuál", "cuando", "cuándo", "donde", "dónde", "hay", "mas", "más", "pero",
    "sus", "este", "esta", "esto", "estos", "estas", "ese", "esa", "eso", "ser", "son", "está",
    "estan", "están", "tiene", "tienen", "tengo", "muy", "sin", "sobre", "entre", "hola", "quiero",
    "puedo", "puede", "gracias", "favor", "también", "ustedes", "vosotros",
    // en
    "the", "and", "for", "are", "but", "not", "you", "your", "with", "have", "has", "this",
    "that", "from", "what", "when", "where", "which", "who", "how", "can", "could", "would",
    "about", "there", "their", "they", "was", "were", "will", "please", "thanks", "hello",
];

/// Lower-cased, punctuation-free, de-duplicated search keywords, at most
/// [`MAX_KEYWORDS`], in order of first appearance.
#[must_use]
pub fn extract_keywords(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    let mut seen = HashSet::new();
    lowered
        .unicode_words()
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .take(MAX_KEYWORDS)
        .collect()
}

/// Fetches grounding snippets for a user query.
#[derive(Clone)]
pub struct KnowledgeRetriever {
    store: Arc<dyn KnowledgeStore>,
    max_chunks: usize,
    min_relevance: f64,
}

impl std::fmt::Debug for KnowledgeRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeRetriever")
            .field("max_chunks", &self.max_chunks)
            .field("min_relevance", &self.min_relevance)
            .finish_non_exhaustive()
    }
}

impl Default for KnowledgeRetriever {
    fn default() -> Self {
        Self::new(Arc::new(NoKnowledge))
    }
}

impl KnowledgeRetriever {
    /// Creates a retriever over `store` with default limits.
    #[must_use]
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            store,
            max_chunks: DEFAULT_MAX_CHUNKS,
            min_relevance: DEFAULT_MIN_RELEVANCE,
        }
    }

    /// Sets the snippet cap, clamped to `[1, 10]`.
    #[must_use]
    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.set_max_chunks(max_chunks);
        self
    }

    /// Sets the relevance floor, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_min_relevance(mut self, min_relevance: f64) -> Self {
        self.set_min_relevance(min_relevance);
        self
    }

    /// Sets the snippet cap, clamped to `[1, 10]`.
    pub fn set_max_chunks(&mut self, max_chunks: usize) {
        self.max_chunks = max_chunks.clamp(1, 10);
    }

    /// Sets the relevance floor, clamped to `[0, 1]`. NaN becomes 0.
    pub fn set_min_relevance(&mut self, min_relevance: f64) {
        self.min_relevance = if min_relevance.is_nan() {
            0.0
        } else {
            min_relevance.clamp(0.0, 1.0)
        };
    }

    /// Current snippet cap.
    #[must_use]
    pub const fn max_chunks(&self) -> usize {
        self.max_chunks
    }

    /// Current relevance floor.
    #[must_use]
    pub const fn min_relevance(&self) -> f64 {
        self.min_relevance
    }

    /// Snippets relevant to `query`. Store failures degrade to an empty list.
    pub async fn retrieve(&self, query: &str) -> Vec<String> {
        let keywords = extract_keywords(query);
        if keywords.is_empty() {
            return Vec::new();
        }

        match self
            .store
            .search(&keywords, self.max_chunks, self.min_relevance)
            .await
        {
            Ok(hits) => {
                debug!(keywords = ?keywords, hits = hits.len(), "knowledge retrieved");
                hits.into_iter()
                    .take(self.max_chunks)
                    .map(|hit| {
                        if hit.title.trim().is_empty() {
                            hit.content
                        } else {
                            format!("{}: {}", hit.title, hit.content)
                        }
                    })
                    .collect()
            }
            Err(err) => {
                warn!(error = %err, "knowledge search failed, continuing without context");
                Vec::new()
            }
        }
    }
}
