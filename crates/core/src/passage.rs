//! Passage index trait: top-k similarity search over background text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// A stored unit of background text available for retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// The passage text
    pub text: String,

    /// Embedding computed when the passage was loaded
    #[serde(skip)]
    pub embedding: Vec<f32>,

    /// Similarity to the query (set by search operations)
    #[serde(default)]
    pub score: f32,
}

/// The core PassageIndex trait.
///
/// Implementations hold an immutable set of embedded passages and answer
/// nearest-neighbour queries against it.
#[async_trait]
pub trait PassageIndex: Send + Sync {
    /// A short name for logs (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Return up to `k` passages ordered by descending similarity to
    /// `query`. Returns fewer than `k` when the store is smaller and an
    /// empty Vec when `k == 0`.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError>;

    /// Number of stored passages.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
