//! Similarity gate: decides whether recent history is relevant enough to
//! include in the prompt.
//!
//! The incoming message is compared against the newest user turn in the
//! recent window. At or above the threshold the whole window is admitted;
//! below it, none of it is. Embedding failures and timeouts close the gate
//! rather than failing the request.

use recallchat_config::AppConfig;
use recallchat_core::error::ProviderError;
use recallchat_core::message::Turn;
use recallchat_core::provider::Embedder;
use recallchat_memory::{cosine_similarity, last_user_turn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Why the gate decided what it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    /// No prior turns at all.
    EmptyWindow,
    /// Prior turns exist but none is from the user.
    NoPriorUserTurn,
    Similar,
    Dissimilar,
    /// Embedding failed or timed out; failed open with no history.
    EmbeddingFailed,
}

/// Result of one gate evaluation.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    /// Admitted history: the full window or nothing.
    pub history: Vec<Turn>,
    pub similarity: Option<f32>,
    pub reason: GateReason,
    /// The current message's embedding, when one was computed. Cached on
    /// the stored user turn so the next request need not re-embed it.
    pub query_embedding: Option<Vec<f32>>,
}

impl GateOutcome {
    fn closed(reason: GateReason) -> Self {
        Self {
            history: Vec::new(),
            similarity: None,
            reason,
            query_embedding: None,
        }
    }

    pub fn admitted(&self) -> bool {
        !self.history.is_empty()
    }
}

pub struct SimilarityGate {
    embedder: Arc<dyn Embedder>,
    threshold: f32,
    timeout: Duration,
}

impl SimilarityGate {
    pub fn new(embedder: Arc<dyn Embedder>, threshold: f32, timeout: Duration) -> Self {
        Self {
            embedder,
            threshold,
            timeout,
        }
    }

    pub fn from_config(embedder: Arc<dyn Embedder>, config: &AppConfig) -> Self {
        Self::new(
            embedder,
            config.memory.similarity_threshold,
            config.embedding.timeout(),
        )
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Evaluate `message` against `window` (chronological, newest last).
    pub async fn evaluate(&self, message: &str, window: Vec<Turn>) -> GateOutcome {
        if window.is_empty() {
            return GateOutcome::closed(GateReason::EmptyWindow);
        }
        let Some(previous) = last_user_turn(&window) else {
            return GateOutcome::closed(GateReason::NoPriorUserTurn);
        };

        let query = match self.embed(message).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Gate embedding failed, continuing without history");
                return GateOutcome::closed(GateReason::EmbeddingFailed);
            }
        };

        let previous_embedding = match &previous.embedding {
            Some(cached) => cached.clone(),
            None => match self.embed(&previous.text).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "Gate embedding failed, continuing without history");
                    return GateOutcome {
                        query_embedding: Some(query),
                        ..GateOutcome::closed(GateReason::EmbeddingFailed)
                    };
                }
            },
        };

        let similarity = cosine_similarity(&query, &previous_embedding);
        let admit = similarity >= self.threshold;
        debug!(similarity, threshold = self.threshold, admit, "Similarity gate");

        GateOutcome {
            history: if admit { window } else { Vec::new() },
            similarity: Some(similarity),
            reason: if admit {
                GateReason::Similar
            } else {
                GateReason::Dissimilar
            },
            query_embedding: Some(query),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        tokio::time::timeout(self.timeout, self.embedder.embed(text))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!("embedding exceeded {}s", self.timeout.as_secs()))
            })?
    }
}
