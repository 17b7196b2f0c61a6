//! In-memory passage index: the fixed knowledge base, embedded once at
//! startup and searched by cosine similarity.

use async_trait::async_trait;
use recallchat_core::error::RetrievalError;
use recallchat_core::passage::{Passage, PassageIndex};
use recallchat_core::provider::Embedder;
use std::sync::Arc;
use tracing::{debug, info};

use crate::vector::rank_by_similarity;

/// An immutable set of embedded passages.
pub struct InMemoryPassageIndex {
    passages: Vec<Passage>,
    embedder: Arc<dyn Embedder>,
}

impl InMemoryPassageIndex {
    /// Embed `documents` and build the index. Document order is kept and
    /// used to break similarity ties.
    pub async fn from_documents(
        embedder: Arc<dyn Embedder>,
        documents: &[String],
    ) -> Result<Self, RetrievalError> {
        let embeddings = embedder.embed_batch(documents).await?;
        if embeddings.len() != documents.len() {
            return Err(RetrievalError::Unavailable(format!(
                "embedded {} of {} documents",
                embeddings.len(),
                documents.len()
            )));
        }

        let passages = documents
            .iter()
            .zip(embeddings)
            .map(|(text, embedding)| Passage {
                text: text.clone(),
                embedding,
                score: 0.0,
            })
            .collect::<Vec<_>>();

        info!(passages = passages.len(), "Passage index loaded");
        Ok(Self { passages, embedder })
    }
}

#[async_trait]
impl PassageIndex for InMemoryPassageIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError> {
        if k == 0 || self.passages.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;
        let ranked = rank_by_similarity(
            self.passages.iter().map(|p| p.embedding.as_slice()),
            &query_embedding,
            k,
        );

        debug!(k, hits = ranked.len(), "Passage search");

        Ok(ranked
            .into_iter()
            .map(|(i, score)| Passage {
                score,
                ..self.passages[i].clone()
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.passages.len()
    }
}
