//! Turn orchestrator: runs one chat request end to end.
//!
//! ```text
//! message ─▶ retrieve passages ─▶ read recent window ─▶ similarity gate
//!         ─▶ compose prompt ─▶ generate ─▶ append user+assistant pair
//! ```
//!
//! The session lock is held only while the window is read and while the
//! finished pair is appended, never across an await on a backend. A failed
//! request leaves the log untouched.

use recallchat_config::{AppConfig, GenerationConfig};
use recallchat_core::error::{ProviderError, RetrievalError};
use recallchat_core::message::Turn;
use recallchat_core::passage::{Passage, PassageIndex};
use recallchat_core::provider::{Embedder, GenerationRequest, Provider};
use recallchat_memory::ConversationLog;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::context::{CompositionError, CompositionMetadata, ContextComposer, PromptContext};
use crate::gate::{GateReason, SimilarityGate};

/// Reply sent back for a blank message.
pub const EMPTY_MESSAGE_REPLY: &str = "Message cannot be empty.";

/// Decoding parameters applied to every generation call.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout: Duration,
}

impl From<&GenerationConfig> for GenerationSettings {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            timeout: config.timeout(),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Answered,
    /// Blank input; nothing was retrieved, generated or stored.
    EmptyInput,
}

/// Outcome of one successful turn.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub reply: String,
    pub kind: ReplyKind,
    pub gate: Option<GateReason>,
    pub similarity: Option<f32>,
    /// Number of history turns that made it into the prompt.
    pub history_turns: usize,
    /// Passage texts that made it into the prompt.
    pub passages: Vec<String>,
    pub prompt: Option<CompositionMetadata>,
}

impl ChatReply {
    fn empty_input() -> Self {
        Self {
            reply: EMPTY_MESSAGE_REPLY.to_string(),
            kind: ReplyKind::EmptyInput,
            gate: None,
            similarity: None,
            history_turns: 0,
            passages: Vec::new(),
            prompt: None,
        }
    }
}

/// Failures that abort a turn. None of them touch the conversation log.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Passage retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Prompt composition failed: {0}")]
    Composition(#[from] CompositionError),

    #[error("Generation failed: {0}")]
    Generation(ProviderError),

    #[error("Generation timed out after {timeout_secs}s")]
    GenerationTimeout { timeout_secs: u64 },
}

pub struct TurnOrchestrator {
    passages: Arc<dyn PassageIndex>,
    provider: Arc<dyn Provider>,
    gate: SimilarityGate,
    composer: ContextComposer,
    generation: GenerationSettings,
    top_k: usize,
    retrieval_timeout: Duration,
    max_turn_pairs: usize,
}

impl TurnOrchestrator {
    pub fn new(
        passages: Arc<dyn PassageIndex>,
        provider: Arc<dyn Provider>,
        gate: SimilarityGate,
    ) -> Self {
        Self {
            passages,
            provider,
            gate,
            composer: ContextComposer::default(),
            generation: GenerationSettings::default(),
            top_k: 2,
            retrieval_timeout: Duration::from_secs(5),
            max_turn_pairs: 2,
        }
    }

    /// Wire an orchestrator from loaded configuration.
    pub fn from_config(
        config: &AppConfig,
        passages: Arc<dyn PassageIndex>,
        provider: Arc<dyn Provider>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self::new(
            passages,
            provider,
            SimilarityGate::from_config(embedder, config),
        )
        .with_generation(GenerationSettings::from(&config.generation))
        .with_composer(ContextComposer::new(config.prompt.max_prompt_tokens))
        .with_top_k(config.retrieval.top_k)
        .with_retrieval_timeout(config.retrieval.timeout())
        .with_max_turn_pairs(config.memory.max_turn_pairs)
    }

    pub fn with_generation(mut self, generation: GenerationSettings) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_composer(mut self, composer: ContextComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_retrieval_timeout(mut self, timeout: Duration) -> Self {
        self.retrieval_timeout = timeout;
        self
    }

    pub fn with_max_turn_pairs(mut self, pairs: usize) -> Self {
        self.max_turn_pairs = pairs;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn passage_count(&self) -> usize {
        self.passages.len()
    }

    /// Answer `message` in the session whose log is `log`.
    pub async fn handle(
        &self,
        log: &Mutex<ConversationLog>,
        message: &str,
    ) -> Result<ChatReply, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            debug!("Empty message, skipping pipeline");
            return Ok(ChatReply::empty_input());
        }

        let passages = self.retrieve(message).await?;
        let window = log.lock().await.recent_window(self.max_turn_pairs);
        let outcome = self.gate.evaluate(message, window).await;

        let mut passage_texts: Vec<String> = passages.into_iter().map(|p| p.text).collect();
        let composed = self.composer.compose(&PromptContext {
            retrieved_passages: passage_texts.clone(),
            gated_history: outcome.history,
            current_message: message.to_string(),
        })?;

        let included = composed.metadata.passages_included;
        let history_turns = composed.metadata.history_included;
        debug!(
            passages = included,
            history_turns,
            tokens = composed.metadata.estimated_tokens,
            "Prompt composed"
        );

        passage_texts.truncate(included);

        let reply = self.generate(composed.text).await?;

        let mut user_turn = Turn::user(message);
        if let Some(embedding) = outcome.query_embedding {
            user_turn = user_turn.with_embedding(embedding);
        }
        log.lock()
            .await
            .append_exchange(user_turn, Turn::assistant(reply.clone()));

        info!(
            gate = ?outcome.reason,
            similarity = ?outcome.similarity,
            history_turns,
            "Turn complete"
        );

        Ok(ChatReply {
            reply,
            kind: ReplyKind::Answered,
            gate: Some(outcome.reason),
            similarity: outcome.similarity,
            history_turns,
            passages: passage_texts,
            prompt: Some(composed.metadata),
        })
    }

    async fn retrieve(&self, message: &str) -> Result<Vec<Passage>, ChatError> {
        let passages = tokio::time::timeout(
            self.retrieval_timeout,
            self.passages.search(message, self.top_k),
        )
        .await
        .map_err(|_| RetrievalError::Timeout {
            timeout_secs: self.retrieval_timeout.as_secs(),
        })??;
        Ok(passages)
    }

    async fn generate(&self, prompt: String) -> Result<String, ChatError> {
        let request = GenerationRequest {
            model: self.generation.model.clone(),
            prompt,
            max_tokens: self.generation.max_tokens,
            temperature: self.generation.temperature,
            top_p: self.generation.top_p,
        };
        let timeout_secs = self.generation.timeout.as_secs();

        match tokio::time::timeout(self.generation.timeout, self.provider.complete(request)).await {
            Err(_) | Ok(Err(ProviderError::Timeout(_))) => {
                warn!(timeout_secs, "Generation timed out");
                Err(ChatError::GenerationTimeout { timeout_secs })
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Generation failed");
                Err(ChatError::Generation(e))
            }
            Ok(Ok(completion)) => Ok(completion.text.trim().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        EchoProvider, FailingEmbedder, MapEmbedder, ScriptedProvider, StaticPassageIndex,
    };
    use recallchat_core::message::Role;

    const PASSAGES: &[&str] = &[
        "FastAPI is a high-performance Python web framework for APIs.",
        "Ollama allows running LLMs locally on your machine.",
    ];

    fn embedder() -> MapEmbedder {
        MapEmbedder::new()
            .with("What is FastAPI?", vec![1.0, 0.0, 0.0])
            .with("Is it fast?", vec![0.9, 0.1, 0.0])
            .with("Tell me a joke", vec![0.0, 0.0, 1.0])
    }

    fn orchestrator(provider: ScriptedProvider, embedder: impl Embedder + 'static) -> TurnOrchestrator {
        TurnOrchestrator::new(
            Arc::new(StaticPassageIndex::new(PASSAGES)),
            Arc::new(provider),
            SimilarityGate::new(Arc::new(embedder), 0.7, Duration::from_secs(5)),
        )
    }

    fn texts(log: &ConversationLog) -> Vec<String> {
        log.turns().map(|t| t.text.clone()).collect()
    }

    #[tokio::test]
    async fn first_message_has_no_history_and_is_stored() {
        let provider = ScriptedProvider::replies(&["A Python web framework."]);
        let prompts = provider.prompts();
        let orch = orchestrator(provider, embedder());
        let log = Mutex::new(ConversationLog::unbounded());

        let reply = orch.handle(&log, "What is FastAPI?").await.unwrap();

        assert_eq!(reply.reply, "A Python web framework.");
        assert_eq!(reply.kind, ReplyKind::Answered);
        assert_eq!(reply.gate, Some(GateReason::EmptyWindow));
        assert_eq!(reply.history_turns, 0);
        assert_eq!(reply.passages, PASSAGES);

        let prompt = prompts.lock().unwrap()[0].clone();
        assert!(!prompt.contains("Conversation (if relevant):"));
        assert!(prompt.contains(&format!("Context:\n{}\n{}\n", PASSAGES[0], PASSAGES[1])));
        assert!(prompt.ends_with("Question:\nWhat is FastAPI?\n\nAnswer:\n"));

        assert_eq!(
            texts(&*log.lock().await),
            vec!["What is FastAPI?", "A Python web framework."]
        );
    }

    #[tokio::test]
    async fn related_follow_up_includes_history() {
        let provider = ScriptedProvider::replies(&["A Python web framework.", "Yes, very."]);
        let prompts = provider.prompts();
        let orch = orchestrator(provider, embedder());
        let log = Mutex::new(ConversationLog::unbounded());

        orch.handle(&log, "What is FastAPI?").await.unwrap();
        let reply = orch.handle(&log, "Is it fast?").await.unwrap();

        assert_eq!(reply.gate, Some(GateReason::Similar));
        assert_eq!(reply.history_turns, 2);
        let prompt = prompts.lock().unwrap()[1].clone();
        assert!(prompt.contains(
            "Conversation (if relevant):\nUser: What is FastAPI?\nAI: A Python web framework.\n"
        ));
        assert_eq!(log.lock().await.len(), 4);
    }

    #[tokio::test]
    async fn unrelated_follow_up_excludes_history() {
        let provider = ScriptedProvider::replies(&["A Python web framework.", "Why did..."]);
        let prompts = provider.prompts();
        let orch = orchestrator(provider, embedder());
        let log = Mutex::new(ConversationLog::unbounded());

        orch.handle(&log, "What is FastAPI?").await.unwrap();
        let reply = orch.handle(&log, "Tell me a joke").await.unwrap();

        assert_eq!(reply.gate, Some(GateReason::Dissimilar));
        assert_eq!(reply.history_turns, 0);
        assert!(!prompts.lock().unwrap()[1].contains("Conversation (if relevant):"));
        // Dissimilar turns are still recorded.
        assert_eq!(log.lock().await.len(), 4);
    }

    #[tokio::test]
    async fn gate_embedding_failure_still_answers() {
        let provider = ScriptedProvider::replies(&["Sure."]);
        let prompts = provider.prompts();
        let orch = orchestrator(provider, FailingEmbedder);
        let log = Mutex::new(ConversationLog::unbounded());
        log.lock()
            .await
            .append_exchange(Turn::user("What is FastAPI?"), Turn::assistant("A framework."));

        let reply = orch.handle(&log, "Is it fast?").await.unwrap();

        assert_eq!(reply.reply, "Sure.");
        assert_eq!(reply.gate, Some(GateReason::EmbeddingFailed));
        assert!(!prompts.lock().unwrap()[0].contains("Conversation (if relevant):"));
        assert_eq!(log.lock().await.len(), 4);
    }

    #[tokio::test]
    async fn empty_message_short_circuits() {
        // No scripted results: any generation call would panic.
        let orch = orchestrator(ScriptedProvider::replies(&[]), embedder());
        let log = Mutex::new(ConversationLog::unbounded());

        for message in ["", "   ", "\n\t"] {
            let reply = orch.handle(&log, message).await.unwrap();
            assert_eq!(reply.reply, EMPTY_MESSAGE_REPLY);
            assert_eq!(reply.kind, ReplyKind::EmptyInput);
        }
        assert!(log.lock().await.is_empty());
    }

    #[tokio::test]
    async fn generation_failure_leaves_log_untouched() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::Network(
            "connection refused".into(),
        ))]);
        let orch = orchestrator(provider, embedder());
        let log = Mutex::new(ConversationLog::unbounded());

        let err = orch.handle(&log, "What is FastAPI?").await.unwrap_err();
        assert!(matches!(err, ChatError::Generation(ProviderError::Network(_))));
        assert!(log.lock().await.is_empty());
    }

    #[tokio::test]
    async fn provider_timeout_maps_to_generation_timeout() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::Timeout("slow".into()))]);
        let orch = orchestrator(provider, embedder());
        let log = Mutex::new(ConversationLog::unbounded());

        let err = orch.handle(&log, "What is FastAPI?").await.unwrap_err();
        assert!(matches!(err, ChatError::GenerationTimeout { timeout_secs: 5 }));
        assert!(log.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generation_times_out() {
        let provider = ScriptedProvider::replies(&["too late"]).with_delay(Duration::from_secs(60));
        let orch = orchestrator(provider, embedder()).with_generation(GenerationSettings {
            timeout: Duration::from_secs(2),
            ..GenerationSettings::default()
        });
        let log = Mutex::new(ConversationLog::unbounded());

        let err = orch.handle(&log, "What is FastAPI?").await.unwrap_err();
        assert!(matches!(err, ChatError::GenerationTimeout { timeout_secs: 2 }));
        assert!(log.lock().await.is_empty());
    }

    #[tokio::test]
    async fn retrieval_failure_aborts_before_generation() {
        let orch = TurnOrchestrator::new(
            Arc::new(StaticPassageIndex::failing()),
            Arc::new(ScriptedProvider::replies(&[])),
            SimilarityGate::new(Arc::new(embedder()), 0.7, Duration::from_secs(5)),
        );
        let log = Mutex::new(ConversationLog::unbounded());

        let err = orch.handle(&log, "What is FastAPI?").await.unwrap_err();
        assert!(matches!(err, ChatError::Retrieval(RetrievalError::Unavailable(_))));
        assert!(log.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_retrieval_times_out() {
        let orch = TurnOrchestrator::new(
            Arc::new(StaticPassageIndex::new(PASSAGES).with_delay(Duration::from_secs(60))),
            Arc::new(ScriptedProvider::replies(&[])),
            SimilarityGate::new(Arc::new(embedder()), 0.7, Duration::from_secs(5)),
        )
        .with_retrieval_timeout(Duration::from_secs(3));
        let log = Mutex::new(ConversationLog::unbounded());

        let err = orch.handle(&log, "What is FastAPI?").await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::Retrieval(RetrievalError::Timeout { timeout_secs: 3 })
        ));
        assert!(log.lock().await.is_empty());
    }

    #[tokio::test]
    async fn window_is_capped_by_turn_pairs() {
        let provider = ScriptedProvider::replies(&["ok"]);
        let prompts = provider.prompts();
        let orch = orchestrator(provider, MapEmbedder::new().with("again", vec![1.0]))
            .with_max_turn_pairs(1);
        let log = Mutex::new(ConversationLog::unbounded());
        {
            let mut log = log.lock().await;
            log.append_exchange(
                Turn::user("old").with_embedding(vec![1.0]),
                Turn::assistant("old reply"),
            );
            log.append_exchange(
                Turn::user("recent").with_embedding(vec![1.0]),
                Turn::assistant("recent reply"),
            );
        }

        let reply = orch.handle(&log, "again").await.unwrap();
        assert_eq!(reply.history_turns, 2);
        let prompt = prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("User: recent\nAI: recent reply\n"));
        assert!(!prompt.contains("old"));
    }

    #[tokio::test]
    async fn stored_user_turn_carries_query_embedding() {
        let orch = orchestrator(ScriptedProvider::replies(&["one", "two"]), embedder());
        let log = Mutex::new(ConversationLog::unbounded());

        orch.handle(&log, "What is FastAPI?").await.unwrap();
        orch.handle(&log, "Is it fast?").await.unwrap();

        let log = log.lock().await;
        let turns: Vec<&Turn> = log.turns().collect();
        // First turn had an empty window so nothing was embedded.
        assert!(turns[0].embedding.is_none());
        assert_eq!(turns[2].embedding, Some(vec![0.9, 0.1, 0.0]));
    }

    #[tokio::test]
    async fn oversized_message_is_a_composition_error() {
        let orch = orchestrator(ScriptedProvider::replies(&[]), embedder())
            .with_composer(ContextComposer::new(16));
        let log = Mutex::new(ConversationLog::unbounded());

        let err = orch.handle(&log, &"word ".repeat(100)).await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::Composition(CompositionError::BudgetExceeded { budget: 16, .. })
        ));
        assert!(log.lock().await.is_empty());
    }

    #[tokio::test]
    async fn reply_whitespace_is_trimmed() {
        let orch = orchestrator(ScriptedProvider::replies(&["\n  Hello.  \n"]), embedder());
        let log = Mutex::new(ConversationLog::unbounded());
        let reply = orch.handle(&log, "What is FastAPI?").await.unwrap();
        assert_eq!(reply.reply, "Hello.");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_turns_never_interleave_pairs() {
        let orch = TurnOrchestrator::new(
            Arc::new(StaticPassageIndex::new(PASSAGES)),
            Arc::new(EchoProvider),
            SimilarityGate::new(Arc::new(MapEmbedder::new()), 0.7, Duration::from_secs(5)),
        );
        let log = Mutex::new(ConversationLog::unbounded());
        let questions: Vec<String> = (0..16).map(|i| format!("question {i}")).collect();

        let replies =
            futures::future::join_all(questions.iter().map(|q| orch.handle(&log, q))).await;
        assert!(replies.iter().all(|r| r.is_ok()));

        let log = log.lock().await;
        let turns: Vec<_> = log.turns().collect();
        assert_eq!(turns.len(), 32);
        for pair in turns.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[1].text, format!("re: {}", pair[0].text));
        }
    }

    #[test]
    fn from_config_applies_settings() {
        let mut config = AppConfig::default();
        config.retrieval.top_k = 1;
        config.generation.model = "tiny".into();
        let orch = TurnOrchestrator::from_config(
            &config,
            Arc::new(StaticPassageIndex::new(PASSAGES)),
            Arc::new(ScriptedProvider::replies(&[])),
            Arc::new(FailingEmbedder),
        );
        assert_eq!(orch.top_k, 1);
        assert_eq!(orch.generation.model, "tiny");
        assert_eq!(orch.provider_name(), "scripted");
        assert_eq!(orch.passage_count(), 2);
    }
}
