//! Shared test doubles for gate and orchestrator tests.

use async_trait::async_trait;
use recallchat_core::error::{ProviderError, RetrievalError};
use recallchat_core::passage::{Passage, PassageIndex};
use recallchat_core::provider::{Completion, Embedder, GenerationRequest, Provider};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Embeds by exact-text lookup. Unknown texts map to the zero vector,
/// which has similarity 0 with everything.
pub struct MapEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    calls: Arc<AtomicUsize>,
}

impl MapEmbedder {
    pub fn new() -> Self {
        Self {
            vectors: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Embedder for MapEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![0.0, 0.0]))
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::Network("embedding backend down".into()))
    }
}

/// Sleeps before answering; pair with a paused tokio clock.
pub struct SlowEmbedder(pub Duration);

#[async_trait]
impl Embedder for SlowEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        tokio::time::sleep(self.0).await;
        Ok(vec![1.0, 0.0])
    }
}

/// A provider that replays scripted results and records every prompt.
///
/// Panics if more calls are made than results provided.
pub struct ScriptedProvider {
    results: Mutex<Vec<Result<String, ProviderError>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(results: Vec<Result<String, ProviderError>>) -> Self {
        let mut results = results;
        results.reverse();
        Self {
            results: Mutex::new(results),
            prompts: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    pub fn replies(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        self.prompts.clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: GenerationRequest) -> Result<Completion, ProviderError> {
        self.prompts.lock().unwrap().push(request.prompt);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self
            .results
            .lock()
            .unwrap()
            .pop()
            .expect("ScriptedProvider: no more results");
        next.map(|text| Completion {
            text,
            model: request.model,
            usage: None,
        })
    }
}

/// Answers `re: <question>` after yielding, so concurrent turns overlap.
pub struct EchoProvider;

#[async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: GenerationRequest) -> Result<Completion, ProviderError> {
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        let question = request
            .prompt
            .split("Question:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\nAnswer:").next())
            .unwrap_or_default()
            .to_string();
        Ok(Completion {
            text: format!("re: {question}"),
            model: request.model,
            usage: None,
        })
    }
}

/// Returns the same passages for every query, or fails.
pub struct StaticPassageIndex {
    passages: Vec<String>,
    fail: bool,
    delay: Option<Duration>,
}

impl StaticPassageIndex {
    pub fn new(passages: &[&str]) -> Self {
        Self {
            passages: passages.iter().map(|p| p.to_string()).collect(),
            fail: false,
            delay: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            passages: Vec::new(),
            fail: true,
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl PassageIndex for StaticPassageIndex {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, _query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(RetrievalError::Unavailable("index offline".into()));
        }
        Ok(self
            .passages
            .iter()
            .take(k)
            .map(|text| Passage {
                text: text.clone(),
                embedding: Vec::new(),
                score: 1.0,
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.passages.len()
    }
}
