//! Prompt composer: the fixed instruction preamble, retrieved passages,
//! gated history and the current question, spliced in that order.
//!
//! # Determinism
//!
//! Composition is a pure function of its input. Identical inputs always
//! produce byte-identical prompts.
//!
//! # Budget
//!
//! When the rendered prompt exceeds the token budget, the oldest history
//! turns are dropped first, then the lowest-ranked passages. The preamble
//! and the question are never trimmed.

use crate::context::token;
use recallchat_core::message::Turn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Instruction block heading every prompt.
pub const PREAMBLE: &str =
    "Answer clearly and accurately.\nUse previous conversation ONLY if relevant.";

// ── Types ─────────────────────────────────────────────────────────────────

/// Everything that goes into one prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    /// Passage texts in rank order, best first.
    pub retrieved_passages: Vec<String>,
    /// History admitted by the similarity gate, chronological.
    pub gated_history: Vec<Turn>,
    /// The message being answered.
    pub current_message: String,
}

/// What survived budgeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionMetadata {
    pub estimated_tokens: usize,
    /// 0 means unbounded.
    pub budget: usize,
    pub passages_included: usize,
    pub passages_dropped: usize,
    pub history_included: usize,
    pub history_dropped: usize,
}

/// The final prompt text plus how it was built.
#[derive(Debug, Clone)]
pub struct ComposedPrompt {
    pub text: String,
    pub metadata: CompositionMetadata,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompositionError {
    #[error("Prompt needs {required} tokens even with all optional context dropped (budget {budget})")]
    BudgetExceeded { required: usize, budget: usize },
}

// ── Composer ──────────────────────────────────────────────────────────────

/// Builds prompts under a token budget.
#[derive(Debug, Clone)]
pub struct ContextComposer {
    max_prompt_tokens: usize,
}

impl ContextComposer {
    pub fn new(max_prompt_tokens: usize) -> Self {
        Self { max_prompt_tokens }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    pub fn max_prompt_tokens(&self) -> usize {
        self.max_prompt_tokens
    }

    /// Compose the prompt for `ctx`, trimming optional context to fit.
    pub fn compose(&self, ctx: &PromptContext) -> Result<ComposedPrompt, CompositionError> {
        let budget = self.max_prompt_tokens;
        let mut passages = ctx.retrieved_passages.as_slice();
        let mut history = ctx.gated_history.as_slice();

        loop {
            let text = render(passages, history, &ctx.current_message);
            let estimated_tokens = token::estimate_tokens(&text);

            if budget == 0 || estimated_tokens <= budget {
                return Ok(ComposedPrompt {
                    text,
                    metadata: CompositionMetadata {
                        estimated_tokens,
                        budget,
                        passages_included: passages.len(),
                        passages_dropped: ctx.retrieved_passages.len() - passages.len(),
                        history_included: history.len(),
                        history_dropped: ctx.gated_history.len() - history.len(),
                    },
                });
            }

            if !history.is_empty() {
                history = &history[1..];
                // A reply without its question reads as noise.
                while history.first().is_some_and(|t| !t.is_user()) {
                    history = &history[1..];
                }
            } else if let Some((_, rest)) = passages.split_last() {
                passages = rest;
            } else {
                return Err(CompositionError::BudgetExceeded {
                    required: estimated_tokens,
                    budget,
                });
            }
        }
    }
}

impl Default for ContextComposer {
    fn default() -> Self {
        Self::new(2048)
    }
}

/// Render the prompt layout. The conversation section is omitted
/// entirely when `history` is empty.
pub fn render(passages: &[String], history: &[Turn], message: &str) -> String {
    let mut out = String::with_capacity(256);

    out.push_str(PREAMBLE);
    out.push_str("\n\nContext:\n");
    out.push_str(&passages.join("\n"));
    out.push_str("\n\n");

    if !history.is_empty() {
        out.push_str("Conversation (if relevant):\n");
        for turn in history {
            out.push_str(&turn.render());
            out.push('\n');
        }
        out.push('\n');
    }

    out.push_str("Question:\n");
    out.push_str(message);
    out.push_str("\n\nAnswer:\n");
    out
}
