//! The selective-context pipeline, the core of RecallChat.
//!
//! Each chat turn follows a **Retrieve → Gate → Compose → Generate** cycle:
//!
//! 1. **Retrieve** the top-k passages for the message
//! 2. **Gate** recent history on similarity to the last user message
//! 3. **Compose** preamble, passages, admitted history and question
//! 4. **Generate** a reply, then append the user/assistant pair to the log
//!
//! History that is not similar enough never reaches the prompt, which keeps
//! small models from being distracted by an unrelated earlier topic.

pub mod context;
pub mod gate;
pub mod orchestrator;

#[cfg(test)]
mod test_helpers;

pub use context::{
    ComposedPrompt, CompositionError, CompositionMetadata, ContextComposer, PromptContext,
};
pub use gate::{GateOutcome, GateReason, SimilarityGate};
pub use orchestrator::{
    ChatError, ChatReply, EMPTY_MESSAGE_REPLY, GenerationSettings, ReplyKind, TurnOrchestrator,
};
