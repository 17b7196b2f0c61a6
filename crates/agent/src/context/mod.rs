//! Prompt construction.
//!
//! The composer splices four sections into a single generation prompt:
//!
//! | Section | Source | Trim Strategy |
//! |---------|--------|---------------|
//! | 1. Instructions | Fixed preamble | Never trimmed |
//! | 2. Context | Retrieved passages | Lowest-ranked dropped |
//! | 3. Conversation | Gated history | Oldest turns dropped first |
//! | 4. Question | Current message | Never trimmed |

pub mod composer;
pub mod token;

pub use composer::{
    ComposedPrompt, CompositionError, CompositionMetadata, ContextComposer, PREAMBLE,
    PromptContext,
};
