//! Model backend implementations for RecallChat.
//!
//! All generation backends implement `recallchat_core::Provider`;
//! [`ProviderEmbedder`] adapts any of them to `recallchat_core::Embedder`.
//! The router builds the configured backend.

pub mod embedder;
pub mod openai_compat;
pub mod router;

pub use embedder::ProviderEmbedder;
pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
