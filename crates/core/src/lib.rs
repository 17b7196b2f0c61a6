//! # RecallChat Core
//!
//! Domain types, traits, and error definitions for the RecallChat
//! selective-context chat service. This crate has **no framework
//! dependencies**. It defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (generation backend, embedding backend,
//! passage index) is defined as a trait here. Implementations live in their
//! respective crates, which keeps the context pipeline testable with
//! scripted stand-ins.

pub mod error;
pub mod message;
pub mod passage;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{ProviderError, RetrievalError};
pub use message::{Role, Turn};
pub use passage::{Passage, PassageIndex};
pub use provider::{Completion, Embedder, GenerationRequest, Provider};
