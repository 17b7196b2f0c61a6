//! Error types for the RecallChat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

// --- Bounded context errors ---

/// Failures of the generation or embedding backend.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    InvalidResponse(String),
}

/// Failures of the passage index.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Passage index unavailable: {0}")]
    Unavailable(String),

    #[error("Query embedding failed: {0}")]
    Embedding(#[from] ProviderError),

    #[error("Passage search timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}
