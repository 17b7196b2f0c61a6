//! In-process memory for RecallChat: the embedded passage index, the
//! per-session conversation logs, and vector similarity utilities.

pub mod conversation;
pub mod passage_index;
pub mod session;
pub mod vector;

pub use conversation::{ConversationLog, last_user_message, last_user_turn};
pub use passage_index::InMemoryPassageIndex;
pub use session::{DEFAULT_SESSION, SessionHandle, SessionStore};
pub use vector::{cosine_similarity, rank_by_similarity};
