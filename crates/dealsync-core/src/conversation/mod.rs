//! Conversation domain module.
//!
//! # Module Structure
//!
//! - `message`: chat message types (`Message`, `Sender`)
//! - `model`: the `Conversation` entity and its patch
//! - `persisted`: the snapshot of chat state that survives reloads
//! - `repository`: persistence trait for that snapshot

mod message;
mod model;
mod persisted;
mod repository;

pub use message::{Message, Sender};
pub use model::{Conversation, ConversationPatch, DEFAULT_CONVERSATION_TITLE};
pub use persisted::PersistedChat;
pub use repository::ChatStateRepository;
