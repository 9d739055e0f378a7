//! File-backed storage.

pub mod atomic_file;
pub mod chat_state_repository;

pub use atomic_file::{read_optional, write_atomic};
pub use chat_state_repository::{JsonChatStateRepository, LoadOutcome, LoadReport};
