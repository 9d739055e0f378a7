//! Stateful stores, one per entity family.

mod chat_store;
mod document_store;
mod notification_store;
mod team_store;
mod transaction_store;

pub use chat_store::{ChatState, ChatStore};
pub use document_store::{DocumentStore, ProcessingComplete};
pub use notification_store::{NotificationState, NotificationStore};
pub use team_store::TeamStore;
pub use transaction_store::TransactionStore;
