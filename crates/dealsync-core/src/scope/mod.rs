//! Scope routing: which conversation and which resources belong to the
//! context the user is looking at.

mod conversation_map;
mod descriptor;
mod router;

pub use conversation_map::ScopeConversationMap;
pub use descriptor::{ScopeDescriptor, ScopeFilters, ScopeKey, ScopeToken};
pub use router::{ContextRouter, ScopeTransition};
