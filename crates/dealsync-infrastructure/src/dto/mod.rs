//! Data Transfer Objects for persisted state.
//!
//! Each DTO carries its schema version; migrators move older payloads
//! forward to the domain shape.

pub mod chat_state;

pub use chat_state::{
    create_chat_state_migrator, ChatStateDTO, ChatStateV2_0_0, ChatStateV3_0_0,
    CHAT_STATE_ENTITY, CURRENT_CHAT_STATE_VERSION, MIN_SUPPORTED_CHAT_STATE_VERSION,
};
