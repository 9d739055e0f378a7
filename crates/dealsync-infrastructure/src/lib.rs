pub mod config_loader;
pub mod dto;
pub mod paths;
pub mod storage;
pub mod transport;

pub use crate::config_loader::load_config;
pub use crate::paths::DealsyncPaths;
pub use crate::storage::JsonChatStateRepository;
pub use crate::transport::ChannelTransport;
