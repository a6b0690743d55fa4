//! Reference in-memory message store. A human operator posts the assistant
//! turns through the same HTTP contract the chat client polls.

pub mod config;
pub mod http;
pub mod store;

pub use config::StoreServerConfig;
pub use http::{AppState, build_router};
pub use store::{ConversationStore, StoreError};
