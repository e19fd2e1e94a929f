//! Request and response types for the Dify chat API

/// Chat-messages endpoint types
pub mod chat;

pub use chat::{ChatRequest, ChatResult};
