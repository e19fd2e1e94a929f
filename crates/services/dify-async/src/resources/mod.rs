//! API resource implementations for the Dify client

/// Chat-messages API resource
pub mod chat_messages;

pub use chat_messages::ChatMessages;
