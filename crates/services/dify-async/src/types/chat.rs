//! Types for the Dify `/chat-messages` endpoint (streaming)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DifyError;

/// Response mode sent with every chat request
///
/// Agent apps only answer in streaming mode, so this client never asks for
/// a blocking response.
pub const RESPONSE_MODE_STREAMING: &str = "streaming";

/// One user turn to send to the chat endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// The user's question
    pub query: String,
    /// Identifier of the end user; must be non-empty
    pub user_id: String,
    /// Conversation to continue; `None` or empty starts a new one
    pub conversation_id: Option<String>,
    /// Extra app inputs sent beside `user_id`
    pub inputs: Map<String, Value>,
}

impl ChatRequest {
    /// Create a request that starts a new conversation
    #[must_use]
    pub fn new(query: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            user_id: user_id.into(),
            conversation_id: None,
            inputs: Map::new(),
        }
    }

    /// Continue an existing conversation
    ///
    /// An empty id is treated the same as no id.
    #[must_use]
    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.conversation_id = (!id.is_empty()).then_some(id);
        self
    }

    /// Add an app input variable
    ///
    /// `user_id` is always sent from [`ChatRequest::user_id`] and cannot be
    /// overridden here.
    #[must_use]
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    /// Checks the request invariants before anything goes on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`DifyError::InvalidRequest`] if `user_id` is blank.
    pub fn validate(&self) -> Result<(), DifyError> {
        if self.user_id.trim().is_empty() {
            return Err(DifyError::InvalidRequest("user_id must not be empty".into()));
        }
        Ok(())
    }

    /// The `user` field Dify uses to scope conversations
    #[must_use]
    pub fn end_user(&self) -> String {
        format!("user-{}", self.user_id)
    }

    pub(crate) fn to_body(&self) -> ChatMessagesBody<'_> {
        let mut inputs = self.inputs.clone();
        inputs.insert("user_id".into(), Value::String(self.user_id.clone()));
        ChatMessagesBody {
            inputs,
            query: &self.query,
            response_mode: RESPONSE_MODE_STREAMING,
            conversation_id: self.conversation_id.as_deref().unwrap_or_default(),
            user: self.end_user(),
        }
    }
}

/// Wire body for `POST /chat-messages`
#[derive(Debug, Serialize)]
pub(crate) struct ChatMessagesBody<'a> {
    inputs: Map<String, Value>,
    query: &'a str,
    response_mode: &'static str,
    conversation_id: &'a str,
    user: String,
}

/// The accumulated outcome of one successful turn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResult {
    /// Concatenation of every answer fragment, in arrival order
    pub answer: String,
    /// Conversation id to send with the next turn
    pub conversation_id: String,
}
