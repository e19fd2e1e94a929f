//! Multi-turn helper that threads the conversation id between turns.

use tokio_util::sync::CancellationToken;

use crate::{
    client::Client,
    config::Config,
    error::DifyError,
    types::{ChatRequest, ChatResult},
};

/// One user's ongoing dialogue
///
/// Each successful turn stores the conversation id it returned, and the next
/// turn continues it. [`send`](Self::send) takes `&mut self`, so turns of the
/// same `Conversation` can never overlap. A failed turn leaves the id
/// unchanged.
#[derive(Debug)]
pub struct Conversation<'c, C: Config> {
    client: &'c Client<C>,
    user_id: String,
    conversation_id: Option<String>,
}

impl<'c, C: Config> Conversation<'c, C> {
    /// Start a new conversation for `user_id`
    #[must_use]
    pub fn new(client: &'c Client<C>, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
            conversation_id: None,
        }
    }

    /// Continue a conversation whose id was obtained earlier
    #[must_use]
    pub fn resume(mut self, conversation_id: impl Into<String>) -> Self {
        let id = conversation_id.into();
        self.conversation_id = (!id.is_empty()).then_some(id);
        self
    }

    /// The conversation id the next turn will continue, if any
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// The end user this conversation belongs to
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Forget the conversation id; the next turn starts fresh
    pub fn reset(&mut self) {
        self.conversation_id = None;
    }

    /// Build the request for the next turn
    #[must_use]
    pub fn request(&self, query: impl Into<String>) -> ChatRequest {
        let req = ChatRequest::new(query, self.user_id.clone());
        match &self.conversation_id {
            Some(id) => req.with_conversation_id(id.clone()),
            None => req,
        }
    }

    /// Send the next turn
    ///
    /// # Errors
    ///
    /// See [`ChatMessages::create`](crate::resources::ChatMessages::create).
    pub async fn send(&mut self, query: impl Into<String>) -> Result<ChatResult, DifyError> {
        self.send_with_cancel(query, CancellationToken::new()).await
    }

    /// Send the next turn, aborting when `cancel` fires
    ///
    /// # Errors
    ///
    /// See [`ChatMessages::create`](crate::resources::ChatMessages::create).
    pub async fn send_with_cancel(
        &mut self,
        query: impl Into<String>,
        cancel: CancellationToken,
    ) -> Result<ChatResult, DifyError> {
        let req = self.request(query);
        let result = self
            .client
            .chat_messages()
            .create_with_cancel(req, cancel)
            .await?;
        self.record(&result);
        Ok(result)
    }

    /// Remember the conversation id of a turn completed outside [`send`](Self::send)
    pub fn record(&mut self, result: &ChatResult) {
        if !result.conversation_id.is_empty() {
            self.conversation_id = Some(result.conversation_id.clone());
        }
    }
}

impl<C: Config> crate::Client<C> {
    /// Start a [`Conversation`] for `user_id`
    #[must_use]
    pub fn conversation(&self, user_id: impl Into<String>) -> Conversation<'_, C> {
        Conversation::new(self, user_id)
    }
}
