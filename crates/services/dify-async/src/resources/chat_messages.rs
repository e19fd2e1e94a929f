use tokio_util::sync::CancellationToken;

use crate::{
    client::Client,
    config::Config,
    error::DifyError,
    streaming::{EventStream, StreamSession, event_stream_from_response},
    types::{ChatRequest, ChatResult},
};

/// Endpoint path, relative to the API base
pub const CHAT_MESSAGES_PATH: &str = "/chat-messages";

/// API resource for the `/chat-messages` endpoint (streaming response mode)
pub struct ChatMessages<'c, C: Config> {
    client: &'c Client<C>,
}

impl<'c, C: Config> ChatMessages<'c, C> {
    /// Creates a new `ChatMessages` resource
    #[must_use]
    pub const fn new(client: &'c Client<C>) -> Self {
        Self { client }
    }

    /// Send one turn and return the accumulated answer
    ///
    /// The configured turn timeout, if any, bounds the whole turn. No
    /// retries are performed.
    ///
    /// # Errors
    ///
    /// - [`DifyError::InvalidRequest`] / [`DifyError::Config`] before sending
    /// - [`DifyError::Reqwest`] for transport failures
    /// - [`DifyError::Api`] for a non-success status (body text verbatim)
    /// - [`DifyError::Upstream`] for an `error` event in the stream
    /// - [`DifyError::Cancelled`] if the deadline elapses
    pub async fn create(&self, req: ChatRequest) -> Result<ChatResult, DifyError> {
        self.create_with_cancel(req, CancellationToken::new()).await
    }

    /// Like [`create`](Self::create), but also aborts when `cancel` fires
    ///
    /// No partial answer is returned after cancellation.
    ///
    /// # Errors
    ///
    /// See [`create`](Self::create).
    pub async fn create_with_cancel(
        &self,
        req: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatResult, DifyError> {
        let mut session = self.session(&req).with_cancellation(cancel);
        let request = self.prepare(&req)?;

        let response = session.open(self.client.http().execute(request)).await?;
        session.read(response.bytes_stream()).await
    }

    /// Send one turn and return its events as they are decoded
    ///
    /// The response head is awaited (and its status checked) before this
    /// returns, bounded by the configured turn timeout. After that the caller
    /// owns the stream; dropping it abandons the turn.
    ///
    /// # Errors
    ///
    /// Same as [`create`](Self::create) for everything up to the response head.
    pub async fn create_stream(&self, req: ChatRequest) -> Result<EventStream, DifyError> {
        let mut session = self.session(&req);
        let request = self.prepare(&req)?;

        let response = session.open(self.client.http().execute(request)).await?;
        Ok(event_stream_from_response(response))
    }

    fn session(&self, req: &ChatRequest) -> StreamSession {
        let session = StreamSession::new(req.conversation_id.as_deref());
        match self.client.config().turn_timeout() {
            Some(timeout) => session.with_timeout(timeout),
            None => session,
        }
    }

    fn prepare(&self, req: &ChatRequest) -> Result<reqwest::Request, DifyError> {
        req.validate()?;
        tracing::debug!(
            user = %req.end_user(),
            conversation_id = req.conversation_id.as_deref().unwrap_or_default(),
            "opening chat turn"
        );
        self.client.build_post(CHAT_MESSAGES_PATH, &req.to_body())
    }
}

// Add accessor to client
impl<C: Config> crate::Client<C> {
    /// Returns the `ChatMessages` API resource
    #[must_use]
    pub const fn chat_messages(&self) -> ChatMessages<'_, C> {
        ChatMessages::new(self)
    }
}
