use serde::Serialize;

use crate::{config::Config, error::DifyError, types::ChatResult};

/// Dify chat API client
///
/// The client is generic over a [`Config`] implementation that provides authentication
/// and API configuration. It holds no per-turn state: concurrent turns are
/// independent and are not ordered with respect to each other.
#[derive(Debug, Clone)]
pub struct Client<C: Config> {
    http: reqwest::Client,
    config: C,
}

impl Client<crate::config::DifyConfig> {
    /// Creates a new client with default configuration
    ///
    /// Uses environment variables:
    /// - `DIFY_API_KEY` for bearer authentication
    /// - `DIFY_API_URL` for custom API base URL
    /// - `DIFY_TURN_TIMEOUT_SECS` for a per-turn deadline
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(crate::config::DifyConfig::new())
    }
}

impl<C: Config + Default> Default for Client<C> {
    fn default() -> Self {
        Self::with_config(C::default())
    }
}

impl<C: Config> Client<C> {
    /// Creates a new client with the given configuration.
    ///
    /// Only a connect timeout is set on the HTTP client: a whole-request
    /// timeout would cut long answers mid-stream. Bound turns with
    /// [`DifyConfig::with_turn_timeout`](crate::DifyConfig::with_turn_timeout)
    /// or a cancellation token instead.
    #[must_use]
    pub fn with_config(config: C) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self { http, config }
    }

    /// Replaces the HTTP client with a custom one
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Returns a reference to the client's configuration
    #[must_use]
    pub const fn config(&self) -> &C {
        &self.config
    }

    /// Send one chat turn and wait for the whole answer
    ///
    /// Shorthand for [`ChatMessages::create`](crate::resources::ChatMessages::create).
    /// Pass `None` or an empty id to start a new conversation.
    ///
    /// # Errors
    ///
    /// See [`ChatMessages::create`](crate::resources::ChatMessages::create).
    pub async fn chat(
        &self,
        query: impl Into<String>,
        user_id: impl Into<String>,
        conversation_id: Option<&str>,
    ) -> Result<ChatResult, DifyError> {
        let mut req = crate::types::ChatRequest::new(query, user_id);
        if let Some(id) = conversation_id {
            req = req.with_conversation_id(id);
        }
        self.chat_messages().create(req).await
    }

    pub(crate) const fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn build_post<I>(&self, path: &str, body: &I) -> Result<reqwest::Request, DifyError>
    where
        I: Serialize + ?Sized,
    {
        // Validate auth before any request
        self.config.validate_auth()?;

        let headers = self.config.headers()?;
        Ok(self
            .http
            .post(self.config.url(path))
            .headers(headers)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(body)
            .build()?)
    }
}
