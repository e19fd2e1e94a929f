use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::DifyError;

/// Default Dify Cloud API base URL
pub const DIFY_DEFAULT_BASE: &str = "https://api.dify.ai/v1";
/// Environment variable holding the app API key
pub const ENV_API_KEY: &str = "DIFY_API_KEY";
/// Environment variable overriding the API base URL
pub const ENV_API_URL: &str = "DIFY_API_URL";
/// Environment variable setting the per-turn deadline in seconds
pub const ENV_TURN_TIMEOUT_SECS: &str = "DIFY_TURN_TIMEOUT_SECS";

/// Configuration for the Dify client
///
/// Debug output automatically redacts `api_key` via [`SecretString`].
#[derive(Clone, Debug)]
pub struct DifyConfig {
    api_base: String,
    api_key: Option<SecretString>,
    turn_timeout: Option<Duration>,
}

fn env_trimmed(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Default for DifyConfig {
    fn default() -> Self {
        let api_key = env_trimmed(ENV_API_KEY).map(SecretString::from);
        let api_base = env_trimmed(ENV_API_URL).unwrap_or_else(|| DIFY_DEFAULT_BASE.into());
        let turn_timeout = env_trimmed(ENV_TURN_TIMEOUT_SECS)
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self {
            api_base,
            api_key,
            turn_timeout,
        }
    }
}

impl DifyConfig {
    /// Creates a new configuration with default settings
    ///
    /// Attempts to read from environment variables:
    /// - `DIFY_API_KEY` for bearer authentication
    /// - `DIFY_API_URL` for custom API base URL (defaults to `https://api.dify.ai/v1`)
    /// - `DIFY_TURN_TIMEOUT_SECS` for a per-turn deadline (unset means no deadline)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API base URL
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Sets the app API key
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Sets the deadline for one whole turn, from sending the request to
    /// the end of the stream
    #[must_use]
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = Some(timeout);
        self
    }

    /// Returns the configured API base URL
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

/// Configuration trait for the Dify client
///
/// Implement this trait to provide custom authentication and API configuration.
pub trait Config: Send + Sync {
    /// Returns HTTP headers to include in requests
    ///
    /// # Errors
    ///
    /// Returns an error if header values contain invalid characters.
    fn headers(&self) -> Result<HeaderMap, DifyError>;

    /// Constructs the full URL for an API endpoint
    fn url(&self, path: &str) -> String;

    /// Deadline applied to every turn, if any
    fn turn_timeout(&self) -> Option<Duration>;

    /// Validates that authentication credentials are present.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication is not properly configured.
    fn validate_auth(&self) -> Result<(), DifyError>;
}

impl Config for DifyConfig {
    fn headers(&self) -> Result<HeaderMap, DifyError> {
        let mut h = HeaderMap::new();

        if let Some(secret) = &self.api_key {
            let key = secret.expose_secret().trim();
            if !key.is_empty() {
                let mut value = HeaderValue::from_str(&format!("Bearer {key}"))
                    .map_err(|_| DifyError::Config("Invalid Authorization header".into()))?;
                value.set_sensitive(true);
                h.insert(AUTHORIZATION, value);
            }
        }

        Ok(h)
    }

    fn url(&self, path: &str) -> String {
        let base = self.api_base.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn turn_timeout(&self) -> Option<Duration> {
        self.turn_timeout
    }

    fn validate_auth(&self) -> Result<(), DifyError> {
        match &self.api_key {
            Some(secret) if !secret.expose_secret().trim().is_empty() => Ok(()),
            _ => Err(DifyError::Config(
                "Missing Dify credentials: set DIFY_API_KEY environment variable".into(),
            )),
        }
    }
}
