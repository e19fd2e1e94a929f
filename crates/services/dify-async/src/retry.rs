//! Retrying the opening of a turn.
//!
//! The client never retries on its own. Once the response head has arrived
//! the caller may already be rendering fragments, so only the opening
//! (connect, send, status check) is safe to repeat.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::config::Config;
use crate::error::DifyError;
use crate::resources::ChatMessages;
use crate::streaming::EventStream;
use crate::types::ChatRequest;

/// Backoff for reopening a turn: 500ms doubling to at most 4s, 3 retries,
/// with jitter
#[must_use]
pub fn default_backoff_builder() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(4))
        .with_max_times(3)
        .with_factor(2.0)
        .with_jitter()
}

/// Statuses worth reopening a turn for: 408, 409, 429, and 5xx
#[must_use]
pub const fn is_retryable_status(code: u16) -> bool {
    matches!(code, 408 | 409 | 429 | 500..=599)
}

/// Open a streaming turn, retrying transient failures with `backoff`
///
/// Only errors for which [`DifyError::is_retryable`] holds are retried; a
/// request rejected with 4xx, missing credentials, or a cancellation fails
/// immediately. Events are never replayed: the returned stream is the one
/// from the attempt that succeeded.
///
/// # Errors
///
/// The error of the last attempt.
pub async fn create_stream_with_retry<C: Config>(
    messages: &ChatMessages<'_, C>,
    req: &ChatRequest,
    backoff: ExponentialBuilder,
) -> Result<EventStream, DifyError> {
    (|| messages.create_stream(req.clone()))
        .retry(backoff)
        .when(DifyError::is_retryable)
        .notify(|err, delay| {
            tracing::warn!(error = %err, ?delay, "opening chat turn failed, retrying");
        })
        .await
}
