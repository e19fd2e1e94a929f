//! One chat turn: open the request, then drive the read loop to completion.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{CancelReason, DifyError, deserialize_api_error};
use crate::streaming::accumulator::TurnAccumulator;
use crate::streaming::decode::decode_or_skip;
use crate::streaming::frame::FrameBuffer;
use crate::types::ChatResult;

/// Lifecycle of a [`StreamSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the response head
    Opening,
    /// Consuming the response body
    Reading,
    /// The body ended cleanly and the result was handed out
    Completed,
    /// Transport failure, non-success status, or an `error` event
    Failed,
    /// Caller abort or deadline
    Cancelled,
}

impl SessionState {
    /// True once no further transition is possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Owns the framing buffer and the in-flight result for one turn
///
/// Every await inside the session is raced against the cancellation token
/// and the deadline, so an abort is observed at the next suspension point and
/// no further events are applied after it. On any failure the buffered bytes
/// and partial answer are dropped.
#[derive(Debug)]
pub struct StreamSession {
    state: SessionState,
    frames: FrameBuffer,
    turn: TurnAccumulator,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl StreamSession {
    /// Start a session continuing `conversation_id` (or a new conversation)
    #[must_use]
    pub fn new(conversation_id: Option<&str>) -> Self {
        Self {
            state: SessionState::Opening,
            frames: FrameBuffer::new(),
            turn: TurnAccumulator::new(conversation_id),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Abort the session when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Abort the session once `timeout` has elapsed from now
    ///
    /// A timeout too large to represent as an instant means no deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Await the response head and check its status
    ///
    /// On success the session moves to [`SessionState::Reading`] and the
    /// response is returned for its body.
    ///
    /// # Errors
    ///
    /// - [`DifyError::Reqwest`] if the request could not be sent
    /// - [`DifyError::Api`] for a non-success status, carrying the body text
    /// - [`DifyError::Cancelled`] if aborted or past the deadline
    pub async fn open<F>(&mut self, send: F) -> Result<reqwest::Response, DifyError>
    where
        F: Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let response = match self.interruptible(send).await? {
            Ok(response) => response,
            Err(e) => return Err(self.fail(e.into())),
        };

        let status = response.status();
        if status.is_success() {
            tracing::debug!(%status, "chat stream opened");
            self.state = SessionState::Reading;
            return Ok(response);
        }

        match self.interruptible(response.bytes()).await? {
            Ok(body) => Err(self.fail(deserialize_api_error(status, &body))),
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Drive the read loop until the body ends, fails, or is cancelled
    ///
    /// Each chunk is framed, decoded, and applied before the next one is
    /// requested. A trailing line without a terminating newline is still
    /// applied when the body ends.
    ///
    /// # Errors
    ///
    /// - [`DifyError::Upstream`] for an `error` event
    /// - the transport error converted from `E` if reading a chunk fails
    /// - [`DifyError::LineTooLong`] if a line never terminates
    /// - [`DifyError::Cancelled`] if aborted or past the deadline
    pub async fn read<S, E>(&mut self, body: S) -> Result<ChatResult, DifyError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<DifyError>,
    {
        futures::pin_mut!(body);
        self.state = SessionState::Reading;

        loop {
            match self.interruptible(body.next()).await? {
                Some(Ok(chunk)) => {
                    let lines = match self.frames.feed(&chunk) {
                        Ok(lines) => lines,
                        Err(e) => return Err(self.fail(e)),
                    };
                    for line in lines {
                        self.dispatch(&line)?;
                    }
                }
                Some(Err(e)) => return Err(self.fail(e.into())),
                None => {
                    if let Some(tail) = self.frames.finish() {
                        self.dispatch(&tail)?;
                    }
                    self.state = SessionState::Completed;
                    let result = std::mem::take(&mut self.turn).finish();
                    tracing::debug!(
                        answer_len = result.answer.len(),
                        conversation_id = %result.conversation_id,
                        "chat turn completed"
                    );
                    return Ok(result);
                }
            }
        }
    }

    fn dispatch(&mut self, line: &str) -> Result<(), DifyError> {
        let Some(event) = decode_or_skip(line) else {
            return Ok(());
        };
        if let Err(e) = self.turn.apply(&event) {
            return Err(self.fail(e));
        }
        Ok(())
    }

    async fn interruptible<F: Future>(&mut self, fut: F) -> Result<F::Output, DifyError> {
        let cancel = self.cancel.clone();
        let deadline = self.deadline;

        let reason = tokio::select! {
            biased;
            () = cancel.cancelled() => CancelReason::Aborted,
            () = deadline_elapsed(deadline) => CancelReason::TimedOut,
            out = fut => return Ok(out),
        };

        tracing::info!(%reason, state = ?self.state, "chat turn cancelled");
        self.state = SessionState::Cancelled;
        self.discard();
        Err(DifyError::Cancelled(reason))
    }

    fn fail(&mut self, err: DifyError) -> DifyError {
        tracing::debug!(error = %err, state = ?self.state, "chat turn failed");
        self.state = SessionState::Failed;
        self.discard();
        err
    }

    fn discard(&mut self) {
        self.frames = FrameBuffer::new();
        self.turn = TurnAccumulator::default();
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
