//! Incremental event stream for callers that render fragments as they arrive.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::error::DifyError;
use crate::streaming::decode::{StreamEvent, decode_or_skip};
use crate::streaming::frame::FrameBuffer;

/// Type alias for the event stream returned by streaming APIs
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, DifyError>> + Send + 'static>>;

struct Pending<S> {
    body: Pin<Box<S>>,
    frames: FrameBuffer,
    ready: VecDeque<StreamEvent>,
    done: bool,
}

impl<S> Pending<S> {
    fn push_lines(&mut self, lines: impl IntoIterator<Item = String>) {
        self.ready
            .extend(lines.into_iter().filter_map(|line| decode_or_skip(&line)));
    }
}

/// Convert a response body into a stream of decoded events
///
/// Non-event lines and malformed payloads never reach the stream. `error`
/// events are yielded as [`StreamEvent::Error`]; feeding them to a
/// [`TurnAccumulator`](crate::streaming::TurnAccumulator) turns them into a
/// failure. A transport error, or a line longer than
/// [`DEFAULT_MAX_LINE_BYTES`](crate::streaming::frame::DEFAULT_MAX_LINE_BYTES),
/// is yielded once and ends the stream. Dropping the stream abandons the body.
pub fn event_stream<S, E>(body: S) -> EventStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<DifyError> + Send + 'static,
{
    let state = Pending {
        body: Box::pin(body),
        frames: FrameBuffer::new(),
        ready: VecDeque::new(),
        done: false,
    };

    Box::pin(futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.ready.pop_front() {
                return Some((Ok(event), st));
            }
            if st.done {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => match st.frames.feed(&chunk) {
                    Ok(lines) => st.push_lines(lines),
                    Err(e) => {
                        st.done = true;
                        st.ready.clear();
                        return Some((Err(e), st));
                    }
                },
                Some(Err(e)) => {
                    st.done = true;
                    st.ready.clear();
                    return Some((Err(e.into()), st));
                }
                None => {
                    st.done = true;
                    let tail = st.frames.finish();
                    st.push_lines(tail);
                }
            }
        }
    }))
}

/// Create an event stream from a reqwest Response
///
/// The stream owns the response and will close the connection when dropped.
#[must_use]
pub fn event_stream_from_response(response: reqwest::Response) -> EventStream {
    event_stream(response.bytes_stream())
}
