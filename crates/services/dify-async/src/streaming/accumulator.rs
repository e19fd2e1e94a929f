//! Folds decoded events into one turn's result.

use crate::error::DifyError;
use crate::streaming::decode::StreamEvent;
use crate::types::ChatResult;

/// Accumulates streaming events into a [`ChatResult`]
///
/// ```
/// use dify_async::streaming::{StreamEvent, TurnAccumulator};
///
/// let mut acc = TurnAccumulator::new(None);
/// acc.apply(&StreamEvent::Message { answer: "Hel".into(), conversation_id: None })?;
/// acc.apply(&StreamEvent::Message { answer: "lo".into(), conversation_id: None })?;
/// acc.apply(&StreamEvent::MessageEnd { conversation_id: Some("abc".into()) })?;
///
/// let result = acc.finish();
/// assert_eq!(result.answer, "Hello");
/// assert_eq!(result.conversation_id, "abc");
/// # Ok::<(), dify_async::DifyError>(())
/// ```
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    result: ChatResult,
}

impl TurnAccumulator {
    /// Create an accumulator, seeded with the conversation the turn continues
    #[must_use]
    pub fn new(conversation_id: Option<&str>) -> Self {
        Self {
            result: ChatResult {
                answer: String::new(),
                conversation_id: conversation_id.unwrap_or_default().to_owned(),
            },
        }
    }

    /// Apply one event
    ///
    /// `message_end` does not complete the turn; only the end of the
    /// transport stream does.
    ///
    /// # Errors
    ///
    /// Returns [`DifyError::Upstream`] for an `error` event. The accumulated
    /// fragments must then be discarded by the caller.
    pub fn apply(&mut self, event: &StreamEvent) -> Result<(), DifyError> {
        match event {
            StreamEvent::AgentMessage {
                answer,
                conversation_id,
            }
            | StreamEvent::Message {
                answer,
                conversation_id,
            } => {
                self.result.answer.push_str(answer);
                self.set_conversation_id(conversation_id.as_deref());
            }
            StreamEvent::MessageEnd { conversation_id } => {
                self.set_conversation_id(conversation_id.as_deref());
            }
            StreamEvent::Error(error) => return Err(DifyError::Upstream(error.clone())),
            StreamEvent::Unknown { .. } => {}
        }
        Ok(())
    }

    // Last non-empty id wins; an id is never cleared.
    fn set_conversation_id(&mut self, id: Option<&str>) {
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            id.clone_into(&mut self.result.conversation_id);
        }
    }

    /// Answer text accumulated so far
    #[must_use]
    pub fn current_text(&self) -> &str {
        &self.result.answer
    }

    /// Conversation id known so far (empty if none yet)
    #[must_use]
    pub fn conversation_id(&self) -> &str {
        &self.result.conversation_id
    }

    /// Consume the accumulator once the stream has ended cleanly
    #[must_use]
    pub fn finish(self) -> ChatResult {
        self.result
    }
}
