//! Streams one chat turn to a writer.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use dify_async::retry::{create_stream_with_retry, default_backoff_builder};
use dify_async::streaming::TurnAccumulator;
use dify_async::{CancelReason, ChatResult, Client, Conversation, DifyConfig, DifyError};
use futures::StreamExt;

pub struct TurnOptions {
    /// Extra attempts at opening a turn; 0 disables retries
    pub retries: usize,
    /// Bound on the whole turn, body included
    pub timeout: Option<Duration>,
}

/// Run one turn, writing fragments to `out` as they arrive
///
/// Ctrl-C or the timeout abandons the turn. The conversation id is only
/// updated when the turn completes.
pub async fn stream_turn<W: Write>(
    client: &Client<DifyConfig>,
    conversation: &mut Conversation<'_, DifyConfig>,
    query: &str,
    opts: &TurnOptions,
    out: &mut W,
) -> Result<ChatResult> {
    let deadline = async {
        match opts.timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };

    let result = tokio::select! {
        res = drive(client, conversation, query, opts.retries, out) => res?,
        () = deadline => return Err(DifyError::Cancelled(CancelReason::TimedOut).into()),
        Ok(()) = tokio::signal::ctrl_c() => {
            return Err(DifyError::Cancelled(CancelReason::Aborted).into());
        }
    };

    conversation.record(&result);
    tracing::debug!(
        conversation_id = conversation.id().unwrap_or_default(),
        answer_len = result.answer.len(),
        "turn recorded"
    );
    Ok(result)
}

async fn drive<W: Write>(
    client: &Client<DifyConfig>,
    conversation: &Conversation<'_, DifyConfig>,
    query: &str,
    retries: usize,
    out: &mut W,
) -> Result<ChatResult> {
    let request = conversation.request(query);
    let messages = client.chat_messages();

    let backoff = default_backoff_builder().with_max_times(retries);
    let mut events = create_stream_with_retry(&messages, &request, backoff).await?;

    let mut turn = TurnAccumulator::new(conversation.id());
    while let Some(event) = events.next().await {
        let event = event?;
        if let Some(fragment) = event.answer_fragment() {
            out.write_all(fragment.as_bytes())
                .and_then(|()| out.flush())
                .context("writing answer")?;
        }
        turn.apply(&event)?;
    }
    writeln!(out).context("writing answer")?;

    Ok(turn.finish())
}
