use anyhow::Result;
use dify_async::{Client, Conversation, DifyConfig};

use crate::turn::{TurnOptions, stream_turn};

pub async fn execute(
    client: &Client<DifyConfig>,
    mut conversation: Conversation<'_, DifyConfig>,
    opts: &TurnOptions,
    query: &str,
) -> Result<()> {
    let mut stdout = std::io::stdout();
    let result = stream_turn(client, &mut conversation, query, opts, &mut stdout).await?;

    if !result.conversation_id.is_empty() {
        eprintln!("conversation: {}", result.conversation_id);
    }
    Ok(())
}
