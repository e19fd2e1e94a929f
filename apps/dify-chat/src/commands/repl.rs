//! Line-oriented chat loop over stdin.

use std::io::{BufRead, Write};

use anyhow::Result;
use dify_async::{Client, Conversation, DifyConfig};
use tokio::sync::mpsc;

use crate::turn::{TurnOptions, stream_turn};

pub async fn execute(
    client: &Client<DifyConfig>,
    mut conversation: Conversation<'_, DifyConfig>,
    opts: &TurnOptions,
) -> Result<()> {
    let mut lines = spawn_stdin_reader();
    let mut stdout = std::io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let line = tokio::select! {
            line = lines.recv() => line.transpose()?,
            Ok(()) = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match line.trim() {
            "" => {}
            "/exit" | "/quit" => break,
            "/new" => {
                tracing::info!(previous = conversation.id(), "resetting conversation");
                conversation.reset();
                eprintln!("started a new conversation");
            }
            query => {
                // A failed turn keeps the previous conversation id.
                if let Err(e) = stream_turn(client, &mut conversation, query, opts, &mut stdout).await {
                    eprintln!("\nerror: {e:#}");
                }
            }
        }
    }

    writeln!(stdout)?;
    Ok(())
}

/// Reads stdin on a plain thread so leaving the loop never waits for input.
fn spawn_stdin_reader() -> mpsc::Receiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}
