//! Terminal chat client for Dify apps.
//!
//! `dify-chat ask` sends one question and streams the answer to stdout;
//! `dify-chat repl` keeps a conversation going until stdin closes.

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dify_async::{Client, DifyConfig};

mod commands;
mod turn;

#[derive(Parser)]
#[command(name = "dify-chat")]
#[command(about = "Chat with a Dify app from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Dify app API key
    #[arg(long, env = "DIFY_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// API base URL (defaults to https://api.dify.ai/v1)
    #[arg(long, env = "DIFY_API_URL", global = true)]
    api_url: Option<String>,

    /// End-user id sent with every turn
    #[arg(long, env = "DIFY_USER_ID", default_value = "1", global = true)]
    user_id: String,

    /// Continue an existing conversation
    #[arg(long, global = true)]
    conversation_id: Option<String>,

    /// Abort a turn after this many seconds (at least 1)
    #[arg(
        long,
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    timeout: Option<u64>,

    /// Retries for opening a turn on transient failures
    #[arg(long, default_value_t = 0, global = true)]
    retries: usize,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask one question and print the answer
    Ask {
        /// The question; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Interactive chat; `/new` starts a new conversation, `/exit` quits
    Repl,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();

    let mut config = DifyConfig::new();
    if let Some(base) = cli.api_url {
        config = config.with_api_base(base);
    }
    if let Some(key) = cli.api_key {
        config = config.with_api_key(key);
    }
    let client = Client::with_config(config);

    let mut conversation = client.conversation(cli.user_id);
    if let Some(id) = cli.conversation_id {
        conversation = conversation.resume(id);
    }

    let opts = turn::TurnOptions {
        retries: cli.retries,
        timeout: cli.timeout.map(Duration::from_secs),
    };

    match cli.command {
        Commands::Ask { query } => {
            commands::ask::execute(&client, conversation, &opts, &query.join(" ")).await
        }
        Commands::Repl => commands::repl::execute(&client, conversation, &opts).await,
    }
}
