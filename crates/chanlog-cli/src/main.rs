//! chanlog chat client.
//!
//! # Usage
//!
//! ```bash
//! # Against a local Redis server
//! chanlog --nick Alice
//!
//! # Offline, with an in-process log store
//! chanlog --memory --channel random
//! ```

use std::sync::Arc;

use chanlog_bus::ChannelBus;
use chanlog_cli::{ChatSession, CliError, render, validate_nick};
use chanlog_store::{LogStore, MemoryLogStore, RedisLogStore};
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Channel chat over an append-only log
#[derive(Parser, Debug)]
#[command(name = "chanlog")]
#[command(about = "Terminal chat over Redis Streams")]
#[command(version)]
struct Args {
    /// Redis server URL
    #[arg(long, default_value = "redis://127.0.0.1:6379/0")]
    redis_url: String,

    /// Use an in-process store instead of Redis
    #[arg(long)]
    memory: bool,

    /// Nickname (2 to 20 characters)
    #[arg(short, long, default_value = "Usuario")]
    nick: String,

    /// Channel to enter on startup
    #[arg(short, long)]
    channel: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout belongs to the chat
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if args.memory {
        tracing::info!("using in-process log store");
        return Ok(chat(MemoryLogStore::new(), &args).await?);
    }

    let store = RedisLogStore::connect(&args.redis_url).await.map_err(CliError::from)?;
    let result = chat(store.clone(), &args).await;
    store.close().await;

    Ok(result?)
}

async fn chat<S: LogStore>(store: S, args: &Args) -> Result<(), CliError> {
    let nick = validate_nick(&args.nick)?;
    let bus = Arc::new(ChannelBus::new(store));

    let mut session = ChatSession::new(bus, nick, render::local_offset(), tokio::io::stdout());
    session.start(args.channel.as_deref()).await?;
    session.run(BufReader::new(tokio::io::stdin())).await
}
