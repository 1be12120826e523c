//! reap - harvest chat history into per-conversation text corpora

mod config;
mod prompt;

use std::path::PathBuf;

use clap::Parser;
use reap_client::BridgeTransport;
use reap_engine::Harvester;

const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:8014";

/// Harvest a messaging account's full conversation history into
/// token-delimited text files, one per conversation
#[derive(Parser, Debug)]
#[command(name = "reap")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Marker emitted when the sender changes (default: <|cs|>)
    #[arg(long, value_name = "TOKEN")]
    token_change_sender: Option<String>,

    /// Marker standing in for non-text messages (default: <|media|>)
    #[arg(long, value_name = "TOKEN")]
    token_media: Option<String>,

    /// Marker prefixed to your own messages (default: <|--me--|>)
    #[arg(long, value_name = "TOKEN")]
    token_author: Option<String>,

    /// Marker opening every message (default: <|m|>)
    #[arg(long, value_name = "TOKEN")]
    token_message_begin: Option<String>,

    /// Marker closing every message (default: <|--m|>)
    #[arg(long, value_name = "TOKEN")]
    token_message_end: Option<String>,

    /// Output directory, recreated destructively at run start (default: out)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Messages fetched per history request (default: 100)
    #[arg(long, value_name = "N")]
    messages_per_request: Option<i32>,

    /// Writer capacity in messages per conversation (default: 33554432)
    #[arg(long, value_name = "N")]
    per_chat_buffer_size: Option<usize>,

    /// Emit messages oldest-to-newest (default: true)
    #[arg(long, value_name = "BOOL")]
    reverse_chat_order: Option<bool>,

    /// Base URL of the messaging bridge daemon
    #[arg(long, value_name = "URL")]
    bridge_url: Option<String>,

    /// Path to a config file (default: ~/.config/reap/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    let default_filter = if args.verbose {
        "reap_cli=debug,reap_engine=debug,reap_client=debug"
    } else {
        "reap_cli=info,reap_engine=info,reap_client=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    // Initialize config and exit
    if args.init_config {
        let path = config::FileConfig::init()?;
        println!("Config file created at: {}", path.display());
        return Ok(());
    }

    let file = match &args.config {
        Some(path) => config::FileConfig::load_from(path)?,
        None => config::FileConfig::load(),
    };

    // defaults <- config file <- flags
    let mut cfg = file.to_harvest_config();
    if let Some(v) = args.token_change_sender {
        cfg.markers.change_sender = v;
    }
    if let Some(v) = args.token_media {
        cfg.markers.media = v;
    }
    if let Some(v) = args.token_author {
        cfg.markers.author = v;
    }
    if let Some(v) = args.token_message_begin {
        cfg.markers.message_begin = v;
    }
    if let Some(v) = args.token_message_end {
        cfg.markers.message_end = v;
    }
    if let Some(v) = args.output_dir {
        cfg.output_dir = v;
    }
    if let Some(v) = args.messages_per_request {
        cfg.messages_per_request = v;
    }
    if let Some(v) = args.per_chat_buffer_size {
        cfg.per_chat_buffer_size = v;
    }
    if let Some(v) = args.reverse_chat_order {
        cfg.reverse_chat_order = v;
    }

    // reported before anything touches the network
    cfg.validate()?;

    tracing::info!(
        change_sender = %cfg.markers.change_sender,
        media = %cfg.markers.media,
        author = %cfg.markers.author,
        message_begin = %cfg.markers.message_begin,
        message_end = %cfg.markers.message_end,
        output_dir = %cfg.output_dir.display(),
        messages_per_request = cfg.messages_per_request,
        per_chat_buffer_size = cfg.per_chat_buffer_size,
        reverse_chat_order = cfg.reverse_chat_order,
        "starting harvest"
    );

    let bridge_url = args
        .bridge_url
        .or(file.bridge_url)
        .unwrap_or_else(|| DEFAULT_BRIDGE_URL.to_string());
    let transport = BridgeTransport::new(&bridge_url);

    let mut harvester = Harvester::new(cfg, Box::new(transport), Box::new(prompt::StdinPrompt))?;
    let summary = harvester.run().await?;

    tracing::info!(
        conversations = summary.conversations,
        messages = summary.messages,
        "harvest complete"
    );
    Ok(())
}
