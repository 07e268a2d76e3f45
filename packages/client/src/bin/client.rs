//! Interactive boss battle client.
//!
//! Joins bosses, keeps the join state in sync with other client processes
//! sharing the same storage directory, and opens realtime previews.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin bossbattle-client
//! cargo run --bin bossbattle-client -- --user-token user-42 --storage-dir /tmp/boss
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;

use bossbattle_client::{
    domain::IdentityToken,
    ui::{
        ClientConfig, DEFAULT_POLL_INTERVAL, DEFAULT_SOCKET_URL, DEFAULT_STORAGE_DIR, run_client,
    },
};
use bossbattle_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "bossbattle-client")]
#[command(about = "Boss battle client with cross-process join state and realtime preview", long_about = None)]
struct Args {
    /// Directory for join state shared between client processes
    #[arg(short = 's', long, default_value = DEFAULT_STORAGE_DIR)]
    storage_dir: PathBuf,

    /// Realtime preview WebSocket endpoint
    #[arg(short = 'u', long, default_value = DEFAULT_SOCKET_URL)]
    socket_url: String,

    /// Authenticated user token (a guest token is used when omitted)
    #[arg(short = 't', long)]
    user_token: Option<String>,

    /// Storage polling interval in milliseconds
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    poll_interval_ms: u64,
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        Self {
            storage_dir: args.storage_dir,
            socket_url: args.socket_url,
            user_token: args.user_token.map(IdentityToken::new),
            poll_interval: Duration::from_millis(args.poll_interval_ms),
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    if let Err(e) = run_client(args.into()).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
