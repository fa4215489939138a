//! parsec-server — the Parsec synchronization server binary.
//!
//! Wires the Auth Pipeline / RPC Dispatcher / SSE Streamer (`parsec-rpc`)
//! onto an axum router over a single in-process `Store` + `EventBus`.
//! Scheduling model is the default Tokio multi-threaded runtime's
//! cooperative tasks standing in for a single-threaded event loop with many
//! thousand in-flight requests sharing it; the Data Store's own per-topic
//! locks are what actually serializes writes, not the executor.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use parsec_server::build_router;
use parsec_server::config::ServerConfig;
use parsec_server::state::AppState;

#[derive(Parser, Debug)]
#[command(
    name = "parsec-server",
    version,
    about = "Parsec zero-trust multi-tenant synchronization server"
)]
struct Args {
    /// HTTP listen address. Overrides `listen` in `--config`, if set.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// SSE keep-alive interval in seconds. Overrides
    /// `sse_keepalive_secs` in `--config`, if set.
    #[arg(long)]
    sse_keepalive_secs: Option<u64>,

    /// Path to an optional TOML config file supplying defaults for anything
    /// not passed on the command line.
    #[arg(long)]
    config: Option<PathBuf>,
}

const DEFAULT_LISTEN: &str = "127.0.0.1:6777";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                config
                    .log_filter
                    .clone()
                    .unwrap_or_else(|| "info,parsec=debug".to_string())
                    .parse()
                    .unwrap()
            }),
        )
        .init();

    let listen: SocketAddr = args
        .listen
        .or_else(|| config.listen.as_deref().and_then(|s| s.parse().ok()))
        .unwrap_or_else(|| DEFAULT_LISTEN.parse().unwrap());
    let sse_keepalive_secs = args.sse_keepalive_secs.unwrap_or_else(|| config.sse_keepalive_secs());

    tracing::info!(%listen, "parsec-server starting");

    let app = AppState::new(Duration::from_secs(sse_keepalive_secs));
    let router = build_router(app);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}
