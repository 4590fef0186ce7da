use anyhow::Result;
use clap::{Parser, Subcommand};
use worldaipedia_backend::api;
use worldaipedia_backend::config::WorldaiConfig;
use worldaipedia_backend::notifications;
use worldaipedia_backend::store::Store;
use worldaipedia_backend::telemetry;
use worldaipedia_backend::utils;

#[derive(Parser)]
#[command(author, version, about = "WorldAIPedia backend server")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (Axum) for REST/API access
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::print_banner();
    telemetry::init_tracing();

    let args = Args::parse();

    let config = WorldaiConfig::from_env()?;
    config.paths.ensure_directories()?;

    let store = Store::open(&config.paths.db_path)?;
    let fanout = notifications::spawn_fanout_worker(store.clone());
    tracing::info!(
        db = %config.paths.db_path.display(),
        port = config.api_port,
        "bootstrap complete"
    );

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => api::serve_http(config, store, fanout).await,
    }
}
