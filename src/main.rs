use clap::Parser;
use std::sync::Arc;

mod api;
mod config;
mod http;
mod logger;
mod query;
mod server;
mod store;

use config::{AppState, Config, Overrides, PROJECT_ENV_VAR};
use query::BigQueryExecutor;

/// Runs BLS unemployment queries per year and serves the stored results
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file path (without extension)
    #[arg(short, long, default_value = "config")]
    config: String,

    /// Port to listen on
    #[arg(long)]
    listen_port: Option<u16>,

    /// Directory to store query results in
    #[arg(long)]
    data_path: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let overrides = Overrides {
        listen_port: cli.listen_port,
        data_path: cli.data_path,
        project_id: std::env::var(PROJECT_ENV_VAR).ok(),
    };
    let cfg = Config::load_from(&cli.config, &overrides)?;
    logger::init(&cfg)?;

    // Tokio runtime sized by `server.workers`, defaulting to CPU cores
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let executor = BigQueryExecutor::new(&cfg.query)?;
    let state = Arc::new(AppState::new(cfg, executor));
    state.store.ensure_dir().await?;

    let listener = server::create_listener(addr)?;
    logger::log_server_start(&addr, &state.config);

    // Use LocalSet for spawn_local support
    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::start_server_loop(
            listener,
            state,
            server::shutdown_signal(),
        ))
        .await;
    Ok(())
}
