//! CLI for the convo chat relay.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use convo::broker::{Connector, MemoryBroker, Pool, PoolConfig, Publisher, RedisConnector};
use convo::config::{Settings, load_config};
use convo::transport::{AppState, Relay, serve};
use convo::utils::{Result, logging};

const MEMORY_SCHEME: &str = "memory://";

#[derive(Parser)]
#[command(name = "convo", about = "Real-time chat relay over a pub/sub broker")]
struct Cli {
    /// Configuration file (defaults to config/default.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Broker address, e.g. redis://127.0.0.1:6379 or memory://
    #[arg(long)]
    broker_url: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut settings = match load_config(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(url) = cli.broker_url {
        settings.broker.url = url;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    logging::init(&settings.log.level);

    let outcome = if settings.broker.url.starts_with(MEMORY_SCHEME) {
        run_server(&settings, MemoryBroker::new()).await
    } else {
        match RedisConnector::new(&settings.broker.url) {
            Ok(connector) => run_server(&settings, connector).await,
            Err(e) => Err(e.into()),
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_server<C: Connector>(settings: &Settings, connector: C) -> Result<()> {
    let pool = Pool::new(
        connector,
        PoolConfig {
            max_active: settings.broker.max_active,
            idle_timeout: settings.broker.idle_timeout(),
        },
    );
    let reaper = pool.spawn_reaper(settings.broker.idle_timeout() / 2);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(broker = %settings.broker.url, "broker pool ready");

    let publisher = Publisher::with_wait(pool.clone(), settings.broker.publish_wait());
    let relay = Relay::with_publisher(pool.clone(), publisher);
    let state = AppState::new(relay, settings.server.static_dir.clone());
    let served = serve(listener, state, shutdown_signal()).await;

    pool.close();
    reaper.abort();
    info!("Shutdown complete");
    served.map_err(Into::into)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received. Exiting gracefully."),
        Err(e) => {
            error!("Cannot listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    }
}
