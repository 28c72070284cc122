use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use livecast::{
    init_logging, network::run_tcp_server, AppState, Coordinates, InMemoryStore, NewVehicle,
    Settings, TopicRegistry,
};
use tracing::info;

/// In-process live fan-out of vehicle state changes over TCP.
#[derive(Debug, Parser)]
#[command(name = "livecast", version, about)]
struct Cli {
    /// Path to a configuration file (toml, json, yaml)
    #[arg(short, long, env = "LIVECAST_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overrides `server.listen_address`
    #[arg(short, long)]
    listen: Option<String>,

    /// Log level or filter directive, overrides `logging.level`
    #[arg(long)]
    log_level: Option<String>,

    /// Seed the in-memory store with a few demo vehicles
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Settings::load().context("Failed to load config")?,
    };
    if let Some(listen) = cli.listen {
        settings.server.listen_address = listen;
    }
    if let Some(level) = cli.log_level {
        settings.logging.level = level;
    }
    settings.validate()?;

    let logging = init_logging(&settings.logging)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("LIVECAST_GIT_COMMIT"),
        built = env!("LIVECAST_BUILD_TIME"),
        profile = env!("LIVECAST_BUILD_PROFILE"),
        "starting livecast"
    );

    let store = if cli.demo {
        InMemoryStore::with_vehicles(demo_vehicles())?
    } else {
        InMemoryStore::new()
    };
    let registry = TopicRegistry::new(settings.pubsub.delivery_policy());
    info!(
        policy = ?registry.default_policy(),
        vehicles = store.vehicle_count(),
        "record store ready"
    );
    let state = AppState::new(Arc::new(store), registry);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("ctrl-c received, shutting down");
    };

    let result = run_tcp_server(&settings.server, state, shutdown).await;
    logging.shutdown_async().await;
    result
}

fn demo_vehicles() -> Vec<NewVehicle> {
    [
        ("bus-12", 55.7558, 37.6173),
        ("tram-3", 59.9343, 30.3351),
        ("trolley-7", 56.8389, 60.6057),
    ]
    .into_iter()
    .map(|(name, lat, lon)| NewVehicle {
        name: name.to_string(),
        coordinates: Coordinates::new(lat, lon),
    })
    .collect()
}
