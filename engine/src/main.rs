//! Process entry point: load configuration, init tracing, build the shared
//! registry and environment bundle, seed it via the init loader, then spawn
//! the Scheduler, command-file tailer, Logger and request-server tasks.
//!
//! Grounded on `backend-rust/src/main.rs`'s startup shape (`#[tokio::main]`,
//! `tracing_subscriber::fmt().with_env_filter(...)`, `Arc::new(RwLock::new(...))`
//! construction, `tokio::spawn` fan-out, final `.await` on the long-lived
//! task) retargeted from the teacher's HTTP/Socket.IO stack onto
//! `original_source/src/main.c`'s own startup sequence (config parse,
//! `BoatInitParser_start`, `NetServer_start`, `Logger_start`, then the main
//! tick loop).

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use clap::Parser;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use sailnavsim_env::{SyntheticCelestial, SyntheticCompass, SyntheticGeoInfo, SyntheticOcean, SyntheticWave, SyntheticWeather};

use sailnavsim_engine::config::{CliArgs, SimConfig};
use sailnavsim_engine::init_loader as boat_init;
use sailnavsim_engine::logger::{self, Logger};
use sailnavsim_engine::net_server;
use sailnavsim_engine::registry::Registry;
use sailnavsim_engine::scheduler::{EnvBundle, Scheduler};
use sailnavsim_engine::command;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "sailnavsim=info".into()),
        )
        .init();

    let cli = CliArgs::parse();
    let config = SimConfig::from_env().apply_cli(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "sailnavsim engine starting");

    let pool = match &config.sqlite_db_path {
        Some(path) => match connect_sqlite(path).await {
            Ok(pool) => Some(pool),
            Err(e) => {
                error!(error = %e, path = %path.display(), "failed to open sqlite database, continuing without relational persistence");
                None
            }
        },
        None => None,
    };

    if let Some(pool) = &pool {
        if let Err(e) = logger::run_migrations(pool).await {
            error!(error = %e, "failed to run database migrations");
        }
    }

    let env = Arc::new(EnvBundle {
        weather: Arc::new(SyntheticWeather::new()),
        ocean: Arc::new(SyntheticOcean::new()),
        wave: Arc::new(SyntheticWave::new()),
        geo: Arc::new(SyntheticGeoInfo::new()),
        compass: Arc::new(SyntheticCompass::new()),
        celestial: Arc::new(SyntheticCelestial::new()),
    });

    let mut registry = Registry::new();
    if let Err(e) = boat_init::load(&mut registry, pool.as_ref(), config.boat_init_path.as_deref()).await {
        error!(error = %e, "failed to load boat init data, starting with an empty registry");
    }
    let registry = Arc::new(RwLock::new(registry));

    let (cmd_tx, cmd_rx) = tokio::sync::mpsc::unbounded_channel();

    let command_error_count = Arc::new(AtomicU64::new(0));
    tokio::spawn(command::tail_file(
        config.cmds_input_path.clone(),
        cmd_tx.clone(),
        command_error_count,
    ));

    let (logger, logger_tx) = Logger::new(config.csv_logger_dir.clone(), pool.clone());
    tokio::spawn(logger.run());

    let scheduler = Scheduler::new(Arc::clone(&registry), Arc::clone(&env), cmd_rx, logger_tx, pool.clone());
    tokio::spawn(scheduler.run());

    if let Some(port) = config.net_port {
        let registry = Arc::clone(&registry);
        let env = Arc::clone(&env);
        let cmd_tx = cmd_tx.clone();
        let worker_count = config.net_worker_count;
        tokio::spawn(async move {
            if let Err(e) = net_server::run("0.0.0.0", port, worker_count, registry, env, cmd_tx).await {
                error!(error = %e, "request server exited");
            }
        });
    } else {
        warn!("no net port configured, request server disabled");
    }

    // The long-lived tasks above never return in normal operation; block
    // forever so the process stays up for their `.await`s to progress.
    std::future::pending::<()>().await;
}

async fn connect_sqlite(path: &std::path::Path) -> Result<sqlx::SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
    SqlitePoolOptions::new().max_connections(5).connect_with(options).await
}
