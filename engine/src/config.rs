use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Runtime configuration for the simulator binary: ports, file paths, worker
/// counts and tick cadence. Environment variables set the defaults; CLI flags
/// override them when present, mirroring the teacher's `UwbHubConfig::from_env`
/// layering of env vars under an explicit CLI surface.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub net_port: Option<u16>,
    pub net_worker_count: usize,
    pub cmds_input_path: PathBuf,
    pub csv_logger_dir: Option<PathBuf>,
    pub sqlite_db_path: Option<PathBuf>,
    pub boat_init_path: Option<PathBuf>,
    pub tick_interval: Duration,
    pub iterations_per_log: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            net_port: Some(27001),
            net_worker_count: 5,
            cmds_input_path: PathBuf::from("./cmds"),
            csv_logger_dir: Some(PathBuf::from("./boatlogs/")),
            sqlite_db_path: Some(PathBuf::from("./sailnavsim.sql")),
            boat_init_path: Some(PathBuf::from("./boatinit.csv")),
            tick_interval: Duration::from_secs(1),
            iterations_per_log: 60,
        }
    }
}

impl SimConfig {
    fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
        std::env::var(key).ok().and_then(|v| v.parse().ok())
    }

    /// Loads defaults from `SAILNAVSIM_*` environment variables, falling back
    /// to the hardcoded defaults when a variable is absent or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            net_port: Self::env_parsed("SAILNAVSIM_NET_PORT").or(defaults.net_port),
            net_worker_count: Self::env_parsed("SAILNAVSIM_NET_WORKERS")
                .unwrap_or(defaults.net_worker_count),
            cmds_input_path: std::env::var("SAILNAVSIM_CMDS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.cmds_input_path),
            csv_logger_dir: std::env::var("SAILNAVSIM_CSV_DIR")
                .map(PathBuf::from)
                .ok()
                .or(defaults.csv_logger_dir),
            sqlite_db_path: std::env::var("SAILNAVSIM_DB_PATH")
                .map(PathBuf::from)
                .ok()
                .or(defaults.sqlite_db_path),
            boat_init_path: std::env::var("SAILNAVSIM_BOAT_INIT_PATH")
                .map(PathBuf::from)
                .ok()
                .or(defaults.boat_init_path),
            tick_interval: Self::env_parsed::<u64>("SAILNAVSIM_TICK_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
            iterations_per_log: defaults.iterations_per_log,
        }
    }

    /// Applies CLI overrides on top of the env-derived defaults.
    pub fn apply_cli(mut self, cli: &CliArgs) -> Self {
        if let Some(port) = cli.netport {
            self.net_port = Some(port);
        }
        if let Some(workers) = cli.workers {
            self.net_worker_count = workers;
        }
        if let Some(path) = &cli.cmds_path {
            self.cmds_input_path = path.clone();
        }
        if let Some(path) = &cli.csv_dir {
            self.csv_logger_dir = Some(path.clone());
        }
        if let Some(path) = &cli.db_path {
            self.sqlite_db_path = Some(path.clone());
        }
        if let Some(path) = &cli.boat_init_path {
            self.boat_init_path = Some(path.clone());
        }
        self
    }
}

/// Command-line surface for the simulator binary.
#[derive(Debug, Parser)]
#[command(name = "sailnavsim", version = "1.15.1", about = "SailNavSim engine")]
pub struct CliArgs {
    /// TCP port for the request server; omit to disable it entirely.
    #[arg(long)]
    pub netport: Option<u16>,

    /// Number of request-server worker tasks.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Path to the tailed command input file.
    #[arg(long = "cmds-path")]
    pub cmds_path: Option<PathBuf>,

    /// Directory for per-boat CSV logs.
    #[arg(long = "csv-dir")]
    pub csv_dir: Option<PathBuf>,

    /// Path to the SQLite database file.
    #[arg(long = "db-path")]
    pub db_path: Option<PathBuf>,

    /// Path to the CSV boat-seed file read at startup.
    #[arg(long = "boat-init-path")]
    pub boat_init_path: Option<PathBuf>,

    /// Print basic timing information to stderr on exit.
    #[arg(long)]
    pub perf: bool,
}
