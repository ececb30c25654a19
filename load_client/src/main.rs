use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use load_client::behavior::UserBehavior;
use load_client::scenario_file::FileUser;
use load_client::swarm::config::SwarmConfig;
use load_client::swarm::run_swarm;
use load_client::users::SimpleWebUser;

#[derive(Debug, Parser)]
#[command(name = "load_client", about = "Run a swarm of simulated web users")]
struct Cli {
    /// Swarm config (TOML). Values not given fall back to load_env defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Scenario file (TOML). Defaults to the built-in SimpleWebUser.
    #[arg(long)]
    scenario: Option<PathBuf>,
    /// Base URL of the target, e.g. http://127.0.0.1:8080
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    users: Option<u64>,
    #[arg(long)]
    spawn_rate: Option<f64>,
    /// Run time in seconds
    #[arg(long)]
    run_time: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,
    /// Write the JSON run summary here
    #[arg(long)]
    out: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<SwarmConfig> {
        let mut cfg = match &self.config {
            Some(path) => SwarmConfig::from_path(path)?,
            None => SwarmConfig::from_env_defaults(),
        };
        if let Some(host) = self.host {
            cfg.host = host;
        }
        if let Some(users) = self.users {
            cfg.users = users;
        }
        if let Some(rate) = self.spawn_rate {
            cfg.spawn_rate = rate;
        }
        if let Some(secs) = self.run_time {
            cfg.duration_secs = secs;
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        if self.scenario.is_some() {
            cfg.scenario = self.scenario;
        }
        if self.out.is_some() {
            cfg.result_path = self.out;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env::init()?;
    let guard = load_client::setup_logger("load_client");
    load_env::report_config_status();

    let cfg = Cli::parse().into_config()?;
    let behavior: Box<dyn UserBehavior> = match &cfg.scenario {
        Some(path) => Box::new(FileUser::from_path(path)?),
        None => Box::new(SimpleWebUser::new()),
    };

    let summary = run_swarm(cfg, behavior).await?;
    for entry in summary.stats.entries.iter().chain(std::iter::once(&summary.stats.total)) {
        info!(
            "{:<6} {:<20} reqs={:<7} fails={:<5} avg={:>8.1}ms p50={:?} p95={:?} p99={:?} rps={:.2}",
            entry.method,
            entry.name,
            entry.num_requests,
            entry.num_failures,
            entry.avg_response_ms.unwrap_or(0.0),
            entry.p50_response_ms,
            entry.p95_response_ms,
            entry.p99_response_ms,
            entry.requests_per_sec,
        );
    }

    if !summary.slo.passed {
        warn!("SLO failed: {:?}", summary.slo.details);
        // exit 전에 파일 로거 flush
        drop(guard);
        std::process::exit(1);
    }
    Ok(())
}
