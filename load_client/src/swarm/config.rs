use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::slo::SloThresholds;

fn default_seed() -> u64 {
    42
}

/// 한 번의 실행 창 상한 (30일)
pub const MAX_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SwarmConfig {
    /// Base URL of the system under test, e.g. http://127.0.0.1:8080
    pub host: String,
    pub users: u64,
    /// Users started per second
    pub spawn_rate: f64,
    pub duration_secs: u64,
    /// Deterministic seed for spawn jitter, task selection, and wait times (overrides LOADTEST_SEED env)
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub jitter_ms: u64,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Optional TOML scenario file. When unset the built-in SimpleWebUser runs.
    #[serde(default)]
    pub scenario: Option<PathBuf>,
    /// Optional result summary output path (JSON)
    #[serde(default)]
    pub result_path: Option<String>,
    #[serde(default)]
    pub thresholds: SloThresholds,
}

impl SwarmConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: SwarmConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// load_env 기본값으로 채운 설정
    pub fn from_env_defaults() -> Self {
        let env_cfg = load_env::LoadEnvConfig::global();
        Self {
            host: env_cfg.target.url(),
            users: env_cfg.runner.users,
            spawn_rate: env_cfg.runner.spawn_rate,
            duration_secs: env_cfg.runner.duration_secs,
            seed: None,
            jitter_ms: 0,
            request_timeout_secs: Some(env_cfg.runner.request_timeout_secs),
            scenario: None,
            result_path: None,
            thresholds: SloThresholds::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.users > 0, "users must be > 0");
        ensure!(
            self.spawn_rate.is_finite() && self.spawn_rate > 0.0,
            "spawn_rate must be > 0"
        );
        ensure!(self.duration_secs > 0, "duration_secs must be > 0");
        ensure!(
            self.duration_secs <= MAX_DURATION_SECS,
            "duration_secs must be <= {}",
            MAX_DURATION_SECS
        );
        url::Url::parse(&self.host)?;
        Ok(())
    }

    /// config → LOADTEST_SEED → 42
    pub fn resolve_seed(&self) -> u64 {
        self.seed
            .or_else(|| {
                std::env::var("LOADTEST_SEED")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
            })
            .unwrap_or_else(default_seed)
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
            .unwrap_or_else(load_env::env::request_timeout_secs)
    }
}
