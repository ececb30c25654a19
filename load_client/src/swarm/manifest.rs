use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use super::config::SwarmConfig;
use super::slo::SloReport;
use super::stats::StatsSnapshot;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub timestamp: DateTime<Utc>,
    pub seed: u64,
    pub behavior: String,
    pub config: SwarmConfig,
    /// 초 단위 스폰 분포
    pub spawn_per_second: Vec<u64>,
    pub users_spawned: u64,
    pub stats: StatsSnapshot,
    pub slo: SloReport,
}

pub fn save_run_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let payload = serde_json::to_vec_pretty(summary)?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, payload)?;
    Ok(())
}
