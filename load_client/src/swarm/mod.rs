use std::time::Duration;

use anyhow::anyhow;
use futures_util::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::behavior::{UserBehavior, UserContext};
use crate::client::UserClient;
use crate::swarm::manifest::{save_run_summary, RunSummary};
use crate::swarm::picker::TaskPicker;
use crate::swarm::schedule::SpawnSchedule;
use crate::swarm::seed::RunSeed;
use crate::swarm::stats::StatsCollector;
use crate::swarm::user::SimulatedUser;

pub mod config;
pub mod manifest;
pub mod picker;
pub mod schedule;
pub mod seed;
pub mod slo;
pub mod stats;
pub mod user;

/// 스케줄에 맞춰 가상 사용자를 띄우고, duration이 지나면 통계를 모아 요약을 돌려준다.
///
/// 설정/초기화 오류만 `Err`가 된다. SLO 실패는 `summary.slo.passed`로 확인한다.
pub async fn run_swarm(
    cfg: config::SwarmConfig,
    behavior: Box<dyn UserBehavior>,
) -> anyhow::Result<RunSummary> {
    cfg.validate()?;
    let definition = behavior.definition().clone();
    definition.validate()?;
    let picker = TaskPicker::new(&definition.tasks)
        .ok_or_else(|| anyhow!("behavior '{}' has no selectable task", definition.name))?;

    let seed = RunSeed(cfg.resolve_seed());
    let base = Url::parse(&cfg.host)?;
    let http = UserClient::build_http(Duration::from_secs(cfg.request_timeout_secs()))?;

    info!(
        "Starting swarm: behavior={}, host={}, users={}, spawn_rate={}, duration_secs={}, seed={}",
        definition.name, cfg.host, cfg.users, cfg.spawn_rate, cfg.duration_secs, seed.0
    );

    let schedule = SpawnSchedule::constant_rate(seed, cfg.users, cfg.spawn_rate, cfg.jitter_ms)?;
    let window = Duration::from_secs(cfg.duration_secs);

    let stats = StatsCollector::new();
    let t0 = Instant::now();
    let deadline = t0
        .checked_add(window)
        .ok_or_else(|| anyhow!("duration_secs {} is too large", cfg.duration_secs))?;

    let skipped = schedule.offsets_ms().len() - schedule.within(window).count();
    if skipped > 0 {
        debug!("{} users scheduled past the run window are skipped", skipped);
    }

    let mut handles = Vec::new();
    for (index, offset) in schedule.within(window) {
        let start_at = t0 + offset;
        let context = UserContext {
            user_id: seed.user_id(index),
            index,
            client: UserClient::new(http.clone(), base.clone(), stats.clone()),
        };
        let user = SimulatedUser::new(
            context,
            behavior.clone_trait(),
            picker.clone(),
            seed,
            stats.clone(),
        );

        handles.push(tokio::spawn(async move {
            tokio::time::sleep_until(start_at).await;
            user.run(deadline).await
        }));
    }

    let users_spawned = handles.len() as u64;
    info!("Swarm run window: {:?}, {} users scheduled", deadline - t0, users_spawned);

    let mut users_started = 0u64;
    for outcome in join_all(handles).await {
        match outcome {
            Ok(o) if o.started => users_started += 1,
            Ok(_) => {}
            Err(e) => warn!("user task panicked or was cancelled: {}", e),
        }
    }
    info!(
        "Swarm window elapsed: {}/{} users ran their loop. Evaluating SLO...",
        users_started, users_spawned
    );

    let snapshot = stats.snapshot();
    let report = slo::evaluate_slo(&snapshot, &definition, &cfg.thresholds);
    if report.passed {
        info!(
            "SLO PASS: requests={}, failure_ratio={:.3}, p95={:?}ms",
            report.total_requests, report.failure_ratio, report.p95_response_ms
        );
    } else {
        warn!("SLO FAIL: {:?}", report.details);
    }

    let summary = RunSummary {
        timestamp: chrono::Utc::now(),
        seed: seed.0,
        behavior: definition.name.clone(),
        spawn_per_second: schedule.per_second(cfg.duration_secs),
        users_spawned,
        config: cfg,
        stats: snapshot,
        slo: report,
    };

    if let Some(out_path) = summary.config.result_path.clone() {
        match save_run_summary(std::path::Path::new(&out_path), &summary) {
            Ok(()) => info!("Saved run summary to {}", out_path),
            Err(e) => warn!("Failed to save run summary to {}: {}", out_path, e),
        }
    }

    Ok(summary)
}
