use rand_chacha::ChaCha20Rng;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::behavior::{HttpMethod, UserBehavior, UserContext};
use crate::client::RequestFailure;
use crate::swarm::picker::TaskPicker;
use crate::swarm::seed::RunSeed;
use crate::swarm::stats::StatsCollector;
use crate::TaskFailure;

/// 가상 사용자 한 명. on_start 한 번 → (작업 선택 → 요청 → 대기) 반복
pub struct SimulatedUser {
    pub context: UserContext,
    behavior: Box<dyn UserBehavior>,
    picker: TaskPicker,
    rng: ChaCha20Rng,
    stats: StatsCollector,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserRunOutcome {
    pub started: bool,
    pub tasks_run: u64,
}

impl SimulatedUser {
    pub fn new(
        context: UserContext,
        behavior: Box<dyn UserBehavior>,
        picker: TaskPicker,
        run_seed: RunSeed,
        stats: StatsCollector,
    ) -> Self {
        let rng = run_seed.user_rng(context.index);
        Self {
            context,
            behavior,
            picker,
            rng,
            stats,
        }
    }

    pub async fn run(mut self, deadline: Instant) -> UserRunOutcome {
        let user_id = self.context.user_id;
        let mut outcome = UserRunOutcome::default();

        if let Err(e) = self.behavior.on_start(&self.context).await {
            warn!("[{}] on_start failed, user stops: {}", user_id, e);
            self.record_setup_failure(e);
            return outcome;
        }
        outcome.started = true;
        debug!("[{}] started", user_id);

        let definition = self.behavior.definition().clone();
        while Instant::now() < deadline {
            let task = &definition.tasks[self.picker.pick(&mut self.rng)];
            // 실패는 통계에만 남기고 계속 돈다
            if let Err(e) = self.context.client.send(&task.name, &task.request).await {
                debug!("[{}] {} failed: {}", user_id, task.name, e);
            }
            outcome.tasks_run += 1;

            let wait = definition.wait_time.sample(&mut self.rng);
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let wake = now.checked_add(wait).map_or(deadline, |t| t.min(deadline));
            tokio::time::sleep_until(wake).await;
        }

        info!("[{}] finished after {} tasks", user_id, outcome.tasks_run);
        outcome
    }

    // 훅 안에서 보낸 요청의 실패는 send가 이미 기록했다. 훅 자체 실패만 on_start로 남긴다
    fn record_setup_failure(&self, failure: TaskFailure) {
        if let TaskFailure::Behavior(msg) = failure {
            self.stats
                .record_failure(HttpMethod::Get, "on_start", &RequestFailure::Hook(msg));
        }
    }
}
