use serde::{Deserialize, Serialize};

use crate::behavior::BehaviorDefinition;
use crate::swarm::stats::StatsSnapshot;

fn default_max_failure_ratio() -> f64 {
    0.01
}

fn default_max_mix_deviation() -> f64 {
    0.2
}

fn default_min_mix_samples() -> u64 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SloThresholds {
    #[serde(default = "default_max_failure_ratio")]
    pub max_failure_ratio: f64,
    /// None이면 응답 시간은 평가하지 않는다
    #[serde(default)]
    pub p95_response_ms: Option<u64>,
    /// 관측된 작업 비율이 가중치 비율에서 벗어나도 되는 최대 폭
    #[serde(default = "default_max_mix_deviation")]
    pub max_mix_deviation: f64,
    /// 작업 요청이 이보다 적으면 비율은 보고만 하고 판정하지 않는다
    #[serde(default = "default_min_mix_samples")]
    pub min_mix_samples: u64,
    #[serde(default)]
    pub min_requests: u64,
}

impl Default for SloThresholds {
    fn default() -> Self {
        Self {
            max_failure_ratio: default_max_failure_ratio(),
            p95_response_ms: None,
            max_mix_deviation: default_max_mix_deviation(),
            min_mix_samples: default_min_mix_samples(),
            min_requests: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskMixEntry {
    pub task: String,
    pub expected_ratio: f64,
    pub observed_ratio: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SloReport {
    pub total_requests: u64,
    pub failure_ratio: f64,
    pub p95_response_ms: Option<u64>,
    pub task_mix: Vec<TaskMixEntry>,
    pub passed: bool,
    pub details: Vec<String>,
}

/// 실행이 끝난 뒤의 통계를 임계값과 비교한다.
pub fn evaluate_slo(
    snapshot: &StatsSnapshot,
    definition: &BehaviorDefinition,
    th: &SloThresholds,
) -> SloReport {
    let total = &snapshot.total;
    let mut passed = true;
    let mut details = Vec::new();

    if total.num_requests < th.min_requests {
        passed = false;
        details.push(format!(
            "requests {} < {}",
            total.num_requests, th.min_requests
        ));
    }

    if total.failure_ratio > th.max_failure_ratio {
        passed = false;
        details.push(format!(
            "failure ratio {:.3} > {:.3}",
            total.failure_ratio, th.max_failure_ratio
        ));
    }

    match (th.p95_response_ms, total.p95_response_ms) {
        (Some(limit), Some(v)) if v > limit => {
            passed = false;
            details.push(format!("p95 response {}ms > {}ms", v, limit));
        }
        (Some(_), None) => details.push("p95 response unavailable".into()),
        _ => {}
    }

    // 작업 비율: 가중치로 기대한 값 vs 실제 요청 수
    let weight_total = definition.total_weight();
    let task_requests: u64 = definition
        .tasks
        .iter()
        .map(|t| {
            snapshot
                .entry(t.request.method, &t.name)
                .map(|e| e.num_requests)
                .unwrap_or(0)
        })
        .sum();
    let judge_mix = task_requests > 0 && task_requests >= th.min_mix_samples;
    if task_requests > 0 && !judge_mix {
        details.push(format!(
            "task mix not judged: {} task requests < {}",
            task_requests, th.min_mix_samples
        ));
    }
    let mut task_mix = Vec::with_capacity(definition.tasks.len());
    for task in &definition.tasks {
        let expected = if weight_total > 0 {
            task.weight as f64 / weight_total as f64
        } else {
            0.0
        };
        let observed = if task_requests > 0 {
            let n = snapshot
                .entry(task.request.method, &task.name)
                .map(|e| e.num_requests)
                .unwrap_or(0);
            Some(n as f64 / task_requests as f64)
        } else {
            None
        };
        if let (true, Some(obs)) = (judge_mix, observed) {
            if (obs - expected).abs() > th.max_mix_deviation {
                passed = false;
                details.push(format!(
                    "task '{}' ratio deviates from weight: obs={:.2}, exp={:.2}",
                    task.name, obs, expected
                ));
            }
        }
        task_mix.push(TaskMixEntry {
            task: task.name.clone(),
            expected_ratio: expected,
            observed_ratio: observed,
        });
    }

    SloReport {
        total_requests: total.num_requests,
        failure_ratio: total.failure_ratio,
        p95_response_ms: total.p95_response_ms,
        task_mix,
        passed,
        details,
    }
}
