use std::time::Duration;

use anyhow::{ensure, Result};

use crate::swarm::seed::RunSeed;

/// 사용자별 시작 시각(실행 시작 기준 ms)
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnSchedule {
    offsets_ms: Vec<u64>,
}

impl SpawnSchedule {
    /// 초당 `spawn_rate` 명씩 일정하게 띄운다.
    /// 사용자 i의 시작 시각은 `floor(1000 * i / spawn_rate) + jitter(i)`, jitter ∈ [0, jitter_ms].
    pub fn constant_rate(seed: RunSeed, users: u64, spawn_rate: f64, jitter_ms: u64) -> Result<Self> {
        ensure!(
            spawn_rate.is_finite() && spawn_rate > 0.0,
            "spawn_rate must be > 0"
        );
        let offsets_ms = (0..users)
            .map(|i| {
                let base_ms = ((i as f64) * 1000.0 / spawn_rate).floor() as u64;
                base_ms.saturating_add(seed.spawn_jitter_ms(i, jitter_ms))
            })
            .collect();
        Ok(Self { offsets_ms })
    }

    pub fn offsets_ms(&self) -> &[u64] {
        &self.offsets_ms
    }

    /// 실행 창 안에서 시작하는 (index, offset) 목록. 창 끝과 같거나 늦으면 제외
    pub fn within(&self, window: Duration) -> impl Iterator<Item = (u64, Duration)> + '_ {
        self.offsets_ms
            .iter()
            .enumerate()
            .map(|(i, ms)| (i as u64, Duration::from_millis(*ms)))
            .filter(move |(_, offset)| *offset < window)
    }

    /// 초 단위 스폰 수. 길이는 실행 시간과 마지막 스폰 초 중 작은 쪽
    pub fn per_second(&self, duration_secs: u64) -> Vec<u64> {
        let last_sec = match self.offsets_ms.iter().max() {
            Some(ms) => ms / 1000,
            None => return Vec::new(),
        };
        let len = duration_secs.min(last_sec + 1) as usize;
        let mut buckets = vec![0u64; len];
        for ms in &self.offsets_ms {
            if let Some(b) = buckets.get_mut((ms / 1000) as usize) {
                *b += 1;
            }
        }
        buckets
    }
}
