use rand::Rng;

use crate::behavior::WeightedTask;

/// 누적 가중치 구간으로 작업을 고른다.
/// weight 3, 1 이면 구간은 [0,3), [3,4) 이고 r ∈ [0,4) 를 뽑는다.
#[derive(Debug, Clone)]
pub struct TaskPicker {
    cumulative: Vec<u64>,
}

impl TaskPicker {
    /// 모든 weight가 0이면 None
    pub fn new(tasks: &[WeightedTask]) -> Option<Self> {
        let mut acc = 0u64;
        let cumulative: Vec<u64> = tasks
            .iter()
            .map(|t| {
                acc += t.weight as u64;
                acc
            })
            .collect();
        if acc == 0 {
            return None;
        }
        Some(Self { cumulative })
    }

    pub fn total(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let r = rng.gen_range(0..self.total());
        // weight 0 작업은 구간 길이가 0이라 선택되지 않는다
        self.cumulative.partition_point(|&c| c <= r)
    }
}
