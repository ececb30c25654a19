use blake3::Hasher;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use uuid::Uuid;

const SEED_CONTEXT: &str = "load_client run seed v1";

/// 한 번의 실행을 결정하는 시드. 스폰 지터, 작업 선택, 대기 시간, 사용자 ID가 모두 여기서 나온다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RunSeed(pub u64);

impl RunSeed {
    fn digest(&self, stream: &str, index: Option<u64>) -> [u8; 32] {
        let mut h = Hasher::new_derive_key(SEED_CONTEXT);
        h.update(&self.0.to_le_bytes());
        h.update(stream.as_bytes());
        if let Some(i) = index {
            h.update(&i.to_le_bytes());
        }
        *h.finalize().as_bytes()
    }

    /// 이름 붙은 독립 난수열
    pub fn rng(&self, stream: &str) -> ChaCha20Rng {
        ChaCha20Rng::from_seed(self.digest(stream, None))
    }

    /// 가상 사용자 한 명 전용 난수열
    pub fn user_rng(&self, index: u64) -> ChaCha20Rng {
        ChaCha20Rng::from_seed(self.digest("user", Some(index)))
    }

    pub fn user_id(&self, index: u64) -> Uuid {
        let digest = self.digest("user_id", Some(index));
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }

    /// [0, max_ms] 범위의 스폰 지터
    pub fn spawn_jitter_ms(&self, index: u64, max_ms: u64) -> u64 {
        if max_ms == 0 {
            return 0;
        }
        ChaCha20Rng::from_seed(self.digest("spawn", Some(index))).gen_range(0..=max_ms)
    }
}
