use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::client::UserClient;
use crate::TaskResult;

/// 대기 시간 상한 (하루)
pub const MAX_WAIT_SECS: f64 = 86_400.0;

/// 가상 사용자가 요청 사이에 쉬는 시간 범위 (초)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaitTime {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl WaitTime {
    pub fn between(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    pub fn constant(secs: f64) -> Self {
        Self::between(secs, secs)
    }

    pub fn validate(&self) -> Result<(), BehaviorError> {
        let ok = self.min_secs.is_finite()
            && self.max_secs.is_finite()
            && self.min_secs >= 0.0
            && self.min_secs <= self.max_secs
            && self.max_secs <= MAX_WAIT_SECS;
        if ok {
            Ok(())
        } else {
            Err(BehaviorError::InvalidWaitTime {
                min: self.min_secs,
                max: self.max_secs,
            })
        }
    }

    /// [min, max] 구간에서 균등하게 하나를 뽑는다.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let secs = if (self.min_secs - self.max_secs).abs() < f64::EPSILON {
            self.min_secs
        } else {
            rng.gen_range(self.min_secs..=self.max_secs)
        };
        Duration::from_secs_f64(secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// base URL 기준의 상대 요청 하나
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub query: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// base의 path 뒤에 요청 path를 그대로 이어 붙인다. ("http://h/api" + "/x" → "http://h/api/x")
    pub fn url_for(&self, base: &Url) -> Result<Url, url::ParseError> {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        let mut url = Url::parse(&format!(
            "{}{}",
            base.as_str().trim_end_matches('/'),
            path
        ))?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &self.query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedTask {
    pub name: String,
    pub weight: u32,
    pub request: HttpRequest,
}

impl WeightedTask {
    pub fn new(name: impl Into<String>, weight: u32, request: HttpRequest) -> Self {
        Self {
            name: name.into(),
            weight,
            request,
        }
    }
}

/// 대기 시간 범위 + 가중치가 붙은 작업 목록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorDefinition {
    pub name: String,
    pub wait_time: WaitTime,
    pub tasks: Vec<WeightedTask>,
}

impl BehaviorDefinition {
    pub fn validate(&self) -> Result<(), BehaviorError> {
        if self.tasks.is_empty() {
            return Err(BehaviorError::EmptyTaskSet);
        }
        self.wait_time.validate()?;
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if task.weight == 0 {
                return Err(BehaviorError::ZeroWeight {
                    task: task.name.clone(),
                });
            }
            if !seen.insert(task.name.as_str()) {
                return Err(BehaviorError::DuplicateTask {
                    task: task.name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn total_weight(&self) -> u64 {
        self.tasks.iter().map(|t| t.weight as u64).sum()
    }

    pub fn task(&self, name: &str) -> Option<&WeightedTask> {
        self.tasks.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BehaviorError {
    EmptyTaskSet,
    ZeroWeight { task: String },
    InvalidWaitTime { min: f64, max: f64 },
    DuplicateTask { task: String },
}

impl fmt::Display for BehaviorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BehaviorError::EmptyTaskSet => write!(f, "behavior has no tasks"),
            BehaviorError::ZeroWeight { task } => write!(f, "task '{}' has weight 0", task),
            BehaviorError::InvalidWaitTime { min, max } => {
                write!(f, "invalid wait time range [{}, {}]", min, max)
            }
            BehaviorError::DuplicateTask { task } => write!(f, "duplicate task name '{}'", task),
        }
    }
}

impl std::error::Error for BehaviorError {}

/// 훅에 넘겨주는 사용자 정보
pub struct UserContext {
    pub user_id: Uuid,
    pub index: u64,
    pub client: UserClient,
}

/// 가상 사용자 한 명의 행동 정의.
/// 작업 선택/대기/실행 루프는 swarm 쪽에서 돌리고, 여기서는 정의와 훅만 제공한다.
#[async_trait]
pub trait UserBehavior: Send + Sync {
    fn definition(&self) -> &BehaviorDefinition;

    // 사용자당 한 번, 루프 시작 전에 호출. 기본은 no-op
    async fn on_start(&self, _user: &UserContext) -> TaskResult {
        Ok(())
    }

    fn clone_trait(&self) -> Box<dyn UserBehavior>;
}
