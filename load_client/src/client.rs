use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::behavior::HttpRequest;
use crate::swarm::stats::StatsCollector;

/// 요청 실패 분류. 재시도는 하지 않고 통계에 실패로만 기록한다.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RequestFailure {
    InvalidUrl(String),
    Connection(String),
    Timeout,
    Status(u16),
    Body(String),
    /// on_start 훅이 요청 없이 실패한 경우
    Hook(String),
}

impl RequestFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            RequestFailure::InvalidUrl(_) => "invalid_url",
            RequestFailure::Connection(_) => "connection",
            RequestFailure::Timeout => "timeout",
            RequestFailure::Status(_) => "status",
            RequestFailure::Body(_) => "body",
            RequestFailure::Hook(_) => "hook",
        }
    }

    fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            RequestFailure::Timeout
        } else {
            RequestFailure::Connection(e.to_string())
        }
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestFailure::InvalidUrl(e) => write!(f, "invalid url: {}", e),
            RequestFailure::Connection(e) => write!(f, "connection error: {}", e),
            RequestFailure::Timeout => write!(f, "request timed out"),
            RequestFailure::Status(code) => write!(f, "HTTP {}", code),
            RequestFailure::Body(e) => write!(f, "failed to read body: {}", e),
            RequestFailure::Hook(e) => write!(f, "hook failed: {}", e),
        }
    }
}

impl std::error::Error for RequestFailure {}

#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub status: Option<u16>,
    pub elapsed: Duration,
    pub content_length: usize,
    pub result: Result<(), RequestFailure>,
}

impl RequestRecord {
    fn failed(elapsed: Duration, status: Option<u16>, failure: RequestFailure) -> Self {
        Self {
            status,
            elapsed,
            content_length: 0,
            result: Err(failure),
        }
    }
}

/// base URL에 묶인 HTTP 클라이언트. 보낸 요청은 모두 통계에 기록된다.
#[derive(Clone)]
pub struct UserClient {
    http: reqwest::Client,
    base: Url,
    stats: StatsCollector,
}

impl UserClient {
    pub fn new(http: reqwest::Client, base: Url, stats: StatsCollector) -> Self {
        Self { http, base, stats }
    }

    pub fn build_http(timeout: Duration) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder().timeout(timeout).build()
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// 요청을 보내고 `name` 항목으로 통계에 기록한다.
    pub async fn send(&self, name: &str, request: &HttpRequest) -> Result<RequestRecord, RequestFailure> {
        let record = self.execute(request).await;
        self.stats.record(request.method, name, &record);
        match &record.result {
            Ok(()) => Ok(record),
            Err(e) => Err(e.clone()),
        }
    }

    /// 통계 기록 없이 요청 하나를 실행하고 소요 시간을 잰다.
    pub async fn execute(&self, request: &HttpRequest) -> RequestRecord {
        let started = Instant::now();
        let url = match request.url_for(&self.base) {
            Ok(url) => url,
            Err(e) => {
                return RequestRecord::failed(
                    started.elapsed(),
                    None,
                    RequestFailure::InvalidUrl(e.to_string()),
                )
            }
        };

        debug!("{} {}", request.method, url);
        let response = match self
            .http
            .request(request.method.to_reqwest(), url)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                return RequestRecord::failed(started.elapsed(), None, RequestFailure::from_reqwest(&e))
            }
        };

        let status = response.status();
        // 응답 시간에 본문 수신까지 포함
        let body = response.bytes().await;
        let elapsed = started.elapsed();

        let body = match body {
            Ok(b) => b,
            Err(e) => {
                let failure = if e.is_timeout() {
                    RequestFailure::Timeout
                } else {
                    RequestFailure::Body(e.to_string())
                };
                return RequestRecord::failed(elapsed, Some(status.as_u16()), failure);
            }
        };

        let result = if status.is_client_error() || status.is_server_error() {
            Err(RequestFailure::Status(status.as_u16()))
        } else {
            Ok(())
        };

        RequestRecord {
            status: Some(status.as_u16()),
            elapsed,
            content_length: body.len(),
            result,
        }
    }
}
