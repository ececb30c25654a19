use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;

use crate::behavior::HttpMethod;
use crate::client::{RequestFailure, RequestRecord};

#[derive(Clone)]
struct EntryStats {
    num_requests: u64,
    num_failures: u64,
    failures: BTreeMap<String, u64>,
    // 응답 시간(ms). 요청 수와 상관없이 메모리가 일정하다
    latency_ms: Histogram<u64>,
    content_bytes: u64,
}

impl EntryStats {
    fn new() -> Self {
        Self {
            num_requests: 0,
            num_failures: 0,
            failures: BTreeMap::new(),
            // 3 significant digits, auto-resizing
            latency_ms: Histogram::new(3).expect("Failed to create latency histogram"),
            content_bytes: 0,
        }
    }

    fn record(&mut self, record: &RequestRecord) {
        let _ = self.latency_ms.record(record.elapsed.as_millis() as u64);
        self.content_bytes += record.content_length as u64;
        match &record.result {
            Ok(()) => self.num_requests += 1,
            Err(e) => self.record_failure(e),
        }
    }

    /// 응답 시간 샘플 없이 요청/실패 수만 올린다.
    fn record_failure(&mut self, failure: &RequestFailure) {
        self.num_requests += 1;
        self.num_failures += 1;
        *self.failures.entry(failure.kind().to_string()).or_insert(0) += 1;
    }

    fn merge(&mut self, other: &EntryStats) {
        self.num_requests += other.num_requests;
        self.num_failures += other.num_failures;
        for (k, v) in &other.failures {
            *self.failures.entry(k.clone()).or_insert(0) += v;
        }
        let _ = self.latency_ms.add(&other.latency_ms);
        self.content_bytes += other.content_bytes;
    }

    fn snapshot(&self, method: &str, name: &str, elapsed_secs: f64) -> EntrySnapshot {
        let hist = &self.latency_ms;
        let sampled = hist.len() > 0;
        let quantile = |q: f64| sampled.then(|| hist.value_at_quantile(q));
        EntrySnapshot {
            method: method.to_string(),
            name: name.to_string(),
            num_requests: self.num_requests,
            num_failures: self.num_failures,
            failure_ratio: if self.num_requests == 0 {
                0.0
            } else {
                self.num_failures as f64 / self.num_requests as f64
            },
            failures: self.failures.clone(),
            min_response_ms: sampled.then(|| hist.min()),
            max_response_ms: sampled.then(|| hist.max()),
            avg_response_ms: sampled.then(|| hist.mean()),
            p50_response_ms: quantile(0.50),
            p95_response_ms: quantile(0.95),
            p99_response_ms: quantile(0.99),
            requests_per_sec: if elapsed_secs > 0.0 {
                self.num_requests as f64 / elapsed_secs
            } else {
                0.0
            },
            content_bytes: self.content_bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntrySnapshot {
    pub method: String,
    pub name: String,
    pub num_requests: u64,
    pub num_failures: u64,
    pub failure_ratio: f64,
    pub failures: BTreeMap<String, u64>,
    pub min_response_ms: Option<u64>,
    pub max_response_ms: Option<u64>,
    pub avg_response_ms: Option<f64>,
    pub p50_response_ms: Option<u64>,
    pub p95_response_ms: Option<u64>,
    pub p99_response_ms: Option<u64>,
    pub requests_per_sec: f64,
    pub content_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub elapsed_secs: f64,
    pub entries: Vec<EntrySnapshot>,
    pub total: EntrySnapshot,
}

impl StatsSnapshot {
    pub fn entry(&self, method: HttpMethod, name: &str) -> Option<&EntrySnapshot> {
        self.entries
            .iter()
            .find(|e| e.method == method.as_str() && e.name == name)
    }
}

struct Inner {
    started: Instant,
    entries: BTreeMap<(HttpMethod, String), EntryStats>,
}

/// 모든 가상 사용자가 공유하는 요청 통계. (method, 작업 이름) 단위로 집계한다.
#[derive(Clone)]
pub struct StatsCollector {
    inner: Arc<Mutex<Inner>>,
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                started: Instant::now(),
                entries: BTreeMap::new(),
            })),
        }
    }

    pub fn record(&self, method: HttpMethod, name: &str, record: &RequestRecord) {
        let mut inner = self.inner.lock();
        inner
            .entries
            .entry((method, name.to_string()))
            .or_insert_with(EntryStats::new)
            .record(record);
    }

    /// 실제 요청 없이 끝난 실패(훅 오류 등). 응답 시간 통계에는 들어가지 않는다.
    pub fn record_failure(&self, method: HttpMethod, name: &str, failure: &RequestFailure) {
        let mut inner = self.inner.lock();
        inner
            .entries
            .entry((method, name.to_string()))
            .or_insert_with(EntryStats::new)
            .record_failure(failure);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock();
        let elapsed_secs = inner.started.elapsed().as_secs_f64();

        let mut total = EntryStats::new();
        let entries = inner
            .entries
            .iter()
            .map(|((method, name), stats)| {
                total.merge(stats);
                stats.snapshot(method.as_str(), name, elapsed_secs)
            })
            .collect();

        StatsSnapshot {
            elapsed_secs,
            entries,
            total: total.snapshot("", "Aggregated", elapsed_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ok(ms: u64) -> RequestRecord {
        RequestRecord {
            status: Some(200),
            elapsed: Duration::from_millis(ms),
            content_length: 10,
            result: Ok(()),
        }
    }

    fn failed(ms: u64, failure: RequestFailure) -> RequestRecord {
        RequestRecord {
            status: None,
            elapsed: Duration::from_millis(ms),
            content_length: 0,
            result: Err(failure),
        }
    }

    #[test]
    fn percentiles_from_many_samples() {
        let stats = StatsCollector::new();
        for _ in 0..1000 {
            for ms in 1..=100 {
                stats.record(HttpMethod::Get, "home", &ok(ms));
            }
        }
        let snap = stats.snapshot();
        let home = snap.entry(HttpMethod::Get, "home").unwrap();
        assert_eq!(home.num_requests, 100_000);
        assert_eq!(home.min_response_ms, Some(1));
        assert_eq!(home.max_response_ms, Some(100));
        assert_eq!(home.p50_response_ms, Some(50));
        assert_eq!(home.p95_response_ms, Some(95));
        assert_eq!(home.p99_response_ms, Some(99));
        assert!((home.avg_response_ms.unwrap() - 50.5).abs() < 0.01);
    }

    #[test]
    fn failure_without_request_has_no_latency_sample() {
        let stats = StatsCollector::new();
        stats.record_failure(
            HttpMethod::Get,
            "on_start",
            &RequestFailure::Hook("login rejected".into()),
        );
        stats.record(HttpMethod::Get, "home", &ok(40));

        let snap = stats.snapshot();
        let hook = snap.entry(HttpMethod::Get, "on_start").unwrap();
        assert_eq!(hook.num_requests, 1);
        assert_eq!(hook.num_failures, 1);
        assert_eq!(hook.failures.get("hook"), Some(&1));
        assert_eq!(hook.min_response_ms, None);
        assert_eq!(hook.p95_response_ms, None);

        // 합계의 최소 응답 시간이 0으로 끌려가지 않는다
        assert_eq!(snap.total.num_requests, 2);
        assert_eq!(snap.total.min_response_ms, Some(40));
        assert_eq!(snap.total.p50_response_ms, Some(40));
    }

    #[test]
    fn entries_and_total_are_aggregated() {
        let stats = StatsCollector::new();
        stats.record(HttpMethod::Get, "home", &ok(10));
        stats.record(HttpMethod::Get, "home", &ok(30));
        stats.record(HttpMethod::Get, "search", &failed(5, RequestFailure::Status(500)));
        stats.record(HttpMethod::Get, "search", &failed(1, RequestFailure::Timeout));

        let snap = stats.snapshot();
        assert_eq!(snap.entries.len(), 2);

        let home = snap.entry(HttpMethod::Get, "home").unwrap();
        assert_eq!(home.num_requests, 2);
        assert_eq!(home.num_failures, 0);
        assert_eq!(home.min_response_ms, Some(10));
        assert_eq!(home.max_response_ms, Some(30));
        assert_eq!(home.avg_response_ms, Some(20.0));
        assert_eq!(home.content_bytes, 20);

        let search = snap.entry(HttpMethod::Get, "search").unwrap();
        assert_eq!(search.failure_ratio, 1.0);
        assert_eq!(search.failures.get("status"), Some(&1));
        assert_eq!(search.failures.get("timeout"), Some(&1));

        assert_eq!(snap.total.num_requests, 4);
        assert_eq!(snap.total.num_failures, 2);
        assert_eq!(snap.total.failure_ratio, 0.5);
        assert_eq!(snap.total.max_response_ms, Some(30));
    }
}
