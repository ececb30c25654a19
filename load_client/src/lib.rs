pub mod behavior;
pub mod client;
pub mod scenario_file;
pub mod swarm;
pub mod users;

use std::{fmt, io};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::client::RequestFailure;

// --- 로거 설정 ---
pub fn setup_logger(run_name: &str) -> WorkerGuard {
    let log_filename = format!("{}.log", run_name);
    let log_dir = load_env::env::log_directory();
    let file_appender = RollingFileAppender::new(Rotation::NEVER, &log_dir, log_filename.clone());
    let (non_blocking_file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(load_env::env::log_level()));

    let console_layer = tracing_fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .with_thread_ids(true)
        .with_target(false);

    // 파일에는 ANSI 코드 제외
    let file_layer = tracing_fmt::layer()
        .with_writer(non_blocking_file_writer)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logger initialized. Log file: {}/{}", log_dir, log_filename);
    guard
}

/// UserBehavior 훅의 반환 타입
pub type TaskResult = Result<(), TaskFailure>;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskFailure {
    /// 훅 안에서 보낸 HTTP 요청이 실패
    Request(RequestFailure),
    /// 훅 자체가 의도적으로 실패 (로그인 실패 등)
    Behavior(String),
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFailure::Request(e) => write!(f, "request failed: {}", e),
            TaskFailure::Behavior(msg) => write!(f, "behavior failed: {}", msg),
        }
    }
}

impl std::error::Error for TaskFailure {}

impl From<RequestFailure> for TaskFailure {
    fn from(e: RequestFailure) -> Self {
        TaskFailure::Request(e)
    }
}
