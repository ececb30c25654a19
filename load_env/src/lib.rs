use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 부하 테스트 도구 전체에서 공유하는 환경 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadEnvConfig {
    pub target: TargetEndpoint,
    pub logging: LoggingConfig,
    pub runner: RunnerDefaults,
}

/// 부하를 받을 대상 서버
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetEndpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

impl TargetEndpoint {
    pub fn url(&self) -> String {
        let protocol = if self.use_tls { "https" } else { "http" };
        format!("{}://{}:{}", protocol, self.host, self.port)
    }

}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
}

/// CLI나 swarm 설정 파일에서 값을 주지 않았을 때 쓰이는 기본값
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerDefaults {
    pub request_timeout_secs: u64,
    pub users: u64,
    pub spawn_rate: f64,
    pub duration_secs: u64,
}

impl Default for LoadEnvConfig {
    fn default() -> Self {
        Self {
            target: TargetEndpoint {
                host: "127.0.0.1".to_string(),
                port: 8080,
                use_tls: false,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                directory: "logs".to_string(),
            },
            runner: RunnerDefaults {
                request_timeout_secs: 30,
                users: 10,
                spawn_rate: 1.0,
                duration_secs: 60,
            },
        }
    }
}

/// 전역 설정과, 기본값으로 대체됐다면 그 이유
struct LoadedConfig {
    config: LoadEnvConfig,
    load_error: Option<String>,
}

// 로거보다 먼저 초기화될 수 있어서 여기서 로그를 남기지 않는다. report_config_status 참고
static CONFIG: Lazy<LoadedConfig> = Lazy::new(|| {
    let (config, load_error) = LoadEnvConfig::load_or_default_from(&LoadEnvConfig::get_config_dir());
    LoadedConfig { config, load_error }
});

impl LoadEnvConfig {
    /// 전역 설정 인스턴스 가져오기
    pub fn global() -> &'static LoadEnvConfig {
        &CONFIG.config
    }

    /// 기본값 → `<dir>/loadtest.toml` → 환경 변수 순서로 덮어쓴다.
    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        let config_file = dir.join("loadtest.toml");

        let settings = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::from(config_file).required(false))
            // 예: LOADTEST_TARGET__HOST=example.com
            .add_source(
                Environment::with_prefix("LOADTEST")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// 읽기에 실패하면 기본값과 실패 이유를 돌려준다.
    pub fn load_or_default_from(dir: &Path) -> (Self, Option<String>) {
        match Self::load_from(dir) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e.to_string())),
        }
    }

    pub fn get_config_dir() -> PathBuf {
        if let Ok(config_home) = std_env::var("XDG_CONFIG_HOME") {
            PathBuf::from(config_home).join("loadtest")
        } else if let Some(home_dir) = dirs::home_dir() {
            home_dir.join(".config").join("loadtest")
        } else {
            PathBuf::from("./config")
        }
    }
}

/// 환경 변수 헬퍼 함수들
pub mod env {
    use super::LoadEnvConfig;

    pub fn log_level() -> String {
        LoadEnvConfig::global().logging.level.clone()
    }

    pub fn log_directory() -> String {
        LoadEnvConfig::global().logging.directory.clone()
    }

    pub fn request_timeout_secs() -> u64 {
        LoadEnvConfig::global().runner.request_timeout_secs
    }
}

/// `.env`를 읽는다. 전역 설정은 처음 쓰일 때 만들어진다.
pub fn init() -> Result<()> {
    dotenv::dotenv().ok();
    Ok(())
}

/// 로거를 띄운 뒤 호출. 설정을 어디서 읽었는지, 기본값으로 대체됐는지 남긴다.
pub fn report_config_status() {
    let loaded = &*CONFIG;
    match &loaded.load_error {
        None => info!(
            "Load test configuration initialized from {:?}",
            LoadEnvConfig::get_config_dir().join("loadtest.toml")
        ),
        Some(e) => warn!("Failed to load config: {}. Using defaults.", e),
    }
    debug!("Configuration: {:?}", loaded.config);
}
