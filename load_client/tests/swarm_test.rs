use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use actix_web::{dev::ServerHandle, web, App, HttpResponse, HttpServer};
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use load_client::behavior::{
    BehaviorDefinition, HttpMethod, HttpRequest, UserBehavior, UserContext, WaitTime, WeightedTask,
};
use load_client::scenario_file::FileUser;
use load_client::swarm::config::SwarmConfig;
use load_client::swarm::run_swarm;
use load_client::users::SimpleWebUser;
use load_client::{TaskFailure, TaskResult};

fn setup_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,load_client=debug")
        .try_init();
}

#[derive(Default)]
struct Hits {
    home: AtomicU64,
    search: AtomicU64,
    bad_query: AtomicU64,
    other: AtomicU64,
}

impl Hits {
    fn total(&self) -> u64 {
        self.home.load(Ordering::SeqCst)
            + self.search.load(Ordering::SeqCst)
            + self.bad_query.load(Ordering::SeqCst)
            + self.other.load(Ordering::SeqCst)
    }
}

async fn home(hits: web::Data<Hits>, req: actix_web::HttpRequest) -> HttpResponse {
    if req.query_string().is_empty() {
        hits.home.fetch_add(1, Ordering::SeqCst);
    } else {
        hits.bad_query.fetch_add(1, Ordering::SeqCst);
    }
    HttpResponse::Ok().body("home")
}

async fn arama(hits: web::Data<Hits>, query: web::Query<HashMap<String, String>>) -> HttpResponse {
    if query.len() == 1 && query.get("q").map(String::as_str) == Some("selam") {
        hits.search.fetch_add(1, Ordering::SeqCst);
    } else {
        hits.bad_query.fetch_add(1, Ordering::SeqCst);
    }
    HttpResponse::Ok().body("sonuc")
}

async fn not_found(hits: web::Data<Hits>) -> HttpResponse {
    hits.other.fetch_add(1, Ordering::SeqCst);
    HttpResponse::NotFound().finish()
}

/// 127.0.0.1 임의 포트에 대상 서버를 띄운다.
fn start_target(hits: web::Data<Hits>) -> std::io::Result<(String, ServerHandle)> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(hits.clone())
            .route("/", web::get().to(home))
            .route("/arama", web::get().to(arama))
            .default_service(web::to(not_found))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))?;
    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);
    Ok((format!("http://{}", addr), handle))
}

fn swarm_config(host: &str, users: u64, spawn_rate: f64, duration_secs: u64) -> SwarmConfig {
    SwarmConfig::from_toml_str(&format!(
        r#"
        host = "{}"
        users = {}
        spawn_rate = {}
        duration_secs = {}
        seed = 1234
        request_timeout_secs = 5
        "#,
        host, users, spawn_rate, duration_secs
    ))
    .unwrap()
}

#[actix_web::test]
async fn test_simple_web_user_hits_home_and_search() -> Result<()> {
    setup_logger();
    let hits = web::Data::new(Hits::default());
    let (host, handle) = start_target(hits.clone())?;

    let cfg = swarm_config(&host, 4, 100.0, 2);
    let behavior = SimpleWebUser::new().with_wait_time(WaitTime::constant(0.01));
    let summary = run_swarm(cfg, Box::new(behavior)).await?;
    handle.stop(true).await;

    let home = hits.home.load(Ordering::SeqCst);
    let search = hits.search.load(Ordering::SeqCst);
    info!("home={}, search={}", home, search);

    assert!(home > 0 && search > 0);
    assert_eq!(hits.bad_query.load(Ordering::SeqCst), 0, "GET / must carry no query, /arama only q=selam");
    assert_eq!(hits.other.load(Ordering::SeqCst), 0);

    assert_eq!(summary.users_spawned, 4);
    assert_eq!(summary.stats.total.num_requests, hits.total());
    assert_eq!(summary.stats.total.num_failures, 0);
    assert!(summary.stats.entry(HttpMethod::Get, "on_start").is_none());

    let home_ratio = home as f64 / (home + search) as f64;
    assert!((home_ratio - 0.75).abs() < 0.15, "home ratio={}", home_ratio);
    assert!(summary.slo.passed, "{:?}", summary.slo.details);
    Ok(())
}

/// on_start 호출 횟수를 세는 사용자
#[derive(Clone)]
struct CountingUser {
    inner: SimpleWebUser,
    starts: Arc<AtomicU64>,
}

#[async_trait]
impl UserBehavior for CountingUser {
    fn definition(&self) -> &BehaviorDefinition {
        self.inner.definition()
    }

    async fn on_start(&self, user: &UserContext) -> TaskResult {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.inner.on_start(user).await
    }

    fn clone_trait(&self) -> Box<dyn UserBehavior> {
        Box::new(self.clone())
    }
}

#[actix_web::test]
async fn test_setup_hook_runs_once_per_user_without_requests() -> Result<()> {
    setup_logger();
    let hits = web::Data::new(Hits::default());
    let (host, handle) = start_target(hits.clone())?;

    let starts = Arc::new(AtomicU64::new(0));
    let behavior = CountingUser {
        inner: SimpleWebUser::new().with_wait_time(WaitTime::constant(0.05)),
        starts: starts.clone(),
    };
    let summary = run_swarm(swarm_config(&host, 5, 50.0, 1), Box::new(behavior)).await?;
    handle.stop(true).await;

    assert_eq!(starts.load(Ordering::SeqCst), 5);
    assert_eq!(summary.users_spawned, 5);
    // 서버가 받은 요청은 모두 작업 요청이다
    assert_eq!(summary.stats.total.num_requests, hits.total());
    assert_eq!(hits.other.load(Ordering::SeqCst), 0);
    Ok(())
}

/// on_start에서 POST /login을 보내는 사용자. 대상 서버에 /login이 없어서 404로 실패한다
#[derive(Clone)]
struct LoginUser {
    inner: SimpleWebUser,
}

#[async_trait]
impl UserBehavior for LoginUser {
    fn definition(&self) -> &BehaviorDefinition {
        self.inner.definition()
    }

    async fn on_start(&self, user: &UserContext) -> TaskResult {
        user.client
            .send("login", &HttpRequest::new(HttpMethod::Post, "/login"))
            .await?;
        Ok(())
    }

    fn clone_trait(&self) -> Box<dyn UserBehavior> {
        Box::new(self.clone())
    }
}

#[actix_web::test]
async fn test_failed_setup_request_is_counted_once() -> Result<()> {
    setup_logger();
    let hits = web::Data::new(Hits::default());
    let (host, handle) = start_target(hits.clone())?;

    let behavior = LoginUser {
        inner: SimpleWebUser::new().with_wait_time(WaitTime::constant(0.05)),
    };
    let summary = run_swarm(swarm_config(&host, 3, 30.0, 1), Box::new(behavior)).await?;
    handle.stop(true).await;

    let login = summary.stats.entry(HttpMethod::Post, "login").unwrap();
    assert_eq!(login.num_requests, 3);
    assert_eq!(login.num_failures, 3);
    assert_eq!(login.failures.get("status"), Some(&3));
    assert!(summary.stats.entry(HttpMethod::Get, "on_start").is_none());

    // 실패한 사용자는 작업을 돌리지 않는다
    assert_eq!(hits.home.load(Ordering::SeqCst), 0);
    assert_eq!(hits.search.load(Ordering::SeqCst), 0);
    assert_eq!(summary.stats.total.num_requests, hits.total());
    assert_eq!(summary.stats.total.num_failures, 3);
    Ok(())
}

/// 요청 없이 on_start를 거부하는 사용자
#[derive(Clone)]
struct RejectingUser {
    inner: SimpleWebUser,
}

#[async_trait]
impl UserBehavior for RejectingUser {
    fn definition(&self) -> &BehaviorDefinition {
        self.inner.definition()
    }

    async fn on_start(&self, _user: &UserContext) -> TaskResult {
        Err(TaskFailure::Behavior("no credentials".into()))
    }

    fn clone_trait(&self) -> Box<dyn UserBehavior> {
        Box::new(self.clone())
    }
}

#[actix_web::test]
async fn test_setup_hook_failure_has_no_latency_sample() -> Result<()> {
    setup_logger();
    let hits = web::Data::new(Hits::default());
    let (host, handle) = start_target(hits.clone())?;

    let behavior = RejectingUser {
        inner: SimpleWebUser::new(),
    };
    let summary = run_swarm(swarm_config(&host, 2, 20.0, 1), Box::new(behavior)).await?;
    handle.stop(true).await;

    let hook = summary.stats.entry(HttpMethod::Get, "on_start").unwrap();
    assert_eq!(hook.num_requests, 2);
    assert_eq!(hook.num_failures, 2);
    assert_eq!(hook.failures.get("hook"), Some(&2));
    assert_eq!(hook.min_response_ms, None);
    assert_eq!(summary.stats.total.min_response_ms, None);
    assert_eq!(hits.total(), 0);
    Ok(())
}

#[tokio::test]
async fn test_oversized_run_window_is_rejected() {
    let mut cfg = swarm_config("http://127.0.0.1:1", 1, 1.0, 1);
    cfg.duration_secs = u64::MAX;
    let err = run_swarm(cfg, Box::new(SimpleWebUser::new())).await.unwrap_err();
    assert!(err.to_string().contains("duration_secs"), "{}", err);

    let cfg = swarm_config("http://127.0.0.1:1", 1, 1.0, 1);
    let behavior = SimpleWebUser::new().with_wait_time(WaitTime::between(0.0, 1e20));
    assert!(run_swarm(cfg, Box::new(behavior)).await.is_err());
}

#[actix_web::test]
async fn test_failed_requests_are_recorded_not_retried() -> Result<()> {
    setup_logger();
    let hits = web::Data::new(Hits::default());
    let (host, handle) = start_target(hits.clone())?;

    let definition = BehaviorDefinition {
        name: "Broken".into(),
        wait_time: WaitTime::constant(0.05),
        tasks: vec![WeightedTask::new("missing", 1, HttpRequest::get("/missing"))],
    };
    let summary = run_swarm(swarm_config(&host, 2, 10.0, 1), Box::new(FileUser::new(definition))).await?;
    handle.stop(true).await;

    let missing = summary.stats.entry(HttpMethod::Get, "missing").unwrap();
    assert!(missing.num_requests > 0);
    assert_eq!(missing.num_failures, missing.num_requests);
    assert_eq!(missing.failures.get("status"), Some(&missing.num_requests));
    assert_eq!(hits.other.load(Ordering::SeqCst), missing.num_requests);
    assert!(!summary.slo.passed);
    Ok(())
}

#[actix_web::test]
async fn test_users_scheduled_past_the_window_are_skipped() -> Result<()> {
    setup_logger();
    let hits = web::Data::new(Hits::default());
    let (host, handle) = start_target(hits.clone())?;

    // offsets 0, 1000, 2000, ... ms 중 2초 창 안에 드는 건 두 명
    let behavior = SimpleWebUser::new().with_wait_time(WaitTime::constant(0.2));
    let summary = run_swarm(swarm_config(&host, 10, 1.0, 2), Box::new(behavior)).await?;
    handle.stop(true).await;

    assert_eq!(summary.users_spawned, 2);
    assert_eq!(summary.spawn_per_second, vec![1, 1]);
    Ok(())
}

#[actix_web::test]
async fn test_run_summary_is_written_as_json() -> Result<()> {
    setup_logger();
    let hits = web::Data::new(Hits::default());
    let (host, handle) = start_target(hits.clone())?;

    let out = std::env::temp_dir().join(format!("load_client_{}/summary.json", uuid::Uuid::new_v4()));
    let mut cfg = swarm_config(&host, 1, 10.0, 1);
    cfg.result_path = Some(out.to_string_lossy().into_owned());

    let behavior = SimpleWebUser::new().with_wait_time(WaitTime::constant(0.1));
    run_swarm(cfg, Box::new(behavior)).await?;
    handle.stop(true).await;

    let json: serde_json::Value = serde_json::from_slice(&std::fs::read(&out)?)?;
    assert_eq!(json["behavior"], "SimpleWebUser");
    assert_eq!(json["seed"], 1234);
    assert!(json["stats"]["total"]["num_requests"].as_u64().unwrap() > 0);
    assert!(json["slo"]["passed"].is_boolean());
    std::fs::remove_dir_all(out.parent().unwrap()).ok();
    Ok(())
}

#[test]
fn test_bundled_swarm_config_parses() -> Result<()> {
    let cfg = SwarmConfig::from_toml_str(include_str!("../configs/swarm_simple_web.toml"))?;
    assert_eq!(cfg.users, 50);
    assert_eq!(cfg.thresholds.p95_response_ms, Some(1000));
    Ok(())
}
