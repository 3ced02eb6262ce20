//! End-to-end runs against an in-process HTTP server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;

use stampede_swarm::{
    Action, AnomalyPolicy, BatchSpec, Cohort, PaceRange, Profile, RequestError, Swarm,
    SwarmConfig, Target,
};

#[derive(Default)]
struct ServerState {
    singles: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
    reads: AtomicUsize,
    rejected: AtomicUsize,
}

fn valid_sample(value: &Value) -> bool {
    value.get("timestamp").is_some_and(Value::is_string)
        && value.get("cpu").is_some_and(Value::is_number)
        && value.get("rps").is_some_and(Value::is_u64)
}

async fn ingest(State(state): State<Arc<ServerState>>, Json(body): Json<Value>) -> StatusCode {
    if valid_sample(&body) {
        state.singles.fetch_add(1, Ordering::Relaxed);
        StatusCode::ACCEPTED
    } else {
        state.rejected.fetch_add(1, Ordering::Relaxed);
        StatusCode::BAD_REQUEST
    }
}

async fn ingest_batch(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<Value>,
) -> StatusCode {
    match body.as_array() {
        Some(items) if !items.is_empty() && items.iter().all(valid_sample) => {
            state.batch_sizes.lock().unwrap().push(items.len());
            StatusCode::ACCEPTED
        }
        _ => {
            state.rejected.fetch_add(1, Ordering::Relaxed);
            StatusCode::BAD_REQUEST
        }
    }
}

async fn read(State(state): State<Arc<ServerState>>) -> StatusCode {
    state.reads.fetch_add(1, Ordering::Relaxed);
    StatusCode::OK
}

async fn spawn_server() -> (Arc<ServerState>, SocketAddr) {
    let state = Arc::new(ServerState::default());
    let app = Router::new()
        .route("/ingest", post(ingest))
        .route("/ingest/batch", post(ingest_batch))
        .route("/analyze", get(read))
        .route("/stats", get(read))
        .route("/health", get(read))
        .with_state(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    (state, addr)
}

struct HttpTarget {
    client: reqwest::Client,
    base: String,
    failures: AtomicUsize,
}

impl HttpTarget {
    fn new(addr: SocketAddr) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("client"),
            base: format!("http://{addr}"),
            failures: AtomicUsize::new(0),
        }
    }

    fn check(&self, response: Result<reqwest::Response, reqwest::Error>) -> Result<(), RequestError> {
        let result = match response {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => Err(RequestError::Status(resp.status().as_u16())),
            Err(err) => Err(RequestError::Transport(err.to_string())),
        };
        if result.is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }
}

#[async_trait]
impl Target for HttpTarget {
    async fn post_json(&self, path: &str, body: String) -> Result<(), RequestError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await;
        self.check(response)
    }

    async fn get(&self, path: &str) -> Result<(), RequestError> {
        let response = self.client.get(format!("{}{path}", self.base)).send().await;
        self.check(response)
    }
}

fn pace(min_ms: u64, max_ms: u64) -> PaceRange {
    PaceRange::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms)).unwrap()
}

fn mixed_cohorts() -> Vec<Cohort> {
    let interactive = Profile::new(
        "interactive",
        vec![
            Action::write_single(
                "post_metrics",
                "/ingest",
                3,
                AnomalyPolicy::nominal((20.0, 95.0), (500, 2000)),
            ),
            Action::write_single("post_metrics_with_anomaly", "/ingest", 1, AnomalyPolicy::default()),
            Action::read("get_analyze", "/analyze", 1),
            Action::read("get_stats", "/stats", 1),
            Action::read("get_health", "/health", 2),
        ],
        pace(5, 15),
    )
    .unwrap();

    let batch = Profile::new(
        "batch",
        vec![Action::write_batch(
            "post_batch",
            "/ingest/batch",
            1,
            AnomalyPolicy::nominal((20.0, 95.0), (500, 2000)),
            BatchSpec::default(),
        )],
        pace(20, 40),
    )
    .unwrap();

    vec![
        Cohort {
            profile: interactive,
            users: 4,
        },
        Cohort {
            profile: batch,
            users: 2,
        },
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn swarm_drives_live_http_traffic() {
    let (state, addr) = spawn_server().await;
    let target = Arc::new(HttpTarget::new(addr));

    let swarm = Swarm::start(
        SwarmConfig {
            cohorts: mixed_cohorts(),
            ramp_rate: 1000.0,
            run_duration: Some(Duration::from_millis(400)),
            grace: Duration::from_secs(1),
            seed: 99,
        },
        target.clone(),
    )
    .unwrap();
    swarm.wait().await;

    assert_eq!(target.failures.load(Ordering::Relaxed), 0);
    assert_eq!(state.rejected.load(Ordering::Relaxed), 0);
    assert!(state.singles.load(Ordering::Relaxed) > 0, "no single writes");
    assert!(state.reads.load(Ordering::Relaxed) > 0, "no reads");

    let sizes = state.batch_sizes.lock().unwrap().clone();
    assert!(!sizes.is_empty(), "no batch writes");
    assert!(
        sizes.iter().all(|&n| (10..=50).contains(&n)),
        "batch sizes out of bounds: {sizes:?}"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_drains_a_live_run_promptly() {
    let (state, addr) = spawn_server().await;
    let target = Arc::new(HttpTarget::new(addr));

    let swarm = Swarm::start(
        SwarmConfig {
            cohorts: mixed_cohorts(),
            ramp_rate: 1000.0,
            run_duration: None,
            grace: Duration::from_secs(1),
            seed: 100,
        },
        target.clone(),
    )
    .unwrap();
    let handle = swarm.handle();

    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.stop();
    tokio::time::timeout(Duration::from_secs(3), swarm.wait())
        .await
        .expect("swarm failed to drain after stop");

    assert_eq!(handle.active_users(), 0);
    assert_eq!(target.failures.load(Ordering::Relaxed), 0);
    assert!(
        state.singles.load(Ordering::Relaxed) + state.reads.load(Ordering::Relaxed) > 0,
        "no traffic before stop"
    );
}
