mod analytics;

use analytics::MetricWindow;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const WINDOW_SIZE: usize = 50;
const ZSCORE_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, Deserialize)]
struct MetricInput {
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    cpu: f64,
    #[serde(default)]
    rps: f64,
}

impl MetricInput {
    fn validate(&self) -> Result<(), &'static str> {
        if self.timestamp.is_empty() {
            return Err("timestamp is required");
        }
        if DateTime::parse_from_rfc3339(&self.timestamp).is_err() {
            return Err("invalid timestamp format, use RFC3339");
        }
        if !(0.0..=100.0).contains(&self.cpu) {
            return Err("cpu must be between 0 and 100");
        }
        if self.rps < 0.0 {
            return Err("rps must be non-negative");
        }
        Ok(())
    }
}

struct Analytics {
    cpu: MetricWindow,
    rps: MetricWindow,
    latest_cpu: f64,
    latest_rps: f64,
    total: u64,
    cpu_anomalies: u64,
    rps_anomalies: u64,
}

struct AppState {
    inner: Mutex<Analytics>,
}

impl AppState {
    fn new() -> Self {
        Self {
            inner: Mutex::new(Analytics {
                cpu: MetricWindow::new(WINDOW_SIZE, ZSCORE_THRESHOLD),
                rps: MetricWindow::new(WINDOW_SIZE, ZSCORE_THRESHOLD),
                latest_cpu: 0.0,
                latest_rps: 0.0,
                total: 0,
                cpu_anomalies: 0,
                rps_anomalies: 0,
            }),
        }
    }

    fn ingest(&self, input: &MetricInput) {
        let mut a = self.inner.lock();
        a.total += 1;
        a.latest_cpu = input.cpu;
        a.latest_rps = input.rps;

        let (cpu_anomaly, cpu_zscore) = a.cpu.observe(input.cpu);
        if cpu_anomaly {
            a.cpu_anomalies += 1;
            tracing::warn!(
                metric = "cpu",
                value = input.cpu,
                zscore = format!("{:.2}", cpu_zscore),
                "anomaly detected"
            );
        }

        let (rps_anomaly, rps_zscore) = a.rps.observe(input.rps);
        if rps_anomaly {
            a.rps_anomalies += 1;
            tracing::warn!(
                metric = "rps",
                value = input.rps,
                zscore = format!("{:.2}", rps_zscore),
                "anomaly detected"
            );
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Simulate ingestion work (1-5ms).
async fn simulated_delay() {
    let delay = rand::thread_rng().gen_range(1..=5);
    tokio::time::sleep(Duration::from_millis(delay)).await;
}

async fn ingest(State(state): State<Arc<AppState>>, Json(input): Json<MetricInput>) -> Response {
    simulated_delay().await;

    if let Err(msg) = input.validate() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response();
    }
    state.ingest(&input);

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "accepted",
            "timestamp": input.timestamp,
            "processed": now_rfc3339(),
        })),
    )
        .into_response()
}

async fn ingest_batch(
    State(state): State<Arc<AppState>>,
    Json(inputs): Json<Vec<MetricInput>>,
) -> Json<Value> {
    simulated_delay().await;

    let mut processed = 0;
    let mut failed = 0;
    for input in &inputs {
        if input.validate().is_ok() {
            state.ingest(input);
            processed += 1;
        } else {
            failed += 1;
        }
    }

    Json(json!({
        "status": "completed",
        "processed": processed,
        "failed": failed,
        "total": inputs.len(),
    }))
}

async fn analyze(State(state): State<Arc<AppState>>) -> Json<Value> {
    let a = state.inner.lock();
    let (cpu_anomaly, cpu_zscore) = a.cpu.score(a.latest_cpu);
    let (rps_anomaly, rps_zscore) = a.rps.score(a.latest_rps);

    Json(json!({
        "current_cpu": a.latest_cpu,
        "current_rps": a.latest_rps,
        "avg_cpu": a.cpu.mean(),
        "avg_rps": a.rps.mean(),
        "predicted_cpu": a.cpu.mean(),
        "predicted_rps": a.rps.mean(),
        "cpu_zscore": cpu_zscore,
        "rps_zscore": rps_zscore,
        "cpu_anomaly": cpu_anomaly,
        "rps_anomaly": rps_anomaly,
        "total_metrics": a.total,
        "window_size": WINDOW_SIZE,
        "last_updated": now_rfc3339(),
    }))
}

async fn anomalies(State(state): State<Arc<AppState>>) -> Json<Value> {
    let a = state.inner.lock();
    Json(json!({
        "cpu_anomalies": a.cpu_anomalies,
        "rps_anomalies": a.rps_anomalies,
        "total": a.cpu_anomalies + a.rps_anomalies,
        "threshold": ZSCORE_THRESHOLD,
        "window_size": WINDOW_SIZE,
    }))
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<Value> {
    let a = state.inner.lock();
    Json(json!({
        "total_metrics": a.total,
        "window_size": WINDOW_SIZE,
        "zscore_threshold": ZSCORE_THRESHOLD,
        "current": { "cpu": a.latest_cpu, "rps": a.latest_rps },
        "averages": { "cpu": a.cpu.mean(), "rps": a.rps.mean() },
        "predictions": { "cpu": a.cpu.mean(), "rps": a.rps.mean() },
        "anomalies": {
            "cpu": a.cpu_anomalies,
            "rps": a.rps_anomalies,
            "total": a.cpu_anomalies + a.rps_anomalies,
        },
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "service": "demo-target",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let state = Arc::new(AppState::new());

    let app = Router::new()
        .route("/ingest", post(ingest))
        .route("/ingest/batch", post(ingest_batch))
        .route("/analyze", get(analyze))
        .route("/anomalies", get(anomalies))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, window = WINDOW_SIZE, threshold = ZSCORE_THRESHOLD, "demo target starting");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
