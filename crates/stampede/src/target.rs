use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};

use stampede_swarm::{RequestError, Target};

/// Point-in-time counters for the reporter and the final summary.
#[derive(Debug, Clone, Copy)]
pub struct TargetStats {
    pub requests: u64,
    pub failures: u64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Real HTTP transport plus the run's request accounting.
///
/// Latencies are recorded in microseconds for completed, successful
/// exchanges; failures of any kind only bump the failure counter.
pub struct HttpTarget {
    client: Client,
    base_url: String,
    requests: AtomicU64,
    failures: AtomicU64,
    latency_us: Mutex<Histogram<u64>>,
}

impl HttpTarget {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .pool_max_idle_per_host(64)
            .timeout(Duration::from_secs(5))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            requests: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            // 1us to 60s at 3 significant figures
            latency_us: Mutex::new(
                Histogram::new_with_bounds(1, 60_000_000, 3).expect("histogram bounds"),
            ),
        }
    }

    pub fn stats(&self) -> TargetStats {
        let hist = self.latency_us.lock();
        TargetStats {
            requests: self.requests.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            p50_ms: hist.value_at_quantile(0.50) as f64 / 1000.0,
            p95_ms: hist.value_at_quantile(0.95) as f64 / 1000.0,
            p99_ms: hist.value_at_quantile(0.99) as f64 / 1000.0,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> Result<(), RequestError> {
        let started = Instant::now();
        let response = request.send().await;
        let elapsed = started.elapsed();

        self.requests.fetch_add(1, Ordering::Relaxed);
        let outcome = match response {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => Err(RequestError::Status(resp.status().as_u16())),
            Err(err) => Err(RequestError::Transport(err.to_string())),
        };
        match outcome {
            Ok(()) => {
                self.latency_us
                    .lock()
                    .saturating_record(elapsed.as_micros().max(1) as u64);
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        outcome
    }
}

#[async_trait]
impl Target for HttpTarget {
    async fn post_json(&self, path: &str, body: String) -> Result<(), RequestError> {
        self.execute(
            self.client
                .post(format!("{}{path}", self.base_url))
                .header(CONTENT_TYPE, "application/json")
                .body(body),
        )
        .await
    }

    async fn get(&self, path: &str) -> Result<(), RequestError> {
        self.execute(self.client.get(format!("{}{path}", self.base_url)))
            .await
    }
}
