//! Per-endpoint request metrics

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Counters and latency distribution of one endpoint
#[derive(Debug)]
pub struct EndpointMetrics {
    pub requests: AtomicU64,
    pub failures: AtomicU64,
    /// Latency in microseconds
    latency: RwLock<Histogram<u64>>,
}

impl EndpointMetrics {
    fn new() -> Result<Self, hdrhistogram::CreationError> {
        Ok(Self {
            requests: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            // 1µs to 60s
            latency: RwLock::new(Histogram::new_with_bounds(1, 60_000_000, 3)?),
        })
    }

    fn record(&self, latency: Duration, success: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        let micros = (latency.as_micros() as u64).max(1);
        if let Err(e) = self.latency.write().record(micros) {
            warn!("Failed to record latency: {}", e);
        }
    }
}

/// Request metrics keyed by endpoint label, shared by every client of a run
#[derive(Debug)]
pub struct RequestMetrics {
    endpoints: RwLock<BTreeMap<&'static str, Arc<EndpointMetrics>>>,
    started: Instant,
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self {
            endpoints: RwLock::new(BTreeMap::new()),
            started: Instant::now(),
        }
    }

    pub fn record(&self, endpoint: &'static str, latency: Duration, success: bool) {
        if let Some(metrics) = self.endpoint(endpoint) {
            metrics.record(latency, success);
        }
    }

    fn endpoint(&self, endpoint: &'static str) -> Option<Arc<EndpointMetrics>> {
        if let Some(metrics) = self.endpoints.read().get(endpoint) {
            return Some(metrics.clone());
        }

        let mut endpoints = self.endpoints.write();
        if let Some(metrics) = endpoints.get(endpoint) {
            return Some(metrics.clone());
        }
        match EndpointMetrics::new() {
            Ok(metrics) => {
                let metrics = Arc::new(metrics);
                endpoints.insert(endpoint, metrics.clone());
                Some(metrics)
            }
            Err(e) => {
                warn!(endpoint, "Failed to create latency histogram: {}", e);
                None
            }
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let endpoints = self
            .endpoints
            .read()
            .iter()
            .map(|(name, metrics)| {
                let hist = metrics.latency.read();
                EndpointSummary {
                    endpoint: name.to_string(),
                    requests: metrics.requests.load(Ordering::Relaxed),
                    failures: metrics.failures.load(Ordering::Relaxed),
                    latency_p50_us: hist.value_at_quantile(0.50),
                    latency_p90_us: hist.value_at_quantile(0.90),
                    latency_p99_us: hist.value_at_quantile(0.99),
                    latency_max_us: hist.max(),
                    latency_mean_us: hist.mean() as u64,
                }
            })
            .collect();

        MetricsSummary {
            duration_secs: self.started.elapsed().as_secs_f64(),
            endpoints,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSummary {
    pub endpoint: String,
    pub requests: u64,
    pub failures: u64,
    pub latency_p50_us: u64,
    pub latency_p90_us: u64,
    pub latency_p99_us: u64,
    pub latency_max_us: u64,
    pub latency_mean_us: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub duration_secs: f64,
    pub endpoints: Vec<EndpointSummary>,
}

impl MetricsSummary {
    pub fn total_requests(&self) -> u64 {
        self.endpoints.iter().map(|e| e.requests).sum()
    }

    /// Print the latency table to stderr; stdout is reserved for the result
    pub fn print_report(&self) {
        eprintln!("\n╔══════════════════════════════════════════════════════════════════════════╗");
        eprintln!("║                         NESTBENCH REQUEST LATENCY                        ║");
        eprintln!("╠══════════════════════════════════════════════════════════════════════════╣");
        eprintln!(
            "║ Duration: {:>8.2}s   Requests: {:>10}                                  ║",
            self.duration_secs,
            self.total_requests()
        );
        eprintln!("╠══════════════════════════════════════════════════════════════════════════╣");
        eprintln!(
            "║ {:<32} {:>8} {:>6} {:>8} {:>8} {:>8} ║",
            "endpoint", "requests", "fail", "p50 ms", "p99 ms", "max ms"
        );
        for e in &self.endpoints {
            eprintln!(
                "║ {:<32} {:>8} {:>6} {:>8.1} {:>8.1} {:>8.1} ║",
                e.endpoint,
                e.requests,
                e.failures,
                e.latency_p50_us as f64 / 1000.0,
                e.latency_p99_us as f64 / 1000.0,
                e.latency_max_us as f64 / 1000.0,
            );
        }
        eprintln!("╚══════════════════════════════════════════════════════════════════════════╝\n");
    }
}
