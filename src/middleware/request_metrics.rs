use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    server_errors: AtomicU64,
    latency_micros: AtomicU64,
}

/// Request counters shared between the tracking layer and the snapshot job.
#[derive(Clone, Default)]
pub struct RequestMetrics {
    counters: Arc<Counters>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSample {
    pub requests: u64,
    /// Percentage of responses with a 5xx status.
    pub error_rate: f64,
    pub mean_latency_ms: f64,
}

impl RequestMetrics {
    pub fn record(&self, status: u16, elapsed_micros: u64) {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);
        self.counters
            .latency_micros
            .fetch_add(elapsed_micros, Ordering::Relaxed);
        if status >= 500 {
            self.counters.server_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns what was counted since the previous call and starts a new window.
    pub fn take_window(&self) -> WindowSample {
        let requests = self.counters.requests.swap(0, Ordering::Relaxed);
        let errors = self.counters.server_errors.swap(0, Ordering::Relaxed);
        let latency = self.counters.latency_micros.swap(0, Ordering::Relaxed);
        if requests == 0 {
            return WindowSample {
                requests: 0,
                error_rate: 0.0,
                mean_latency_ms: 0.0,
            };
        }
        WindowSample {
            requests,
            error_rate: errors as f64 * 100.0 / requests as f64,
            mean_latency_ms: latency as f64 / requests as f64 / 1000.0,
        }
    }
}

pub async fn track(State(metrics): State<RequestMetrics>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let response = next.run(request).await;
    metrics.record(
        response.status().as_u16(),
        started.elapsed().as_micros() as u64,
    );
    response
}
