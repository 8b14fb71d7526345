//! Request counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every client built from the same [`crate::http::HttpClient`]
#[derive(Debug, Default)]
pub struct Metrics {
    requests_sent: AtomicU64,
    requests_failed: AtomicU64,
    rate_limit_warnings: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "requests_sent", "Metric incremented");
    }

    pub fn request_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "requests_failed", "Metric incremented");
    }

    pub fn rate_limit_warning(&self) {
        self.rate_limit_warnings.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "rate_limit_warnings", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            rate_limit_warnings: self.rate_limit_warnings.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests_sent: u64,
    pub requests_failed: u64,
    pub rate_limit_warnings: u64,
}
