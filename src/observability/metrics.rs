//! Thread-safe metrics collection system
//!
//! Atomic counters for request and crew activity plus a mutex-protected
//! window of request processing times.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

/// Processing times kept for percentile calculation
const MAX_PROCESSING_SAMPLES: usize = 1000;

/// Thread-safe metrics collector using atomics and mutexes
pub struct MetricsCollector {
    // Request metrics
    requests_received: AtomicU64,
    requests_in_flight: AtomicU64,
    requests_completed: AtomicU64,
    requests_failed: AtomicU64,
    last_request_at: AtomicU64,

    // Crew metrics
    pipeline_constructions: AtomicU64,
    tasks_completed: AtomicU64,
    llm_calls: AtomicU64,
    llm_failures: AtomicU64,
    delegations: AtomicU64,

    processing_times: Mutex<Vec<u64>>, // in milliseconds

    uptime_start: AtomicU64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            requests_received: AtomicU64::new(0),
            requests_in_flight: AtomicU64::new(0),
            requests_completed: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            last_request_at: AtomicU64::new(0),
            pipeline_constructions: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            llm_calls: AtomicU64::new(0),
            llm_failures: AtomicU64::new(0),
            delegations: AtomicU64::new(0),
            processing_times: Mutex::new(Vec::new()),
            uptime_start: AtomicU64::new(current_timestamp()),
        }
    }

    pub fn request_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
        self.requests_in_flight.fetch_add(1, Ordering::Relaxed);
        self.last_request_at
            .store(current_timestamp(), Ordering::Relaxed);
    }

    pub fn request_completed(&self, duration: Duration) {
        self.requests_completed.fetch_add(1, Ordering::Relaxed);
        self.leave_flight();
        self.record_processing_time(duration);
    }

    pub fn request_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
        self.leave_flight();
    }

    fn leave_flight(&self) {
        // Saturate instead of wrapping if a failure is recorded without a receive
        let _ = self
            .requests_in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
    }

    fn record_processing_time(&self, duration: Duration) {
        if let Ok(mut times) = self.processing_times.lock() {
            times.push(duration.as_millis() as u64);
            if times.len() > MAX_PROCESSING_SAMPLES {
                let overflow = times.len() - MAX_PROCESSING_SAMPLES;
                times.drain(0..overflow);
            }
        }
    }

    pub fn pipeline_constructed(&self) {
        self.pipeline_constructions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn llm_call(&self, success: bool) {
        self.llm_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.llm_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn delegation(&self) {
        self.delegations.fetch_add(1, Ordering::Relaxed);
    }

    /// Seconds since the last request, `None` before the first one
    pub fn seconds_since_last_request(&self) -> Option<u64> {
        match self.last_request_at.load(Ordering::Relaxed) {
            0 => None,
            at => Some(current_timestamp().saturating_sub(at)),
        }
    }

    /// Get a point-in-time snapshot
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let times = self
            .processing_times
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default();

        MetricsSnapshot {
            timestamp: current_timestamp(),
            requests: RequestMetrics {
                received: self.requests_received.load(Ordering::Relaxed),
                in_flight: self.requests_in_flight.load(Ordering::Relaxed),
                completed: self.requests_completed.load(Ordering::Relaxed),
                failed: self.requests_failed.load(Ordering::Relaxed),
                processing_time: ProcessingTimeStats::from_samples(&times),
            },
            crew: CrewMetrics {
                pipeline_constructions: self.pipeline_constructions.load(Ordering::Relaxed),
                tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
                llm_calls: self.llm_calls.load(Ordering::Relaxed),
                llm_failures: self.llm_failures.load(Ordering::Relaxed),
                delegations: self.delegations.load(Ordering::Relaxed),
            },
            uptime_seconds: current_timestamp()
                .saturating_sub(self.uptime_start.load(Ordering::Relaxed)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: u64,
    pub requests: RequestMetrics,
    pub crew: CrewMetrics,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestMetrics {
    pub received: u64,
    pub in_flight: u64,
    pub completed: u64,
    pub failed: u64,
    pub processing_time: ProcessingTimeStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrewMetrics {
    pub pipeline_constructions: u64,
    pub tasks_completed: u64,
    pub llm_calls: u64,
    pub llm_failures: u64,
    pub delegations: u64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProcessingTimeStats {
    pub samples: usize,
    pub avg_ms: f64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub max_ms: u64,
}

impl ProcessingTimeStats {
    /// Compute stats from raw samples (pure function)
    pub fn from_samples(samples: &[u64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        let percentile = |p: usize| sorted[((sorted.len() - 1) * p) / 100];

        Self {
            samples: sorted.len(),
            avg_ms: sorted.iter().sum::<u64>() as f64 / sorted.len() as f64,
            p50_ms: percentile(50),
            p95_ms: percentile(95),
            max_ms: sorted[sorted.len() - 1],
        }
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
