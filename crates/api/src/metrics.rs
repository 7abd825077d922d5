use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,
    rejected_requests: AtomicUsize,

    // Timing (in microseconds)
    total_generate_time_us: AtomicU64,
    total_execute_time_us: AtomicU64,

    // Counts
    generate_requests: AtomicUsize,
    execute_requests: AtomicUsize,
    sql_statements: AtomicUsize,
    charts_rendered: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            rejected_requests: AtomicUsize::new(0),
            total_generate_time_us: AtomicU64::new(0),
            total_execute_time_us: AtomicU64::new(0),
            generate_requests: AtomicUsize::new(0),
            execute_requests: AtomicUsize::new(0),
            sql_statements: AtomicUsize::new(0),
            charts_rendered: AtomicUsize::new(0),
        })
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Request refused by validation before any work was done
    pub fn record_rejected(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_generate(&self, duration: Duration, statements: usize, chart: bool) {
        self.generate_requests.fetch_add(1, Ordering::Relaxed);
        self.total_generate_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.sql_statements.fetch_add(statements, Ordering::Relaxed);
        if chart {
            self.charts_rendered.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_execute(&self, duration: Duration, statements: usize) {
        self.execute_requests.fetch_add(1, Ordering::Relaxed);
        self.total_execute_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.sql_statements.fetch_add(statements, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            avg_generate_time_ms: avg_time_ms(&self.total_generate_time_us, &self.generate_requests),
            avg_execute_time_ms: avg_time_ms(&self.total_execute_time_us, &self.execute_requests),
            sql_statements: self.sql_statements.load(Ordering::Relaxed),
            charts_rendered: self.charts_rendered.load(Ordering::Relaxed),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: &AtomicUsize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    let cnt = count.load(Ordering::Relaxed) as f64;
    if cnt > 0.0 {
        total / cnt / 1000.0 // Convert to ms
    } else {
        0.0
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub rejected_requests: usize,
    pub avg_generate_time_ms: f64,
    pub avg_execute_time_ms: f64,
    pub sql_statements: usize,
    pub charts_rendered: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_per_endpoint() {
        let metrics = Metrics::new();
        metrics.record_request(true);
        metrics.record_generate(Duration::from_millis(30), 2, true);
        metrics.record_request(false);
        metrics.record_generate(Duration::from_millis(10), 0, false);
        metrics.record_rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.rejected_requests, 1);
        assert_eq!(snapshot.avg_generate_time_ms, 20.0);
        assert_eq!(snapshot.avg_execute_time_ms, 0.0);
        assert_eq!(snapshot.sql_statements, 2);
        assert_eq!(snapshot.charts_rendered, 1);
    }
}
