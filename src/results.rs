use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::EndpointKey;
use crate::error::StatsError;

/// One successful measured request: wall-clock latency for the complete
/// response transfer plus the resource snapshot taken right after it.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub latency: Duration,
    pub memory_mb: f64,
    pub cpu_percent: f64,
}

#[derive(Debug, Clone, Default)]
struct EndpointRecord {
    samples: Vec<Sample>,
    errors: u64,
}

/// Everything collected for one target across one run.
///
/// Owned and mutated exclusively by the workload runner that created it, then
/// handed to the reporter read-only. Statistics are derived on demand and
/// never stored.
#[derive(Debug, Clone)]
pub struct TargetResults {
    name: String,
    records: [EndpointRecord; EndpointKey::ALL.len()],
    completed: u64,
    started_at: Instant,
    finished_at: Option<Instant>,
}

/// Derived statistics for one endpoint. Latencies are reported in
/// milliseconds; the stored samples stay in their original units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointStats {
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub request_count: u64,
    pub error_count: u64,
    pub avg_memory_mb: f64,
    pub avg_cpu_percent: f64,
}

impl TargetResults {
    /// Creates an empty aggregate and records the run's start timestamp.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Default::default(),
            completed: 0,
            started_at: Instant::now(),
            finished_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn record_sample(&mut self, key: EndpointKey, sample: Sample) {
        self.records[key.index()].samples.push(sample);
        self.completed += 1;
    }

    pub(crate) fn record_error(&mut self, key: EndpointKey) {
        self.records[key.index()].errors += 1;
        self.completed += 1;
    }

    /// Records the run's end timestamp. Called once, after the last endpoint's
    /// batch has been folded in.
    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Instant::now());
    }

    /// Completed requests across all endpoints, successes and errors alike.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn sample_count(&self, key: EndpointKey) -> usize {
        self.records[key.index()].samples.len()
    }

    pub fn error_count(&self, key: EndpointKey) -> u64 {
        self.records[key.index()].errors
    }

    /// Derives statistics for one endpoint. Fails with `EmptySampleSet` when
    /// the endpoint has no successful samples; the caller decides how to
    /// surface the gap.
    pub fn stats(&self, key: EndpointKey) -> Result<EndpointStats, StatsError> {
        let record = &self.records[key.index()];
        if record.samples.is_empty() {
            return Err(StatsError::EmptySampleSet(key));
        }

        let mut latencies_ms: Vec<f64> = record
            .samples
            .iter()
            .map(|sample| sample.latency.as_secs_f64() * 1000.0)
            .collect();
        latencies_ms.sort_by(f64::total_cmp);

        let n = latencies_ms.len();
        let mean_ms = latencies_ms.iter().sum::<f64>() / n as f64;
        let median_ms = if n % 2 == 0 {
            (latencies_ms[n / 2 - 1] + latencies_ms[n / 2]) / 2.0
        } else {
            latencies_ms[n / 2]
        };

        let avg_memory_mb =
            record.samples.iter().map(|s| s.memory_mb).sum::<f64>() / n as f64;
        let avg_cpu_percent =
            record.samples.iter().map(|s| s.cpu_percent).sum::<f64>() / n as f64;

        Ok(EndpointStats {
            min_ms: latencies_ms[0],
            max_ms: latencies_ms[n - 1],
            mean_ms,
            median_ms,
            p95_ms: nearest_rank(&latencies_ms, 0.95),
            p99_ms: nearest_rank(&latencies_ms, 0.99),
            request_count: n as u64,
            error_count: record.errors,
            avg_memory_mb,
            avg_cpu_percent,
        })
    }

    /// Forces an empty wall-clock window, for exercising the degenerate
    /// throughput path.
    #[cfg(test)]
    pub(crate) fn set_zero_window(&mut self) {
        self.finished_at = Some(self.started_at);
    }

    /// Completed requests divided by the run's wall-clock window. Fails with
    /// `DegenerateDuration` instead of dividing by a non-positive elapsed
    /// time.
    pub fn throughput(&self) -> Result<f64, StatsError> {
        let elapsed = self
            .finished_at
            .unwrap_or_else(Instant::now)
            .duration_since(self.started_at)
            .as_secs_f64();
        if elapsed <= 0.0 {
            return Err(StatsError::DegenerateDuration);
        }
        Ok(self.completed as f64 / elapsed)
    }
}

/// Nearest-rank percentile by truncation: `sorted[floor(q × n)]`, clamped to
/// the last element. No interpolation; for small n this can make p95, p99 and
/// max coincide, which is expected.
fn nearest_rank(sorted: &[f64], quantile: f64) -> f64 {
    let idx = ((sorted.len() as f64 * quantile) as usize).min(sorted.len() - 1);
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(latency_ms: u64) -> Sample {
        Sample {
            latency: Duration::from_millis(latency_ms),
            memory_mb: 64.0,
            cpu_percent: 12.0,
        }
    }

    fn results_with_latencies(latencies_ms: &[u64]) -> TargetResults {
        let mut results = TargetResults::new("test");
        for &ms in latencies_ms {
            results.record_sample(EndpointKey::Ping, sample(ms));
        }
        results
    }

    #[test]
    fn completed_counts_successes_and_errors() {
        let mut results = results_with_latencies(&[10, 20]);
        results.record_error(EndpointKey::Ping);
        results.record_error(EndpointKey::Data);

        assert_eq!(results.completed(), 4);
        assert_eq!(results.sample_count(EndpointKey::Ping), 2);
        assert_eq!(results.error_count(EndpointKey::Ping), 1);
        assert_eq!(results.error_count(EndpointKey::Data), 1);
        assert_eq!(results.sample_count(EndpointKey::Data), 0);
    }

    #[test]
    fn stats_on_empty_endpoint_signals_empty_sample_set() {
        let results = TargetResults::new("test");
        assert_eq!(
            results.stats(EndpointKey::Ping),
            Err(StatsError::EmptySampleSet(EndpointKey::Ping))
        );
    }

    #[test]
    fn error_only_endpoint_still_has_no_stats() {
        let mut results = TargetResults::new("test");
        results.record_error(EndpointKey::Ping);
        assert!(results.stats(EndpointKey::Ping).is_err());
        assert_eq!(results.error_count(EndpointKey::Ping), 1);
        assert_eq!(results.sample_count(EndpointKey::Ping), 0);
    }

    #[test]
    fn percentiles_are_monotonic() {
        let results = results_with_latencies(&[13, 2, 8, 21, 5, 34, 1, 55, 3, 89, 144, 233]);
        let stats = results.stats(EndpointKey::Ping).unwrap();

        assert!(stats.min_ms <= stats.median_ms);
        assert!(stats.median_ms <= stats.p95_ms);
        assert!(stats.p95_ms <= stats.p99_ms);
        assert!(stats.p99_ms <= stats.max_ms);
    }

    #[test]
    fn single_sample_collapses_all_percentiles() {
        let results = results_with_latencies(&[10]);
        let stats = results.stats(EndpointKey::Ping).unwrap();

        assert_eq!(stats.min_ms, 10.0);
        assert_eq!(stats.max_ms, 10.0);
        assert_eq!(stats.mean_ms, 10.0);
        assert_eq!(stats.median_ms, 10.0);
        assert_eq!(stats.p95_ms, 10.0);
        assert_eq!(stats.p99_ms, 10.0);
    }

    #[test]
    fn nearest_rank_truncates_and_clamps() {
        // n = 20: floor(0.95 * 20) = 19, the last index; p95 == p99 == max.
        let latencies: Vec<u64> = (1..=20).collect();
        let results = results_with_latencies(&latencies);
        let stats = results.stats(EndpointKey::Ping).unwrap();
        assert_eq!(stats.p95_ms, 20.0);
        assert_eq!(stats.p99_ms, 20.0);

        // n = 100: floor(0.95 * 100) = 95 -> the 96th value.
        let latencies: Vec<u64> = (1..=100).collect();
        let results = results_with_latencies(&latencies);
        let stats = results.stats(EndpointKey::Ping).unwrap();
        assert_eq!(stats.p95_ms, 96.0);
        assert_eq!(stats.p99_ms, 100.0);
    }

    #[test]
    fn median_averages_the_two_middle_samples() {
        let results = results_with_latencies(&[10, 20, 30, 40]);
        let stats = results.stats(EndpointKey::Ping).unwrap();
        assert_eq!(stats.median_ms, 25.0);
    }

    #[test]
    fn latencies_surface_in_milliseconds() {
        let mut results = TargetResults::new("test");
        for secs in [0.010, 0.020, 0.045] {
            results.record_sample(
                EndpointKey::Ping,
                Sample {
                    latency: Duration::from_secs_f64(secs),
                    memory_mb: 0.0,
                    cpu_percent: 0.0,
                },
            );
        }
        let stats = results.stats(EndpointKey::Ping).unwrap();
        let expected_mean = 1000.0 * (0.010 + 0.020 + 0.045) / 3.0;
        assert!((stats.mean_ms - expected_mean).abs() < 1e-9);
    }

    #[test]
    fn stats_are_deterministic() {
        let results = results_with_latencies(&[7, 3, 11, 5, 2]);
        assert_eq!(
            results.stats(EndpointKey::Ping).unwrap(),
            results.stats(EndpointKey::Ping).unwrap()
        );
    }

    #[test]
    fn resource_averages_cover_all_samples() {
        let mut results = TargetResults::new("test");
        for (mem, cpu) in [(10.0, 5.0), (30.0, 15.0)] {
            results.record_sample(
                EndpointKey::Data,
                Sample {
                    latency: Duration::from_millis(1),
                    memory_mb: mem,
                    cpu_percent: cpu,
                },
            );
        }
        let stats = results.stats(EndpointKey::Data).unwrap();
        assert_eq!(stats.avg_memory_mb, 20.0);
        assert_eq!(stats.avg_cpu_percent, 10.0);
    }

    #[test]
    fn throughput_is_positive_for_a_finished_run() {
        let mut results = results_with_latencies(&[10, 20]);
        std::thread::sleep(Duration::from_millis(5));
        results.finish();
        assert!(results.throughput().unwrap() > 0.0);
    }

    #[test]
    fn degenerate_window_signals_instead_of_dividing() {
        let mut results = results_with_latencies(&[10]);
        results.set_zero_window();
        assert_eq!(results.throughput(), Err(StatsError::DegenerateDuration));
    }
}
