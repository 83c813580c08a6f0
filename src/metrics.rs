//! Scoring statistics and batch summaries.

use crate::types::prediction::{round_to, BatchEntry, PredictionResult, RiskLevel};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept before the oldest half is dropped
const MAX_LATENCY_SAMPLES: usize = 10_000;

/// Counters for one scoring session
pub struct ScoringMetrics {
    /// Records that produced a prediction
    pub records_scored: AtomicU64,
    /// Records that failed
    pub records_failed: AtomicU64,
    /// Predictions decided by a business rule instead of the model
    pub rule_overrides: AtomicU64,
    by_level: RwLock<BTreeMap<RiskLevel, u64>>,
    /// Scoring times (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Churn probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl ScoringMetrics {
    pub fn new() -> Self {
        Self {
            records_scored: AtomicU64::new(0),
            records_failed: AtomicU64::new(0),
            rule_overrides: AtomicU64::new(0),
            by_level: RwLock::new(BTreeMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, elapsed: Duration, prediction: &PredictionResult) {
        self.records_scored.fetch_add(1, Ordering::Relaxed);
        if prediction.note.is_some() {
            self.rule_overrides.fetch_add(1, Ordering::Relaxed);
        }

        {
            let mut times = self.latencies.write().unwrap_or_else(PoisonError::into_inner);
            times.push(elapsed.as_micros() as u64);
            if times.len() > MAX_LATENCY_SAMPLES {
                times.drain(0..MAX_LATENCY_SAMPLES / 2);
            }
        }

        let bucket = (prediction.churn_probability * 10.0).clamp(0.0, 9.0) as usize;
        self.probability_buckets
            .write()
            .unwrap_or_else(PoisonError::into_inner)[bucket] += 1;

        *self
            .by_level
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(prediction.risk_level)
            .or_insert(0) += 1;
    }

    pub fn record_failure(&self) {
        self.records_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Scoring time statistics
    pub fn get_latency_stats(&self) -> LatencyStats {
        let times = self.latencies.read().unwrap_or_else(PoisonError::into_inner);
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let percentile = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Records per second since creation
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.records_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_probability_distribution(&self) -> [u64; 10] {
        *self
            .probability_buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_by_risk_level(&self) -> BTreeMap<RiskLevel, u64> {
        self.by_level
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let scored = self.records_scored.load(Ordering::Relaxed);
        let failed = self.records_failed.load(Ordering::Relaxed);
        let overrides = self.rule_overrides.load(Ordering::Relaxed);
        let latency = self.get_latency_stats();

        info!(
            scored = scored,
            failed = failed,
            rule_overrides = overrides,
            throughput = format!("{:.1} rec/s", self.get_throughput()),
            "Scoring summary"
        );
        info!(
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p95_us = latency.p95_us,
            p99_us = latency.p99_us,
            max_us = latency.max_us,
            "Scoring latency"
        );
        for (level, count) in self.get_by_risk_level() {
            info!(risk_level = %level, count = count, "Risk level count");
        }

        let distribution = self.get_probability_distribution();
        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            info!(
                "  {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                "#".repeat(((pct / 5.0) as usize).min(20))
            );
        }
    }
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoring time statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Aggregate view of a batch response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Successful predictions per risk level; every level is present
    pub by_risk_level: BTreeMap<RiskLevel, usize>,
    /// Mean `churn_score` of successful predictions, one decimal
    pub average_score: f64,
}

impl BatchSummary {
    pub fn from_entries(entries: &[BatchEntry]) -> Self {
        let mut by_risk_level: BTreeMap<RiskLevel, usize> =
            [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High]
                .into_iter()
                .map(|level| (level, 0))
                .collect();

        let predictions: Vec<&PredictionResult> =
            entries.iter().filter_map(BatchEntry::prediction).collect();
        for prediction in &predictions {
            *by_risk_level.entry(prediction.risk_level).or_insert(0) += 1;
        }

        let average_score = if predictions.is_empty() {
            0.0
        } else {
            let sum: f64 = predictions.iter().map(|p| p.churn_score).sum();
            round_to(sum / predictions.len() as f64, 1)
        };

        Self {
            total: entries.len(),
            successful: predictions.len(),
            failed: entries.len() - predictions.len(),
            by_risk_level,
            average_score,
        }
    }
}
