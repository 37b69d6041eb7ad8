//! Decision statistics for the triage service.

use crate::ensemble::aggregator::AgreementSummary;
use crate::types::decision::Decision;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for the request pipeline
pub struct TriageMetrics {
    /// Total decisions produced
    pub decisions_made: AtomicU64,
    /// Decisions that recommended isolation
    pub isolations: AtomicU64,
    /// Requests rejected as malformed
    pub rejections: AtomicU64,
    /// Decisions by risk level
    decisions_by_level: RwLock<HashMap<String, u64>>,
    /// Decisions by classification
    decisions_by_class: RwLock<HashMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Fused confidence distribution buckets
    confidence_buckets: RwLock<[u64; 10]>,
    /// Member agreement per decision (1 - std-dev of the top label)
    agreements: RwLock<Vec<f64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl TriageMetrics {
    pub fn new() -> Self {
        Self {
            decisions_made: AtomicU64::new(0),
            isolations: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
            decisions_by_level: RwLock::new(HashMap::new()),
            decisions_by_class: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            confidence_buckets: RwLock::new([0; 10]),
            agreements: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a completed decision
    pub fn record_decision(&self, decision: &Decision, processing_time: Duration) {
        self.decisions_made.fetch_add(1, Ordering::Relaxed);
        if decision.should_isolate {
            self.isolations.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut by_level) = self.decisions_by_level.write() {
            *by_level
                .entry(decision.risk_level.as_str().to_string())
                .or_insert(0) += 1;
        }
        if let Ok(mut by_class) = self.decisions_by_class.write() {
            *by_class
                .entry(decision.classification.to_string())
                .or_insert(0) += 1;
        }

        self.record_processing_time(processing_time);

        let bucket = (decision.confidence * 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.confidence_buckets.write() {
            buckets[bucket] += 1;
        }

        self.record_agreement(&decision.fused.agreement);
    }

    /// Record a rejected request
    pub fn record_rejection(&self, processing_time: Duration) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
        self.record_processing_time(processing_time);
    }

    fn record_processing_time(&self, processing_time: Duration) {
        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only the most recent samples
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    fn record_agreement(&self, agreement: &AgreementSummary) {
        if let Ok(mut agreements) = self.agreements.write() {
            agreements.push(agreement.agreement_score());
            if agreements.len() > 1000 {
                agreements.drain(0..500);
            }
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return ProcessingStats::default(),
        };
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get average member agreement
    pub fn get_avg_agreement(&self) -> f64 {
        match self.agreements.read() {
            Ok(agreements) if !agreements.is_empty() => {
                agreements.iter().sum::<f64>() / agreements.len() as f64
            }
            _ => 0.0,
        }
    }

    /// Requests handled per second since startup
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let handled = self.decisions_made.load(Ordering::Relaxed)
            + self.rejections.load(Ordering::Relaxed);
        if elapsed > 0.0 {
            handled as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_confidence_distribution(&self) -> [u64; 10] {
        self.confidence_buckets
            .read()
            .map(|b| *b)
            .unwrap_or([0; 10])
    }

    pub fn get_decisions_by_level(&self) -> HashMap<String, u64> {
        self.decisions_by_level
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn get_decisions_by_class(&self) -> HashMap<String, u64> {
        self.decisions_by_class
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let decisions = self.decisions_made.load(Ordering::Relaxed);
        let isolations = self.isolations.load(Ordering::Relaxed);
        let rejections = self.rejections.load(Ordering::Relaxed);
        let isolation_rate = if decisions > 0 {
            (isolations as f64 / decisions as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let agreement = self.get_avg_agreement();
        let by_level = self.get_decisions_by_level();
        let by_class = self.get_decisions_by_class();
        let confidence_dist = self.get_confidence_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║               FLOCK TRIAGE - DECISION SUMMARY                ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Decisions:  {:>8}  │  Throughput: {:>7.1} req/s            ║",
            decisions, throughput
        );
        info!(
            "║ Isolations: {:>8}  │  Isolation Rate: {:>5.1}%  Rejected: {:>5} ║",
            isolations, isolation_rate, rejections
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!(
            "║ Member Agreement: {:>5.1}% (higher = members agree more)      ║",
            agreement * 100.0
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Decisions by Risk Level:                                     ║");
        for (level, count) in &by_level {
            info!("║   {:10}: {:>6}                                          ║", level, count);
        }
        info!("║ Decisions by Classification:                                 ║");
        for (class, count) in &by_class {
            info!("║   {:20}: {:>6}                                ║", class, count);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Fused Confidence Distribution:                               ║");
        let total: u64 = confidence_dist.iter().sum();
        for (i, &count) in confidence_dist.iter().enumerate() {
            let pct = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for TriageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Prints a metrics summary on a fixed interval
pub struct MetricsReporter {
    metrics: Arc<TriageMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<TriageMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
