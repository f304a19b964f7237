//! Prometheus metrics for the Plasma ledger.
//!
//! All metrics follow the naming convention: `plasma_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., spends_accepted_total)
//! - **Gauge**: Value that can go up or down (e.g., last_written_block)
//! - **Histogram**: Distribution of values (e.g., block_write_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // LEDGER STORE METRICS
    // =========================================================================

    /// Spending records committed
    pub static ref SPENDS_ACCEPTED: Counter = Counter::new(
        "plasma_store_spends_accepted_total",
        "Total number of spending records committed"
    ).expect("metric creation failed");

    /// Spending attempts rejected, by reason
    pub static ref SPENDS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("plasma_store_spends_rejected_total", "Total spending attempts rejected"),
        &["reason"]  // double_spend, counter_reused, conflict, storage
    ).expect("metric creation failed");

    /// Funding transactions committed
    pub static ref FUNDING_TRANSACTIONS: Counter = Counter::new(
        "plasma_store_funding_transactions_total",
        "Total number of funding transactions committed"
    ).expect("metric creation failed");

    // =========================================================================
    // BLOCK METRICS
    // =========================================================================

    /// Blocks assembled
    pub static ref BLOCKS_ASSEMBLED: Counter = Counter::new(
        "plasma_assembler_blocks_assembled_total",
        "Total number of blocks assembled"
    ).expect("metric creation failed");

    /// Blocks written
    pub static ref BLOCKS_WRITTEN: Counter = Counter::new(
        "plasma_writer_blocks_written_total",
        "Total number of blocks persisted"
    ).expect("metric creation failed");

    /// Last written block number
    pub static ref LAST_WRITTEN_BLOCK: Gauge = Gauge::new(
        "plasma_writer_last_written_block",
        "Number of the last persisted block"
    ).expect("metric creation failed");

    /// Block write duration
    pub static ref BLOCK_WRITE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "plasma_writer_block_write_duration_seconds",
            "Time spent persisting a block"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).unwrap_or_default())
    ).expect("metric creation failed");

    /// Block assembly duration
    pub static ref BLOCK_ASSEMBLY_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "plasma_assembler_block_assembly_duration_seconds",
            "Time spent assembling a block"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).unwrap_or_default())
    ).expect("metric creation failed");
}

/// Handle returned once metrics are registered.
pub struct MetricsHandle {
    registry: Registry,
}

impl MetricsHandle {
    /// Encode all registered metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        encode_registry(&self.registry)
    }
}

/// Register all ledger metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(SPENDS_ACCEPTED.clone()),
        Box::new(SPENDS_REJECTED.clone()),
        Box::new(FUNDING_TRANSACTIONS.clone()),
        Box::new(BLOCKS_ASSEMBLED.clone()),
        Box::new(BLOCKS_WRITTEN.clone()),
        Box::new(LAST_WRITTEN_BLOCK.clone()),
        Box::new(BLOCK_WRITE_DURATION.clone()),
        Box::new(BLOCK_ASSEMBLY_DURATION.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        registry: REGISTRY.clone(),
    })
}

/// Encode the global registry as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    encode_registry(&REGISTRY)
}

fn encode_registry(registry: &Registry) -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_encode() {
        // A second registration in the same process reports AlreadyReg.
        if let Ok(handle) = register_metrics() {
            SPENDS_ACCEPTED.inc();
            let text = handle.encode().unwrap();
            assert!(text.contains("plasma_store_spends_accepted_total"));
        }
    }

    #[test]
    fn test_counter_increment() {
        SPENDS_REJECTED.with_label_values(&["double_spend"]).inc();
        assert!(SPENDS_REJECTED.with_label_values(&["double_spend"]).get() >= 1.0);
    }

    #[test]
    fn test_gauge_set() {
        LAST_WRITTEN_BLOCK.set(42.0);
        assert_eq!(LAST_WRITTEN_BLOCK.get(), 42.0);
    }

    #[test]
    fn test_histogram_timer() {
        let before = BLOCK_WRITE_DURATION.get_sample_count();
        {
            let _timer = HistogramTimer::new(&BLOCK_WRITE_DURATION);
        }
        assert!(BLOCK_WRITE_DURATION.get_sample_count() > before);
    }
}
