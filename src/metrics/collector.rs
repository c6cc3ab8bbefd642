// src/metrics/collector.rs
use crate::health::{AggregateReport, Status};
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, Histogram, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<HealthMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(HealthMetrics::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<HealthMetrics> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct HealthMetrics {
    pub check_up: IntGaugeVec,
    pub check_timeouts_total: IntCounterVec,
    pub measurements_total: IntCounterVec,
    pub measure_duration_seconds: Histogram,
}

impl HealthMetrics {
    pub fn new(registry: &Registry) -> Result<Self> {
        let check_up = IntGaugeVec::new(
            Opts::new(
                "health_check_up",
                "Outcome of the last run of a check (1=ok, 0=failed)",
            ),
            &["check"],
        )?;
        registry.register(Box::new(check_up.clone()))?;

        let check_timeouts_total = IntCounterVec::new(
            Opts::new(
                "health_check_timeouts_total",
                "Checks that did not answer within their timeout",
            ),
            &["check"],
        )?;
        registry.register(Box::new(check_timeouts_total.clone()))?;

        let measurements_total = IntCounterVec::new(
            Opts::new("health_measurements_total", "Readiness measurements by status"),
            &["status"],
        )?;
        registry.register(Box::new(measurements_total.clone()))?;

        let measure_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "health_measure_duration_seconds",
            "Wall-clock duration of a readiness measurement",
        ))?;
        registry.register(Box::new(measure_duration_seconds.clone()))?;

        Ok(Self {
            check_up,
            check_timeouts_total,
            measurements_total,
            measure_duration_seconds,
        })
    }

    pub fn record_report(&self, report: &AggregateReport, duration: Duration) {
        for (name, outcome) in &report.per_probe {
            let value = if outcome.is_ok { 1 } else { 0 };
            self.check_up.with_label_values(&[name.as_str()]).set(value);

            if outcome.is_timeout() {
                self.check_timeouts_total.with_label_values(&[name.as_str()]).inc();
            }
        }

        self.measurements_total
            .with_label_values(&[report.status.as_str()])
            .inc();
        self.measure_duration_seconds.observe(duration.as_secs_f64());
    }

    pub fn measurements(&self, status: Status) -> u64 {
        self.measurements_total
            .with_label_values(&[status.as_str()])
            .get()
    }
}
