// src/health/orchestrator.rs
use super::registry::{ProbeConfig, Registry, RegistryError};
use super::report::{AggregateReport, LivenessReport, ProbeOutcome};
use super::status::{reduce, STATUS_TIMEOUT};
use crate::metrics::HealthMetrics;
use crate::telemetry::{CheckSpan, NoopTracer, RuntimeCollector, SystemCollector, Tracer};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{sleep, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

const PANICKED_MESSAGE: &str = "health check panicked";

/// How a measurement waits for its checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Every check races its own timeout inside its task and is cancelled
    /// when it loses. A measurement takes as long as the slowest check.
    #[default]
    FanIn,
    /// One wait slot per check, drained in registry order, each racing the
    /// shared result queue against that check's timeout. Checks share the
    /// caller's token and keep running after they time out. A measurement
    /// can take up to the sum of the timeouts.
    Sequential,
}

/// Health-check container: registration plus readiness measurement.
pub struct Health {
    registry: Registry,
    tracer: Arc<dyn Tracer>,
    system: Arc<dyn SystemCollector>,
    metrics: Option<Arc<HealthMetrics>>,
    collection: Collection,
}

impl Default for Health {
    fn default() -> Self {
        Self::new()
    }
}

impl Health {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            tracer: Arc::new(NoopTracer),
            system: Arc::new(RuntimeCollector),
            metrics: None,
            collection: Collection::default(),
        }
    }

    pub fn with_tracer(mut self, tracer: impl Tracer + 'static) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    pub fn with_system_collector(mut self, system: impl SystemCollector + 'static) -> Self {
        self.system = Arc::new(system);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<HealthMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_collection(mut self, collection: Collection) -> Self {
        self.collection = collection;
        self
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub async fn register(&self, config: ProbeConfig) -> Result<(), RegistryError> {
        self.registry.register(config).await
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn liveness(&self) -> LivenessReport {
        LivenessReport::default()
    }

    /// Run every registered check and fold the results into one report.
    ///
    /// Holds the registry lock for the whole run: measurements never
    /// overlap and registration waits until this returns.
    pub async fn measure(&self, ctx: &CancellationToken) -> AggregateReport {
        let checks = self.registry.lock().await;
        let started = Instant::now();
        let measurement_id = Uuid::new_v4();

        let snapshot: Vec<ProbeConfig> = checks.values().cloned().collect();

        let mut root = self.tracer.start("health.Measure");
        root.set_attribute("checks", snapshot.len().into());
        root.set_attribute("measurement_id", measurement_id.to_string().as_str().into());

        let mut spans: HashMap<String, Box<dyn CheckSpan>> = snapshot
            .iter()
            .map(|config| (config.name.clone(), root.child(&config.name)))
            .collect();

        debug!(
            "Measurement {} started with {} checks ({:?})",
            measurement_id,
            snapshot.len(),
            self.collection
        );

        let per_probe = match self.collection {
            Collection::FanIn => collect_fan_in(&snapshot, ctx, &mut spans).await,
            Collection::Sequential => collect_sequential(&snapshot, ctx, &mut spans).await,
        };

        let status = reduce(per_probe.values().map(|o| (o.is_ok, o.skippable)));
        root.set_attribute("status", status.as_str().into());
        root.end();

        let report = AggregateReport::new(status, per_probe, self.system.snapshot());
        let elapsed = started.elapsed();

        if let Some(metrics) = &self.metrics {
            metrics.record_report(&report, elapsed);
        }

        let failed = report.per_probe.values().filter(|o| !o.is_ok).count();
        info!(
            "Measurement {} complete: {} ({} checks, {} failed) in {:?}",
            measurement_id,
            status,
            report.per_probe.len(),
            failed,
            elapsed
        );

        report
    }
}

async fn run_probe(config: &ProbeConfig, ctx: CancellationToken) -> ProbeOutcome {
    match config.check.check(ctx).await {
        Ok(()) => ProbeOutcome::success(&config.name, config.skip_on_err),
        Err(e) => ProbeOutcome::failure(&config.name, format!("{:#}", e), config.skip_on_err),
    }
}

fn deliver(tx: &mpsc::Sender<ProbeOutcome>, outcome: ProbeOutcome) {
    if let Err(e) = tx.try_send(outcome) {
        debug!("Dropping health check outcome nobody waits for: {}", e);
    }
}

/// Store `outcome` unless its check already has one, and close its span.
fn record(
    outcomes: &mut HashMap<String, ProbeOutcome>,
    spans: &mut HashMap<String, Box<dyn CheckSpan>>,
    outcome: ProbeOutcome,
) {
    if outcomes.contains_key(&outcome.name) {
        debug!("Discarding late outcome of health check {}", outcome.name);
        return;
    }

    if let Some(mut span) = spans.remove(&outcome.name) {
        if outcome.is_timeout() {
            span.set_error(STATUS_TIMEOUT);
        } else if !outcome.is_ok {
            span.record_error(&outcome.message);
        }
        span.end();
    }

    if outcome.is_timeout() {
        warn!("Health check {} timed out", outcome.name);
    } else if outcome.is_ok {
        debug!("Health check {} is ok", outcome.name);
    } else {
        warn!("Health check {} failed: {}", outcome.name, outcome.message);
    }

    outcomes.insert(outcome.name.clone(), outcome);
}

/// Record a timeout for every check that is still missing an outcome.
fn backfill(
    snapshot: &[ProbeConfig],
    outcomes: &mut HashMap<String, ProbeOutcome>,
    spans: &mut HashMap<String, Box<dyn CheckSpan>>,
) {
    for config in snapshot {
        if !outcomes.contains_key(&config.name) {
            record(
                outcomes,
                spans,
                ProbeOutcome::timed_out(&config.name, config.skip_on_err),
            );
        }
    }
}

async fn collect_fan_in(
    snapshot: &[ProbeConfig],
    ctx: &CancellationToken,
    spans: &mut HashMap<String, Box<dyn CheckSpan>>,
) -> HashMap<String, ProbeOutcome> {
    let total = snapshot.len();
    let (tx, mut rx) = mpsc::channel(total.max(1));

    for config in snapshot {
        let config = config.clone();
        let token = ctx.child_token();
        let tx = tx.clone();

        tokio::spawn(async move {
            // The check gets a task of its own so a check that blocks its
            // worker thread cannot also stall the timer racing it.
            let check = tokio::spawn({
                let config = config.clone();
                let token = token.clone();
                async move { run_probe(&config, token).await }
            });
            let abort = check.abort_handle();

            let outcome = match timeout(config.timeout, check).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) if e.is_panic() => {
                    ProbeOutcome::failure(&config.name, PANICKED_MESSAGE, config.skip_on_err)
                }
                Ok(Err(_)) => ProbeOutcome::failure(
                    &config.name,
                    "health check aborted",
                    config.skip_on_err,
                ),
                Err(_) => {
                    token.cancel();
                    abort.abort();
                    ProbeOutcome::timed_out(&config.name, config.skip_on_err)
                }
            };
            deliver(&tx, outcome);
        });
    }
    drop(tx);

    let mut outcomes = HashMap::with_capacity(total);
    while let Some(outcome) = rx.recv().await {
        record(&mut outcomes, spans, outcome);
    }

    backfill(snapshot, &mut outcomes, spans);
    outcomes
}

async fn collect_sequential(
    snapshot: &[ProbeConfig],
    ctx: &CancellationToken,
    spans: &mut HashMap<String, Box<dyn CheckSpan>>,
) -> HashMap<String, ProbeOutcome> {
    let total = snapshot.len();
    let started = tokio::time::Instant::now();
    let (tx, mut rx) = mpsc::channel(total.max(1));

    for config in snapshot {
        let config = config.clone();
        let ctx = ctx.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            let outcome = run_probe(&config, ctx).await;
            deliver(&tx, outcome);
        });
    }
    drop(tx);

    let mut outcomes = HashMap::with_capacity(total);
    for config in snapshot {
        tokio::select! {
            Some(outcome) = rx.recv() => {
                record(&mut outcomes, spans, outcome);
            }
            _ = sleep(config.timeout) => {
                if !outcomes.contains_key(&config.name) {
                    record(
                        &mut outcomes,
                        spans,
                        ProbeOutcome::timed_out(&config.name, config.skip_on_err),
                    );
                }
            }
        }
    }

    // A slot can be spent on a late or duplicate arrival, so outcomes may
    // still be queued or on their way. Each missing check gets until its
    // own deadline, counted from the start of the run.
    while let Ok(outcome) = rx.try_recv() {
        record(&mut outcomes, spans, outcome);
    }
    for config in snapshot {
        let deadline = started + config.timeout;
        while !outcomes.contains_key(&config.name) {
            tokio::select! {
                biased;
                outcome = rx.recv() => match outcome {
                    Some(outcome) => record(&mut outcomes, spans, outcome),
                    None => break,
                },
                _ = sleep_until(deadline) => break,
            }
        }
    }

    backfill(snapshot, &mut outcomes, spans);
    outcomes
}
