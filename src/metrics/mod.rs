// src/metrics/mod.rs
mod collector;

pub use collector::{HealthMetrics, MetricsRegistry};
