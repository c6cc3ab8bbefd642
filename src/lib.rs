// src/lib.rs
//! Named health checks run concurrently and folded into one readiness report.
pub mod checks;
pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod telemetry;

pub use health::{
    from_fn, AggregateReport, Collection, Health, LivenessReport, Probe, ProbeConfig, ProbeOutcome,
    RegistryError, Status,
};
