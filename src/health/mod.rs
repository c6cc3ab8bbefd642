// src/health/mod.rs
mod orchestrator;
mod probe;
mod registry;
mod report;
mod status;

pub use orchestrator::{Collection, Health};
pub use probe::{from_fn, FnProbe, Probe};
pub use registry::{ProbeConfig, Registry, RegistryError, DEFAULT_TIMEOUT};
pub use report::{AggregateReport, LivenessReport, ProbeOutcome, TIMED_OUT_MESSAGE};
pub use status::{reduce, Status, StatusReducer, STATUS_TIMEOUT};
