// src/health/report.rs
use super::status::Status;
use crate::telemetry::SystemSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Message recorded for a check that did not answer within its timeout.
pub const TIMED_OUT_MESSAGE: &str = "health check timed out";

/// Result of one check in one measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    #[serde(skip)]
    pub name: String,
    pub is_ok: bool,
    pub message: String,
    pub skippable: bool,
    #[serde(skip)]
    pub timed_out: bool,
}

impl ProbeOutcome {
    pub fn success(name: impl Into<String>, skippable: bool) -> Self {
        Self {
            name: name.into(),
            is_ok: true,
            message: String::new(),
            skippable,
            timed_out: false,
        }
    }

    pub fn failure(name: impl Into<String>, message: impl Into<String>, skippable: bool) -> Self {
        Self {
            name: name.into(),
            is_ok: false,
            message: message.into(),
            skippable,
            timed_out: false,
        }
    }

    pub fn timed_out(name: impl Into<String>, skippable: bool) -> Self {
        Self {
            timed_out: true,
            ..Self::failure(name, TIMED_OUT_MESSAGE, skippable)
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.timed_out
    }
}

/// Readiness payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    #[serde(rename = "is_service_ok")]
    pub overall_ok: bool,
    pub status: Status,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "service")]
    pub per_probe: HashMap<String, ProbeOutcome>,
    #[serde(flatten)]
    pub system: SystemSnapshot,
}

impl AggregateReport {
    pub fn new(
        status: Status,
        per_probe: HashMap<String, ProbeOutcome>,
        system: SystemSnapshot,
    ) -> Self {
        Self {
            overall_ok: status.is_ok(),
            status,
            timestamp: Utc::now(),
            per_probe,
            system,
        }
    }

    pub fn outcome(&self, name: &str) -> Option<&ProbeOutcome> {
        self.per_probe.get(name)
    }
}

/// Liveness payload; the process answering at all is the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessReport {
    pub is_service_ok: bool,
}

impl Default for LivenessReport {
    fn default() -> Self {
        Self { is_service_ok: true }
    }
}
