// src/health/registry.rs
use super::probe::Probe;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Timeout applied to checks registered without one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid health check config: {0}")]
    InvalidConfig(String),

    #[error("health check {0:?} is already registered")]
    DuplicateName(String),
}

/// Parameters of one registered check.
#[derive(Clone)]
pub struct ProbeConfig {
    pub name: String,
    /// Zero means "use [`DEFAULT_TIMEOUT`]".
    pub timeout: Duration,
    /// A failing skippable check only degrades the status to
    /// `Partially Available`.
    pub skip_on_err: bool,
    pub check: Arc<dyn Probe>,
}

impl ProbeConfig {
    pub fn new(name: impl Into<String>, check: impl Probe + 'static) -> Self {
        Self {
            name: name.into(),
            timeout: Duration::ZERO,
            skip_on_err: false,
            check: Arc::new(check),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn skip_on_err(mut self, skip: bool) -> Self {
        self.skip_on_err = skip;
        self
    }
}

impl fmt::Debug for ProbeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeConfig")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("skip_on_err", &self.skip_on_err)
            .finish_non_exhaustive()
    }
}

/// Name-unique set of check configs behind one exclusive lock.
///
/// The same lock is held for a whole measurement, so registration waits
/// for an in-flight measurement to finish.
#[derive(Default)]
pub struct Registry {
    checks: Mutex<HashMap<String, ProbeConfig>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, mut config: ProbeConfig) -> Result<(), RegistryError> {
        if config.name.is_empty() {
            return Err(RegistryError::InvalidConfig(
                "health check must have a name to be registered".to_string(),
            ));
        }

        if config.timeout.is_zero() {
            config.timeout = DEFAULT_TIMEOUT;
        }

        let mut checks = self.checks.lock().await;
        if checks.contains_key(&config.name) {
            return Err(RegistryError::DuplicateName(config.name));
        }

        debug!(
            "Registered health check {} (timeout: {:?}, skip_on_err: {})",
            config.name, config.timeout, config.skip_on_err
        );
        checks.insert(config.name.clone(), config);

        Ok(())
    }

    /// Take the exclusive lock for a measurement.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, HashMap<String, ProbeConfig>> {
        self.checks.lock().await
    }

    pub async fn len(&self) -> usize {
        self.checks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn get(&self, name: &str) -> Option<ProbeConfig> {
        self.checks.lock().await.get(name).cloned()
    }
}
