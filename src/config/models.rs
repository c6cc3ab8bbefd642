// src/config/models.rs
use crate::checks::{HttpProbe, KafkaProbe, KafkaSettings};
use crate::health::{Collection, ProbeConfig};
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("check #{0} has an empty name")]
    EmptyCheckName(usize),

    #[error("check {0:?} is configured more than once")]
    DuplicateCheck(String),

    #[error("check {name:?} has an invalid url: {source}")]
    InvalidUrl {
        name: String,
        #[source]
        source: url::ParseError,
    },

    #[error("check {0:?} must configure exactly one of http or kafka")]
    CheckKind(String),

    #[error("kafka check {0:?} has no bootstrap servers")]
    EmptyBootstrap(String),

    #[error("metrics path must start with '/', got {0:?}")]
    InvalidMetricsPath(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub collection: Collection,
    #[serde(default)]
    pub tracer: TracerKind,
    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

/// Where measurement spans go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TracerKind {
    /// `tracing` spans through the process subscriber.
    #[default]
    Log,
    /// OpenTelemetry spans through the global tracer provider.
    Otel,
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckConfig {
    pub name: String,
    /// Zero or absent falls back to the two second default.
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default)]
    pub skip_on_err: bool,
    #[serde(default)]
    pub http: Option<HttpCheckConfig>,
    #[serde(default)]
    pub kafka: Option<KafkaCheckConfig>,
}

impl CheckConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Human readable target, for logs.
    pub fn target(&self) -> String {
        match (&self.http, &self.kafka) {
            (Some(http), _) => http.url.clone(),
            (None, Some(kafka)) => format!("kafka://{}", kafka.bootstrap.join(",")),
            (None, None) => String::new(),
        }
    }

    /// Build the registrable check. Call after [`Config::validate`].
    pub fn to_probe(&self) -> Result<ProbeConfig, ConfigError> {
        let config = match (&self.http, &self.kafka) {
            (Some(http), None) => {
                let mut probe =
                    HttpProbe::new(http.url.clone()).with_request_timeout(http.request_timeout());
                if let Some(needle) = &http.expect_body {
                    probe = probe.expect_body(needle.clone());
                }
                ProbeConfig::new(self.name.clone(), probe)
            }
            (None, Some(kafka)) => {
                ProbeConfig::new(self.name.clone(), KafkaProbe::new(kafka.settings(&self.name)))
            }
            _ => return Err(ConfigError::CheckKind(self.name.clone())),
        };

        Ok(config
            .with_timeout(self.timeout())
            .skip_on_err(self.skip_on_err))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpCheckConfig {
    pub url: String,
    #[serde(default)]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub expect_body: Option<String>,
}

impl HttpCheckConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KafkaCheckConfig {
    pub bootstrap: Vec<String>,
    /// Prefix of the health topic and consumer group; the check name when absent.
    #[serde(default)]
    pub service_name: Option<String>,
    /// Budget for one produce/consume round trip.
    #[serde(default)]
    pub round_trip_timeout_ms: u64,
    #[serde(default)]
    pub topic: Option<String>,
}

impl KafkaCheckConfig {
    pub fn settings(&self, check_name: &str) -> KafkaSettings {
        let service = self.service_name.as_deref().unwrap_or(check_name);
        let mut settings = KafkaSettings::new(self.bootstrap.clone(), service)
            .with_timeout(Duration::from_millis(self.round_trip_timeout_ms));
        if let Some(topic) = &self.topic {
            settings = settings.with_topic(topic.clone());
        }
        settings
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();

        for (index, check) in self.checks.iter().enumerate() {
            if check.name.is_empty() {
                return Err(ConfigError::EmptyCheckName(index));
            }
            if !seen.insert(check.name.as_str()) {
                return Err(ConfigError::DuplicateCheck(check.name.clone()));
            }
            match (&check.http, &check.kafka) {
                (Some(http), None) => {
                    Url::parse(&http.url).map_err(|source| ConfigError::InvalidUrl {
                        name: check.name.clone(),
                        source,
                    })?;
                }
                (None, Some(kafka)) => {
                    if kafka.bootstrap.iter().all(|b| b.is_empty()) {
                        return Err(ConfigError::EmptyBootstrap(check.name.clone()));
                    }
                }
                _ => return Err(ConfigError::CheckKind(check.name.clone())),
            }
        }

        if !self.metrics.path.starts_with('/') {
            return Err(ConfigError::InvalidMetricsPath(self.metrics.path.clone()));
        }

        Ok(())
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}
