// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config = parse_config(&contents, is_yaml(path))?;
    config.validate()?;
    Ok(config)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn parse_config(contents: &str, yaml: bool) -> Result<Config> {
    let config = if yaml {
        serde_yaml::from_str(contents).context("Failed to parse YAML config")?
    } else {
        serde_json::from_str(contents).context("Failed to parse JSON config")?
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::Collection;
    use std::time::Duration;

    const YAML: &str = r#"
server:
  listen: "127.0.0.1:9000"
collection: sequential
checks:
  - name: upstream
    timeout_ms: 1500
    skip_on_err: true
    http:
      url: "http://localhost:8080/health"
      expect_body: "ok"
  - name: auth
    http:
      url: "http://localhost:8081/"
  - name: events
    timeout_ms: 8000
    kafka:
      bootstrap: ["kafka-1:9092", "kafka-2:9092"]
      service_name: billing
      round_trip_timeout_ms: 6000
"#;

    #[test]
    fn test_parse_yaml() {
        let config = parse_config(YAML, true).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.listen.port(), 9000);
        assert_eq!(config.collection, Collection::Sequential);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.path, "/metrics");
        assert_eq!(config.checks.len(), 3);

        let upstream = &config.checks[0];
        assert_eq!(upstream.timeout(), Duration::from_millis(1500));
        assert!(upstream.skip_on_err);
        assert_eq!(
            upstream.http.as_ref().unwrap().expect_body.as_deref(),
            Some("ok")
        );

        let auth = &config.checks[1];
        assert_eq!(auth.timeout(), Duration::ZERO);
        assert!(!auth.skip_on_err);

        let probe = upstream.to_probe().unwrap();
        assert_eq!(probe.name, "upstream");
        assert_eq!(probe.timeout, Duration::from_millis(1500));
        assert!(probe.skip_on_err);

        let events = &config.checks[2];
        assert_eq!(events.target(), "kafka://kafka-1:9092,kafka-2:9092");
        let settings = events.kafka.as_ref().unwrap().settings(&events.name);
        assert_eq!(settings.topic(), "billing.health-check-topic");
        assert_eq!(settings.timeout, Duration::from_millis(6000));
        assert_eq!(events.to_probe().unwrap().timeout, Duration::from_millis(8000));
    }

    #[test]
    fn test_kafka_defaults_to_check_name() {
        let json = r#"{"tracer": "otel", "checks": [
            {"name": "events", "kafka": {"bootstrap": ["localhost:9092"], "topic": "ops.ping"}}
        ]}"#;
        let config = parse_config(json, false).unwrap();
        config.validate().unwrap();
        assert_eq!(config.tracer, TracerKind::Otel);

        let settings = config.checks[0].kafka.as_ref().unwrap().settings("events");
        assert_eq!(settings.group_id(), "events.health-check-consumer-group");
        assert_eq!(settings.topic(), "ops.ping");
        assert_eq!(settings.timeout, crate::checks::kafka::DEFAULT_KAFKA_TIMEOUT);
    }

    #[test]
    fn test_validate_requires_one_check_kind() {
        let json = r#"{"checks": [{"name": "none"}]}"#;
        let config = parse_config(json, false).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::CheckKind(name)) if name == "none"));
        assert!(matches!(config.checks[0].to_probe(), Err(ConfigError::CheckKind(_))));

        let json = r#"{"checks": [{"name": "both",
            "http": {"url": "http://localhost/"},
            "kafka": {"bootstrap": ["localhost:9092"]}}]}"#;
        let config = parse_config(json, false).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::CheckKind(_))));

        let json = r#"{"checks": [{"name": "k", "kafka": {"bootstrap": []}}]}"#;
        let config = parse_config(json, false).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyBootstrap(name)) if name == "k"));
    }

    #[test]
    fn test_parse_json_defaults() {
        let config = parse_config(r#"{"checks": []}"#, false).unwrap();

        assert_eq!(config.collection, Collection::FanIn);
        assert_eq!(config.tracer, TracerKind::Log);
        assert_eq!(config.server.listen.port(), 3000);
        assert!(config.checks.is_empty());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let json = r#"{"checks": [
            {"name": "a", "http": {"url": "http://localhost/"}},
            {"name": "a", "http": {"url": "http://localhost/"}}
        ]}"#;
        let config = parse_config(json, false).unwrap();

        assert!(matches!(config.validate(), Err(ConfigError::DuplicateCheck(name)) if name == "a"));
    }

    #[test]
    fn test_validate_rejects_bad_url_and_path() {
        let json = r#"{"checks": [{"name": "a", "http": {"url": "::nope"}}]}"#;
        let config = parse_config(json, false).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { .. })));

        let json = r#"{"metrics": {"path": "metrics"}}"#;
        let config = parse_config(json, false).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidMetricsPath(_))));
    }

    #[tokio::test]
    async fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/health.yaml").await.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
