// src/checks/kafka.rs
use crate::health::Probe;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[cfg(feature = "kafka")]
use anyhow::Context;
#[cfg(feature = "kafka")]
use rdkafka::{
    admin::{AdminClient, AdminOptions},
    client::DefaultClientContext,
    consumer::{Consumer, StreamConsumer},
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
    ClientConfig, Message,
};
#[cfg(feature = "kafka")]
use tracing::{debug, warn};

pub const DEFAULT_KAFKA_TIMEOUT: Duration = Duration::from_secs(5);

const MESSAGE_LEN: usize = 10;
const NOT_RECEIVED: &str = "could not get sent message";

/// Where and how long a produce/consume round trip runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaSettings {
    pub bootstrap: Vec<String>,
    pub service_name: String,
    /// Budget for one round trip; zero keeps [`DEFAULT_KAFKA_TIMEOUT`].
    pub timeout: Duration,
    pub custom_topic: Option<String>,
}

impl KafkaSettings {
    pub fn new(bootstrap: Vec<String>, service_name: impl Into<String>) -> Self {
        Self {
            bootstrap,
            service_name: service_name.into(),
            timeout: DEFAULT_KAFKA_TIMEOUT,
            custom_topic: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.timeout = timeout;
        }
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        self.custom_topic = (!topic.is_empty()).then_some(topic);
        self
    }

    pub fn topic(&self) -> String {
        match &self.custom_topic {
            Some(topic) => topic.clone(),
            None => format!("{}.health-check-topic", self.service_name),
        }
    }

    pub fn group_id(&self) -> String {
        format!("{}.health-check-consumer-group", self.service_name)
    }

    pub fn bootstrap_servers(&self) -> String {
        self.bootstrap.join(",")
    }

    pub fn deadline(&self, started: Instant) -> Instant {
        started + self.timeout
    }
}

/// Time left until `deadline`, or the "message never came back" error.
#[cfg_attr(not(feature = "kafka"), allow(dead_code))]
fn remaining(deadline: Instant) -> Result<Duration> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        Err(anyhow!(NOT_RECEIVED))
    } else {
        Ok(left)
    }
}

#[cfg_attr(not(feature = "kafka"), allow(dead_code))]
fn random_message() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(MESSAGE_LEN)
        .map(char::from)
        .collect()
}

/// Checks a Kafka cluster by producing a random message to the health topic
/// and consuming it back before the deadline. The topic is deleted once the
/// round trip is over.
#[derive(Debug, Clone)]
pub struct KafkaProbe {
    settings: KafkaSettings,
}

impl KafkaProbe {
    pub fn new(settings: KafkaSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &KafkaSettings {
        &self.settings
    }

    #[cfg(feature = "kafka")]
    fn client_config(&self) -> ClientConfig {
        let timeout_ms = self.settings.timeout.as_millis().to_string();
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", self.settings.bootstrap_servers())
            .set("socket.timeout.ms", &timeout_ms)
            .set("message.timeout.ms", &timeout_ms);
        config
    }

    #[cfg(feature = "kafka")]
    fn consumer_config(&self) -> ClientConfig {
        let mut config = self.client_config();
        config
            .set("group.id", self.settings.group_id())
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "true")
            .set("enable.partition.eof", "false");
        config
    }

    #[cfg(feature = "kafka")]
    async fn round_trip(&self, topic: &str, message: &str, deadline: Instant) -> Result<()> {
        let consumer: StreamConsumer = self
            .consumer_config()
            .create()
            .context("cannot create consumer")?;
        consumer
            .subscribe(&[topic])
            .context("cannot create consumer")?;

        let producer: FutureProducer = self
            .client_config()
            .create()
            .context("cannot create kafka producer")?;
        producer
            .send(
                FutureRecord::to(topic).key("health-check").payload(message),
                Timeout::After(remaining(deadline)?),
            )
            .await
            .map_err(|(e, _)| e)
            .context("cannot produce message to kafka topic")?;

        loop {
            let received = tokio::time::timeout(remaining(deadline)?, consumer.recv())
                .await
                .map_err(|_| anyhow!(NOT_RECEIVED))?
                .context("cannot consume from kafka topic")?;
            if received.payload() == Some(message.as_bytes()) {
                return Ok(());
            }
            debug!("Skipping foreign message on {}", topic);
        }
    }

    #[cfg(feature = "kafka")]
    async fn delete_topic(&self, topic: &str) {
        let admin: AdminClient<DefaultClientContext> = match self.client_config().create() {
            Ok(admin) => admin,
            Err(e) => {
                warn!("cannot create cluster admin: {}", e);
                return;
            }
        };
        let options = AdminOptions::new()
            .operation_timeout(Some(self.settings.timeout))
            .request_timeout(Some(self.settings.timeout));
        match tokio::time::timeout(self.settings.timeout, admin.delete_topics(&[topic], &options))
            .await
        {
            Ok(Ok(_)) => debug!("Deleted health check topic {}", topic),
            Ok(Err(e)) => warn!("could not delete generated topic {}: {}", topic, e),
            Err(_) => warn!("deleting generated topic {} timed out", topic),
        }
    }
}

#[cfg(feature = "kafka")]
#[async_trait]
impl Probe for KafkaProbe {
    async fn check(&self, ctx: CancellationToken) -> Result<()> {
        let topic = self.settings.topic();
        let message = random_message();
        let deadline = self.settings.deadline(Instant::now());

        let result = tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(anyhow!("health check cancelled")),
            result = self.round_trip(&topic, &message, deadline) => result,
        };
        self.delete_topic(&topic).await;
        result
    }
}

#[cfg(not(feature = "kafka"))]
#[async_trait]
impl Probe for KafkaProbe {
    async fn check(&self, _ctx: CancellationToken) -> Result<()> {
        Err(anyhow!(
            "kafka check {} needs the `kafka` feature",
            self.settings.topic()
        ))
    }
}
