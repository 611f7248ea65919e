//! Best-effort `event-created` notifications over the Dapr sidecar HTTP API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_config::{ConfigError, FromEnv, env_or_default, env_parse_or_default};
use database::RetryConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{EventError, EventResult};
use crate::models::Event;

/// Payload published to the events topic when an event is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCreatedMessage {
    pub event_id: Uuid,
    pub title: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Event> for EventCreatedMessage {
    fn from(event: &Event) -> Self {
        Self {
            event_id: event.id,
            title: event.title.clone(),
            created_by: event.created_by.clone(),
            created_at: event.created_at,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_event_created(&self, message: &EventCreatedMessage) -> EventResult<()>;
}

/// Sidecar settings
///
/// Environment variables:
/// - `PUBSUB_ENABLED` (default: true)
/// - `DAPR_HTTP_PORT` (default: 3500)
/// - `DAPR_PUBSUB_NAME` (default: events-pubsub)
/// - `EVENTS_TOPIC` (default: event-created)
#[derive(Debug, Clone, PartialEq)]
pub struct DaprConfig {
    pub enabled: bool,
    pub http_port: u16,
    pub pubsub_name: String,
    pub topic: String,
}

impl DaprConfig {
    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.http_port)
    }
}

impl Default for DaprConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            http_port: 3500,
            pubsub_name: "events-pubsub".to_string(),
            topic: "event-created".to_string(),
        }
    }
}

impl FromEnv for DaprConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: env_parse_or_default("PUBSUB_ENABLED", "true")?,
            http_port: env_parse_or_default("DAPR_HTTP_PORT", "3500")?,
            pubsub_name: env_or_default("DAPR_PUBSUB_NAME", "events-pubsub"),
            topic: env_or_default("EVENTS_TOPIC", "event-created"),
        })
    }
}

/// Thin client for the sidecar's pub/sub and health endpoints
#[derive(Clone)]
pub struct DaprClient {
    client: reqwest::Client,
    base_url: String,
    pubsub_name: String,
}

impl DaprClient {
    pub fn new(base_url: impl Into<String>, pubsub_name: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            pubsub_name: pubsub_name.into(),
        }
    }

    pub fn from_config(config: &DaprConfig) -> Self {
        Self::new(config.base_url(), config.pubsub_name.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `data` as JSON to `/v1.0/publish/{pubsub}/{topic}`
    #[instrument(skip(self, data), fields(topic = %topic))]
    pub async fn publish<T: Serialize + Sync>(&self, topic: &str, data: &T) -> EventResult<()> {
        let url = format!(
            "{}/v1.0/publish/{}/{}",
            self.base_url, self.pubsub_name, topic
        );

        let response = self
            .client
            .post(&url)
            .json(data)
            .send()
            .await
            .map_err(|e| EventError::Publish(format!("Failed to publish to {}: {}", topic, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EventError::Publish(format!(
                "Publish failed with status {}: {}",
                status, body
            )));
        }

        Ok(())
    }

    /// Sidecar health (`/v1.0/healthz`)
    pub async fn health(&self) -> EventResult<bool> {
        let url = format!("{}/v1.0/healthz", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EventError::Publish(format!("Health check failed: {}", e)))?;

        Ok(response.status().is_success())
    }
}

/// Publishes [`EventCreatedMessage`]s to one topic, retrying with backoff.
pub struct DaprEventPublisher {
    dapr: DaprClient,
    topic: String,
    retry: RetryConfig,
}

impl DaprEventPublisher {
    /// Retry policy: 3 retries, 200ms initial delay, 2s cap, jittered.
    pub fn new(dapr: DaprClient, topic: impl Into<String>) -> Self {
        Self {
            dapr,
            topic: topic.into(),
            retry: RetryConfig::new()
                .with_max_retries(3)
                .with_initial_delay(200)
                .with_max_delay(2000),
        }
    }

    pub fn from_config(config: &DaprConfig) -> Self {
        Self::new(DaprClient::from_config(config), config.topic.clone())
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl EventPublisher for DaprEventPublisher {
    #[instrument(skip(self, message), fields(event_id = %message.event_id))]
    async fn publish_event_created(&self, message: &EventCreatedMessage) -> EventResult<()> {
        database::retry_with_backoff(
            || self.dapr.publish(&self.topic, message),
            self.retry.clone(),
        )
        .await?;

        info!(topic = %self.topic, "Published event-created notification");
        Ok(())
    }
}

/// Records published messages instead of sending them (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryEventPublisher {
    messages: Arc<RwLock<Vec<EventCreatedMessage>>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<EventCreatedMessage> {
        self.messages.read().await.clone()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish_event_created(&self, message: &EventCreatedMessage) -> EventResult<()> {
        self.messages.write().await.push(message.clone());
        Ok(())
    }
}

/// Fire-and-forget publish; failures are logged and never reach the caller.
pub(crate) fn spawn_publish(publisher: Arc<dyn EventPublisher>, event: &Event) {
    let message = EventCreatedMessage::from(event);
    tokio::spawn(async move {
        if let Err(e) = publisher.publish_event_created(&message).await {
            warn!(event_id = %message.event_id, error = %e, "Failed to publish event-created notification");
        }
    });
}
