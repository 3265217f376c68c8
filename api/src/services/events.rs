//! Domain event publishing.
//!
//! Events go out on an in-process broadcast channel. Publishing is
//! fire-and-forget: having no subscribers is normal, and a slow subscriber
//! only loses its own backlog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Event type emitted after a user looks up the weather.
pub const WEATHER_SEARCHED: &str = "WeatherSearched";

/// Default number of events buffered per subscriber.
pub const EVENT_BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_type: String,
    /// The entity the event is about (the user id for lookups)
    pub aggregate_id: String,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn weather_searched(user_id: &str, city: &str, country: Option<&str>) -> Self {
        Self {
            event_type: WEATHER_SEARCHED.to_string(),
            aggregate_id: user_id.to_string(),
            payload: serde_json::json!({ "city": city, "country": country }),
            occurred_at: Utc::now(),
        }
    }

    /// Every event must name its type and the entity it is about.
    fn check(&self) -> Result<(), PublishError> {
        if self.event_type.trim().is_empty() {
            return Err(PublishError::Rejected("missing event type".to_string()));
        }
        if self.aggregate_id.trim().is_empty() {
            return Err(PublishError::Rejected("missing aggregate id".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("event rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait EventPublisher: Send + Sync + Debug {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError>;
}

/// Shared event publisher handle.
pub type EventPublisherRef = Arc<dyn EventPublisher>;

#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventBus {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        event.check()?;
        // send() only fails when nobody is listening
        if self.sender.send(event).is_err() {
            tracing::trace!("Event published with no subscribers");
        }
        Ok(())
    }
}

/// Subscribe to `bus` and log every event until the bus is dropped.
pub fn spawn_event_logger(bus: &BroadcastEventBus) -> JoinHandle<()> {
    let mut receiver = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    tracing::info!(
                        event_type = %event.event_type,
                        aggregate_id = %event.aggregate_id,
                        "Domain event: {}",
                        event.payload
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event logger lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
