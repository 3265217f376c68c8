//! Scripted providers and failing stores shared by service tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::errors::StoreError;
use crate::services::cache::CacheStore;
use crate::services::events::{DomainEvent, EventPublisher, PublishError};
use crate::services::history::{HistoryEntry, HistoryStore};
use crate::services::observations::ObservationStore;
use crate::services::providers::{ProviderError, ProviderRef, WeatherProvider};
use crate::services::weather::{LocationKey, LocationQuery, WeatherResult};

#[derive(Debug)]
enum Script {
    Succeed(WeatherResult),
    Fail,
}

/// Provider returning a fixed result and counting how often it was called.
#[derive(Debug)]
pub(crate) struct FakeProvider {
    name: &'static str,
    available: bool,
    script: Script,
    calls: AtomicUsize,
}

impl FakeProvider {
    fn build(name: &'static str, available: bool, script: Script) -> Arc<Self> {
        Arc::new(Self {
            name,
            available,
            script,
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn ok(name: &'static str, weather: WeatherResult) -> Arc<Self> {
        Self::build(name, true, Script::Succeed(weather))
    }

    pub(crate) fn failing(name: &'static str) -> Arc<Self> {
        Self::build(name, true, Script::Fail)
    }

    pub(crate) fn unavailable(name: &'static str) -> Arc<Self> {
        Self::build(name, false, Script::Fail)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherProvider for FakeProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn fetch(&self, _query: &LocationQuery) -> Result<WeatherResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Succeed(weather) => Ok(weather.clone()),
            Script::Fail => Err(ProviderError::Status {
                status: 503,
                body: format!("{} scripted failure", self.name),
            }),
        }
    }
}

pub(crate) fn as_providers(fakes: &[Arc<FakeProvider>]) -> Vec<ProviderRef> {
    fakes.iter().map(|f| f.clone() as ProviderRef).collect()
}

fn unavailable() -> StoreError {
    StoreError::Unavailable("connection refused".to_string())
}

#[derive(Debug)]
pub(crate) struct FailingCacheStore;

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn get(&self, _key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Err(unavailable())
    }

    async fn set(
        &self,
        _key: &str,
        _value: serde_json::Value,
        _ttl: Duration,
    ) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        Err(unavailable())
    }
}

#[derive(Debug)]
pub(crate) struct FailingHistoryStore;

#[async_trait]
impl HistoryStore for FailingHistoryStore {
    async fn append(&self, _entry: HistoryEntry) -> Result<HistoryEntry, StoreError> {
        Err(unavailable())
    }

    async fn recent(&self, _user_id: &str, _limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        Err(unavailable())
    }

    async fn retain_recent(&self, _user_id: &str, _keep: usize) -> Result<u64, StoreError> {
        Err(unavailable())
    }

    async fn purge(&self, _user_id: &str) -> Result<u64, StoreError> {
        Err(unavailable())
    }
}

#[derive(Debug)]
pub(crate) struct FailingObservationStore;

#[async_trait]
impl ObservationStore for FailingObservationStore {
    async fn record(&self, _key: &LocationKey, _weather: &WeatherResult) -> Result<(), StoreError> {
        Err(unavailable())
    }
}

/// Publisher that keeps every event for inspection.
#[derive(Debug, Default)]
pub(crate) struct RecordingPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingPublisher {
    pub(crate) async fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _event: DomainEvent) -> Result<(), PublishError> {
        Err(PublishError::Rejected("broker unreachable".to_string()))
    }
}
