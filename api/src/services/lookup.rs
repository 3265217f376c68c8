//! Current-weather lookup orchestration.
//!
//! 1. Derive the [`LocationKey`] and check the result cache.
//! 2. On a miss, fetch through the provider fallback chain. This is the only
//!    step whose failure fails the lookup.
//! 3. After a provider fetch, write the cache and store the raw observation.
//! 4. For an identified user, append to their history, trim it, and publish
//!    a `WeatherSearched` event (cache hits included).
//!
//! Every write after step 2 runs in its own error boundary: failures are
//! logged and never change the lookup result or stop sibling writes.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use crate::services::cache::ResultCache;
use crate::services::events::{DomainEvent, EventPublisherRef};
use crate::services::fallback::ProviderFallbackManager;
use crate::services::history::HistoryLedger;
use crate::services::observations::ObservationStore;
use crate::services::weather::{LocationKey, LocationQuery, WeatherResult};

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Invalid location: {0}")]
    InvalidQuery(String),

    #[error(
        "Weather data for {location} is currently unavailable from all providers \
         ({attempted} attempted). Please try again later."
    )]
    AllProvidersFailed { location: String, attempted: usize },
}

/// Result of a lookup and where it came from.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LookupOutcome {
    pub weather: WeatherResult,
    /// True when served from the result cache without calling any provider
    pub from_cache: bool,
}

/// Tunables for the write-through side effects.
#[derive(Debug, Clone, Copy)]
pub struct LookupSettings {
    pub cache_ttl: Duration,
    /// Entries kept per user after each append
    pub history_retention: usize,
}

#[derive(Debug, Clone)]
pub struct WeatherLookupOrchestrator {
    providers: ProviderFallbackManager,
    cache: ResultCache,
    history: HistoryLedger,
    observations: Arc<dyn ObservationStore>,
    events: EventPublisherRef,
    settings: LookupSettings,
}

impl WeatherLookupOrchestrator {
    pub fn new(
        providers: ProviderFallbackManager,
        cache: ResultCache,
        history: HistoryLedger,
        observations: Arc<dyn ObservationStore>,
        events: EventPublisherRef,
        settings: LookupSettings,
    ) -> Self {
        Self {
            providers,
            cache,
            history,
            observations,
            events,
            settings,
        }
    }

    pub fn providers(&self) -> &ProviderFallbackManager {
        &self.providers
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.history
    }

    /// Current weather for `query`, recorded against `user_id` when given.
    pub async fn lookup(
        &self,
        query: &LocationQuery,
        user_id: Option<&str>,
    ) -> Result<LookupOutcome, LookupError> {
        query.validate().map_err(LookupError::InvalidQuery)?;
        let key = LocationKey::from(query);

        let (weather, from_cache) = match self.cache.get(&key).await {
            Some(weather) => {
                tracing::debug!("Cache hit for {}", key);
                (weather, true)
            }
            None => {
                tracing::debug!("Cache miss for {}", key);
                let weather = self.providers.fetch(query).await?;
                futures::join!(
                    self.cache.set(&key, &weather, self.settings.cache_ttl),
                    self.record_observation(&key, &weather),
                );
                (weather, false)
            }
        };

        match user_id {
            Some(user_id) => {
                futures::join!(
                    self.record_history(user_id, &weather),
                    self.publish_searched(user_id, &weather),
                );
            }
            None => tracing::debug!("Anonymous lookup for {}, skipping history", key),
        }

        Ok(LookupOutcome {
            weather,
            from_cache,
        })
    }

    async fn record_observation(&self, key: &LocationKey, weather: &WeatherResult) {
        if let Err(e) = self.observations.record(key, weather).await {
            tracing::warn!("Failed to store observation for {}: {}", key, e);
        }
    }

    /// Append then trim; the trim runs even if the append failed.
    async fn record_history(&self, user_id: &str, weather: &WeatherResult) {
        if let Err(e) = self.history.append(user_id, weather).await {
            tracing::warn!("Failed to append history for user {}: {}", user_id, e);
        }
        if let Err(e) = self
            .history
            .trim_to(user_id, self.settings.history_retention)
            .await
        {
            tracing::warn!("Failed to trim history for user {}: {}", user_id, e);
        }
    }

    async fn publish_searched(&self, user_id: &str, weather: &WeatherResult) {
        let event =
            DomainEvent::weather_searched(user_id, &weather.city, weather.country.as_deref());
        if let Err(e) = self.events.publish(event).await {
            tracing::warn!("Failed to publish search event for user {}: {}", user_id, e);
        }
    }
}
