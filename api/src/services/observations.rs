//! Raw observation log for analytics.
//!
//! Every result fetched from a provider is stored once; cache hits are not.

use async_trait::async_trait;
use sqlx::PgPool;
use std::fmt::Debug;

use crate::db::queries::{self, InsertObservationParams};
use crate::errors::StoreError;
use crate::helpers::{opt_coordinate_to_decimal, opt_reading_to_decimal, reading_to_decimal};
use crate::services::weather::{LocationKey, WeatherResult};

#[async_trait]
pub trait ObservationStore: Send + Sync + Debug {
    async fn record(&self, key: &LocationKey, weather: &WeatherResult) -> Result<(), StoreError>;
}

/// Observations in the `weather_observations` table.
#[derive(Debug, Clone)]
pub struct PgObservationStore {
    pool: PgPool,
}

impl PgObservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ObservationStore for PgObservationStore {
    async fn record(&self, key: &LocationKey, weather: &WeatherResult) -> Result<(), StoreError> {
        let raw_result = serde_json::to_value(weather)?;
        let id = queries::insert_observation(
            &self.pool,
            InsertObservationParams {
                location_key: key.as_str(),
                city: &weather.city,
                country: weather.country.as_deref(),
                latitude: opt_coordinate_to_decimal(weather.latitude),
                longitude: opt_coordinate_to_decimal(weather.longitude),
                temperature_c: reading_to_decimal(weather.temperature_c),
                description: &weather.description,
                humidity_pct: reading_to_decimal(weather.humidity_pct),
                wind_speed_kmh: reading_to_decimal(weather.wind_speed_kmh),
                pressure_hpa: opt_reading_to_decimal(weather.pressure_hpa),
                visibility_km: opt_reading_to_decimal(weather.visibility_km),
                uv_index: opt_reading_to_decimal(weather.uv_index),
                observed_at: weather.observed_at,
                raw_result,
            },
        )
        .await?;
        tracing::debug!("Stored observation {} for {}", id, key);
        Ok(())
    }
}

/// Keeps observations in memory for lookup tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryObservationStore {
    observations: tokio::sync::RwLock<Vec<(LocationKey, WeatherResult)>>,
}

#[cfg(test)]
impl MemoryObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.observations.read().await.len()
    }

    pub async fn for_key(&self, key: &LocationKey) -> Vec<WeatherResult> {
        self.observations
            .read()
            .await
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, w)| w.clone())
            .collect()
    }
}

#[cfg(test)]
#[async_trait]
impl ObservationStore for MemoryObservationStore {
    async fn record(&self, key: &LocationKey, weather: &WeatherResult) -> Result<(), StoreError> {
        self.observations
            .write()
            .await
            .push((key.clone(), weather.clone()));
        Ok(())
    }
}
