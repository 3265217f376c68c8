//! Per-user search history.
//!
//! Entries are append-only snapshots of the weather a user looked up. After
//! each append the ledger is trimmed so a user keeps only their most recent
//! entries. Append and trim are separate calls; concurrent lookups for the
//! same user can briefly exceed the retention count until the next trim.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt::Debug;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::SearchHistory;
use crate::db::queries::{self, InsertHistoryParams};
use crate::errors::StoreError;
use crate::helpers::{dec_to_f64, opt_coordinate_to_decimal, opt_dec_to_f64, reading_to_decimal};
use crate::services::weather::WeatherResult;

/// Upper bound (and default) for how many entries a history listing returns.
pub const MAX_HISTORY_LIMIT: usize = 5;

/// One lookup recorded for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub user_id: String,
    pub city: String,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub temperature_c: f64,
    pub description: String,
    pub humidity_pct: f64,
    pub wind_speed_kmh: f64,
    pub searched_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Snapshot of `weather` searched by `user_id` now.
    pub fn new(user_id: &str, weather: &WeatherResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            city: weather.city.clone(),
            country: weather.country.clone(),
            latitude: weather.latitude,
            longitude: weather.longitude,
            temperature_c: weather.temperature_c,
            description: weather.description.clone(),
            humidity_pct: weather.humidity_pct,
            wind_speed_kmh: weather.wind_speed_kmh,
            searched_at: Utc::now(),
        }
    }
}

impl From<SearchHistory> for HistoryEntry {
    fn from(row: SearchHistory) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            city: row.city,
            country: row.country,
            latitude: opt_dec_to_f64(row.latitude),
            longitude: opt_dec_to_f64(row.longitude),
            temperature_c: dec_to_f64(row.temperature_c),
            description: row.description,
            humidity_pct: dec_to_f64(row.humidity_pct),
            wind_speed_kmh: dec_to_f64(row.wind_speed_kmh),
            searched_at: row.searched_at,
        }
    }
}

#[async_trait]
pub trait HistoryStore: Send + Sync + Debug {
    async fn append(&self, entry: HistoryEntry) -> Result<HistoryEntry, StoreError>;

    /// Newest first, at most `limit` entries.
    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryEntry>, StoreError>;

    /// Delete all but the `keep` newest entries. Returns how many were removed.
    async fn retain_recent(&self, user_id: &str, keep: usize) -> Result<u64, StoreError>;

    /// Delete every entry for the user. Returns how many were removed.
    async fn purge(&self, user_id: &str) -> Result<u64, StoreError>;
}

/// History rows in the `search_history` table.
#[derive(Debug, Clone)]
pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append(&self, entry: HistoryEntry) -> Result<HistoryEntry, StoreError> {
        let row = queries::insert_history_entry(
            &self.pool,
            InsertHistoryParams {
                id: entry.id,
                user_id: &entry.user_id,
                city: &entry.city,
                country: entry.country.as_deref(),
                latitude: opt_coordinate_to_decimal(entry.latitude),
                longitude: opt_coordinate_to_decimal(entry.longitude),
                temperature_c: reading_to_decimal(entry.temperature_c),
                description: &entry.description,
                humidity_pct: reading_to_decimal(entry.humidity_pct),
                wind_speed_kmh: reading_to_decimal(entry.wind_speed_kmh),
                searched_at: entry.searched_at,
            },
        )
        .await?;
        Ok(row.into())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        let rows = queries::get_recent_history(&self.pool, user_id, limit as i64).await?;
        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }

    async fn retain_recent(&self, user_id: &str, keep: usize) -> Result<u64, StoreError> {
        Ok(queries::trim_history(&self.pool, user_id, keep as i64).await?)
    }

    async fn purge(&self, user_id: &str) -> Result<u64, StoreError> {
        Ok(queries::delete_history(&self.pool, user_id).await?)
    }
}

/// Process-local history, in append order per user.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    entries: tokio::sync::RwLock<std::collections::HashMap<String, Vec<HistoryEntry>>>,
}

#[cfg(test)]
impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries held for `user_id`, regardless of any listing limit.
    pub async fn stored_count(&self, user_id: &str) -> usize {
        self.entries.read().await.get(user_id).map_or(0, Vec::len)
    }
}

/// Newest first; ties on `searched_at` keep the later append first.
#[cfg(test)]
fn newest_first(entries: &[HistoryEntry]) -> Vec<HistoryEntry> {
    let mut sorted: Vec<HistoryEntry> = entries.iter().rev().cloned().collect();
    sorted.sort_by(|a, b| b.searched_at.cmp(&a.searched_at));
    sorted
}

#[cfg(test)]
#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, entry: HistoryEntry) -> Result<HistoryEntry, StoreError> {
        self.entries
            .write()
            .await
            .entry(entry.user_id.clone())
            .or_default()
            .push(entry.clone());
        Ok(entry)
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        let entries = self.entries.read().await;
        let mut recent = entries
            .get(user_id)
            .map(|e| newest_first(e))
            .unwrap_or_default();
        recent.truncate(limit);
        Ok(recent)
    }

    async fn retain_recent(&self, user_id: &str, keep: usize) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let Some(user_entries) = entries.get_mut(user_id) else {
            return Ok(0);
        };
        let before = user_entries.len();
        let mut kept = newest_first(user_entries);
        kept.truncate(keep);
        // Store back in append order (oldest first)
        kept.reverse();
        *user_entries = kept;
        Ok((before - user_entries.len()) as u64)
    }

    async fn purge(&self, user_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .entries
            .write()
            .await
            .remove(user_id)
            .map(|e| e.len() as u64)
            .unwrap_or(0))
    }
}

#[derive(Debug, Clone)]
pub struct HistoryLedger {
    store: Arc<dyn HistoryStore>,
}

impl HistoryLedger {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Record that `user_id` looked up `weather`.
    pub async fn append(
        &self,
        user_id: &str,
        weather: &WeatherResult,
    ) -> Result<HistoryEntry, StoreError> {
        self.store.append(HistoryEntry::new(user_id, weather)).await
    }

    /// Keep only the `keep` most recent entries for the user.
    pub async fn trim_to(&self, user_id: &str, keep: usize) -> Result<u64, StoreError> {
        let removed = self.store.retain_recent(user_id, keep).await?;
        if removed > 0 {
            tracing::debug!(
                "Trimmed {} old history entries for user {}",
                removed,
                user_id
            );
        }
        Ok(removed)
    }

    /// Newest-first history. `limit` is capped at [`MAX_HISTORY_LIMIT`];
    /// 0 means the default.
    pub async fn list_recent(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let limit = match limit {
            0 => MAX_HISTORY_LIMIT,
            n => n.min(MAX_HISTORY_LIMIT),
        };
        self.store.recent(user_id, limit).await
    }

    pub async fn purge(&self, user_id: &str) -> Result<u64, StoreError> {
        self.store.purge(user_id).await
    }
}
