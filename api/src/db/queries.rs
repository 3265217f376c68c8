use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{CachedWeather, SearchHistory};

/// Parameters for appending a search history record.
pub struct InsertHistoryParams<'a> {
    pub id: Uuid,
    pub user_id: &'a str,
    pub city: &'a str,
    pub country: Option<&'a str>,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub temperature_c: Decimal,
    pub description: &'a str,
    pub humidity_pct: Decimal,
    pub wind_speed_kmh: Decimal,
    pub searched_at: DateTime<Utc>,
}

/// Parameters for inserting a raw observation.
pub struct InsertObservationParams<'a> {
    pub location_key: &'a str,
    pub city: &'a str,
    pub country: Option<&'a str>,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub temperature_c: Decimal,
    pub description: &'a str,
    pub humidity_pct: Decimal,
    pub wind_speed_kmh: Decimal,
    pub pressure_hpa: Option<Decimal>,
    pub visibility_km: Option<Decimal>,
    pub uv_index: Option<Decimal>,
    pub observed_at: DateTime<Utc>,
    pub raw_result: serde_json::Value,
}

// ---------------------------------------------------------------------------
// weather_cache
// ---------------------------------------------------------------------------

/// Get a non-expired cached result for a location key.
pub async fn get_cached_weather(
    pool: &PgPool,
    cache_key: &str,
) -> Result<Option<CachedWeather>, sqlx::Error> {
    sqlx::query_as::<_, CachedWeather>(
        "SELECT cache_key, payload, fetched_at, expires_at
         FROM weather_cache
         WHERE cache_key = $1 AND expires_at > NOW()",
    )
    .bind(cache_key)
    .fetch_optional(pool)
    .await
}

/// Insert or replace the cached result for a location key.
pub async fn upsert_cached_weather(
    pool: &PgPool,
    cache_key: &str,
    payload: &serde_json::Value,
    fetched_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO weather_cache (cache_key, payload, fetched_at, expires_at)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (cache_key) DO UPDATE
         SET payload = EXCLUDED.payload,
             fetched_at = EXCLUDED.fetched_at,
             expires_at = EXCLUDED.expires_at",
    )
    .bind(cache_key)
    .bind(payload)
    .bind(fetched_at)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_cached_weather(pool: &PgPool, cache_key: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM weather_cache WHERE cache_key = $1")
        .bind(cache_key)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete every expired cache row. Returns the number of rows removed.
pub async fn purge_expired_cache(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM weather_cache WHERE expires_at <= NOW()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// search_history
// ---------------------------------------------------------------------------

/// Append a history record (never updated afterwards).
pub async fn insert_history_entry(
    pool: &PgPool,
    params: InsertHistoryParams<'_>,
) -> Result<SearchHistory, sqlx::Error> {
    sqlx::query_as::<_, SearchHistory>(
        "INSERT INTO search_history (
            id, user_id, city, country, latitude, longitude,
            temperature_c, description, humidity_pct, wind_speed_kmh, searched_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id, user_id, city, country, latitude, longitude,
                  temperature_c, description, humidity_pct, wind_speed_kmh, searched_at",
    )
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.city)
    .bind(params.country)
    .bind(params.latitude)
    .bind(params.longitude)
    .bind(params.temperature_c)
    .bind(params.description)
    .bind(params.humidity_pct)
    .bind(params.wind_speed_kmh)
    .bind(params.searched_at)
    .fetch_one(pool)
    .await
}

/// Most recent history entries for a user, newest first.
pub async fn get_recent_history(
    pool: &PgPool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<SearchHistory>, sqlx::Error> {
    sqlx::query_as::<_, SearchHistory>(
        "SELECT id, user_id, city, country, latitude, longitude,
                temperature_c, description, humidity_pct, wind_speed_kmh, searched_at
         FROM search_history
         WHERE user_id = $1
         ORDER BY searched_at DESC
         LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Delete all but the `keep` most recent entries for a user.
/// Returns the number of rows removed.
pub async fn trim_history(pool: &PgPool, user_id: &str, keep: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM search_history
         WHERE user_id = $1
           AND id NOT IN (
               SELECT id FROM search_history
               WHERE user_id = $1
               ORDER BY searched_at DESC
               LIMIT $2
           )",
    )
    .bind(user_id)
    .bind(keep)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Delete every history entry for a user.
pub async fn delete_history(pool: &PgPool, user_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM search_history WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// weather_observations
// ---------------------------------------------------------------------------

/// Insert a raw observation (append-only). Returns the new row id.
pub async fn insert_observation(
    pool: &PgPool,
    params: InsertObservationParams<'_>,
) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO weather_observations (
            id, location_key, city, country, latitude, longitude,
            temperature_c, description, humidity_pct, wind_speed_kmh,
            pressure_hpa, visibility_km, uv_index, observed_at, raw_result, created_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6,
            $7, $8, $9, $10,
            $11, $12, $13, $14, $15, NOW()
        )
        RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(params.location_key)
    .bind(params.city)
    .bind(params.country)
    .bind(params.latitude)
    .bind(params.longitude)
    .bind(params.temperature_c)
    .bind(params.description)
    .bind(params.humidity_pct)
    .bind(params.wind_speed_kmh)
    .bind(params.pressure_hpa)
    .bind(params.visibility_km)
    .bind(params.uv_index)
    .bind(params.observed_at)
    .bind(params.raw_result)
    .fetch_one(pool)
    .await
}
