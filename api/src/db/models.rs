use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

/// Cached lookup result, keyed by normalized location.
/// `expires_at` decides validity; expired rows are ignored on read.
#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)] // All fields populated by FromRow; only payload is read back
pub struct CachedWeather {
    pub cache_key: String,
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// One search made by a user, with the weather snapshot at that time.
#[derive(Debug, Clone, FromRow)]
pub struct SearchHistory {
    pub id: Uuid,
    pub user_id: String,
    pub city: String,
    pub country: Option<String>,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub temperature_c: Decimal,
    pub description: String,
    pub humidity_pct: Decimal,
    pub wind_speed_kmh: Decimal,
    pub searched_at: DateTime<Utc>,
}
