//! Weather HTTP endpoints.
//!
//! - GET    /api/v1/weather?city=&country=&latitude=&longitude=
//! - GET    /api/v1/weather/history?limit=N
//! - DELETE /api/v1/weather/history
//! - GET    /api/v1/weather/forecast?city=&country=&latitude=&longitude=
//!
//! Users are identified by the `X-User-Id` header, set by the authenticating
//! gateway in front of this service.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::errors::{AppError, ErrorResponse};
use crate::services::forecast::{Forecast, ForecastService};
use crate::services::history::{HistoryEntry, MAX_HISTORY_LIMIT};
use crate::services::lookup::{LookupOutcome, WeatherLookupOrchestrator};
use crate::services::weather::LocationQuery;

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared application state for weather and provider endpoints.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) pool: sqlx::PgPool,
    pub(crate) lookup: WeatherLookupOrchestrator,
    pub(crate) forecasts: ForecastService,
}

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct LocationParams {
    /// City name (e.g. "São Paulo"). Ignored when coordinates are given.
    pub city: Option<String>,
    /// Optional country name or ISO code to disambiguate the city
    pub country: Option<String>,
    /// Latitude in degrees; requires `longitude`
    pub latitude: Option<f64>,
    /// Longitude in degrees; requires `latitude`
    pub longitude: Option<f64>,
}

impl LocationParams {
    fn into_query(self) -> Result<LocationQuery, AppError> {
        LocationQuery::from_parts(self.city, self.country, self.latitude, self.longitude)
            .map_err(AppError::BadRequest)
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct HistoryParams {
    /// Number of entries to return (default and maximum 5)
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    /// Most recent searches, newest first
    pub history: Vec<HistoryEntry>,
}

/// User id from the `X-User-Id` header; blank values count as absent.
fn user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn require_user_id(headers: &HeaderMap) -> Result<String, AppError> {
    user_id(headers).ok_or_else(|| {
        AppError::Unauthorized("X-User-Id header is required for search history".to_string())
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Get the current weather for a city or coordinates.
///
/// Served from cache when a recent result exists, otherwise fetched from the
/// first configured provider that succeeds. When `X-User-Id` is present the
/// search is added to that user's history.
#[utoipa::path(
    get,
    path = "/api/v1/weather",
    tag = "Weather",
    params(
        LocationParams,
        ("X-User-Id" = Option<String>, Header, description = "Caller's user id; enables search history"),
    ),
    responses(
        (status = 200, description = "Current weather", body = LookupOutcome),
        (status = 400, description = "Missing or invalid location", body = ErrorResponse),
        (status = 503, description = "All weather providers failed", body = ErrorResponse),
    )
)]
pub async fn get_weather(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<LocationParams>,
) -> Result<Json<LookupOutcome>, AppError> {
    let query = params.into_query()?;
    let user_id = user_id(&headers);
    let outcome = state.lookup.lookup(&query, user_id.as_deref()).await?;
    Ok(Json(outcome))
}

/// Get the caller's most recent searches, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/weather/history",
    tag = "Weather",
    params(
        HistoryParams,
        ("X-User-Id" = String, Header, description = "Caller's user id"),
    ),
    responses(
        (status = 200, description = "Search history", body = HistoryResponse),
        (status = 401, description = "Missing X-User-Id header", body = ErrorResponse),
    )
)]
pub async fn get_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, AppError> {
    let user_id = require_user_id(&headers)?;
    let limit = params.limit.unwrap_or(MAX_HISTORY_LIMIT);
    let history = state.lookup.history().list_recent(&user_id, limit).await?;
    Ok(Json(HistoryResponse { history }))
}

/// Delete all of the caller's search history.
#[utoipa::path(
    delete,
    path = "/api/v1/weather/history",
    tag = "Weather",
    params(
        ("X-User-Id" = String, Header, description = "Caller's user id"),
    ),
    responses(
        (status = 204, description = "History deleted"),
        (status = 401, description = "Missing X-User-Id header", body = ErrorResponse),
    )
)]
pub async fn delete_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let user_id = require_user_id(&headers)?;
    let removed = state.lookup.history().purge(&user_id).await?;
    tracing::info!("Purged {} history entries for user {}", removed, user_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Get a 5-day forecast (daily extremes and hourly readings).
#[utoipa::path(
    get,
    path = "/api/v1/weather/forecast",
    tag = "Weather",
    params(LocationParams),
    responses(
        (status = 200, description = "Multi-day forecast", body = Forecast),
        (status = 400, description = "Missing or invalid location", body = ErrorResponse),
        (status = 404, description = "Location not found", body = ErrorResponse),
        (status = 502, description = "Forecast provider unavailable", body = ErrorResponse),
    )
)]
pub async fn get_forecast(
    State(state): State<AppState>,
    Query(params): Query<LocationParams>,
) -> Result<Json<Forecast>, AppError> {
    let query = params.into_query()?;
    Ok(Json(state.forecasts.forecast(&query).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_state;
    use crate::services::testing::FakeProvider;
    use crate::services::weather::sample_weather;

    fn headers_with_user(user: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, user.parse().unwrap());
        headers
    }

    fn city_params(city: &str) -> Query<LocationParams> {
        Query(LocationParams {
            city: Some(city.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_user_id_header_is_trimmed_and_blank_is_absent() {
        assert_eq!(user_id(&headers_with_user(" u1 ")), Some("u1".to_string()));
        assert_eq!(user_id(&headers_with_user("   ")), None);
        assert_eq!(user_id(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_get_weather_then_history() {
        let state = test_state(&[FakeProvider::ok("p1", sample_weather("Recife"))]);

        let Json(first) = get_weather(
            State(state.clone()),
            headers_with_user("u1"),
            city_params("Recife"),
        )
        .await
        .unwrap();
        assert!(!first.from_cache);

        let Json(second) = get_weather(
            State(state.clone()),
            headers_with_user("u1"),
            city_params("recife"),
        )
        .await
        .unwrap();
        assert!(second.from_cache);

        let Json(history) = get_history(
            State(state),
            headers_with_user("u1"),
            Query(HistoryParams { limit: Some(50) }),
        )
        .await
        .unwrap();
        assert_eq!(history.history.len(), 2);
    }

    #[tokio::test]
    async fn test_get_weather_requires_location() {
        let state = test_state(&[FakeProvider::ok("p1", sample_weather("Recife"))]);
        let err = get_weather(
            State(state),
            HeaderMap::new(),
            Query(LocationParams::default()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_get_weather_all_failed_is_service_unavailable() {
        let state = test_state(&[FakeProvider::failing("p1")]);
        let err = get_weather(State(state), HeaderMap::new(), city_params("Recife"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_history_requires_user() {
        let state = test_state(&[]);
        let err = get_history(
            State(state.clone()),
            HeaderMap::new(),
            Query(HistoryParams::default()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = delete_history(State(state), HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_delete_history_purges() {
        let state = test_state(&[FakeProvider::ok("p1", sample_weather("Natal"))]);
        let Json(outcome) = get_weather(
            State(state.clone()),
            headers_with_user("u1"),
            city_params("Natal"),
        )
        .await
        .unwrap();
        assert_eq!(outcome.weather.city, "Natal");

        let status = delete_history(State(state.clone()), headers_with_user("u1"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let Json(history) = get_history(
            State(state),
            headers_with_user("u1"),
            Query(HistoryParams::default()),
        )
        .await
        .unwrap();
        assert!(history.history.is_empty());
    }
}
