//! Multi-day forecast lookups (Open-Meteo only).
//!
//! Forecasts bypass the result cache and are not recorded in history.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::services::providers::{OpenMeteoProvider, ProviderError};
use crate::services::weather::LocationQuery;

/// Daily extremes for one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub temperature_max_c: Option<f64>,
    pub temperature_min_c: Option<f64>,
    pub uv_index_max: Option<f64>,
}

/// Forecast readings for one hour.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HourlyForecast {
    pub time: DateTime<Utc>,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    /// Wind speed at 10 m in km/h
    pub wind_speed_kmh: Option<f64>,
}

/// Multi-day forecast for a resolved location.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Forecast {
    pub city: String,
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub daily: Vec<DailyForecast>,
    pub hourly: Vec<HourlyForecast>,
}

#[derive(Debug, Clone)]
pub struct ForecastService {
    provider: OpenMeteoProvider,
}

impl ForecastService {
    pub fn new(provider: OpenMeteoProvider) -> Self {
        Self { provider }
    }

    pub async fn forecast(&self, query: &LocationQuery) -> Result<Forecast, AppError> {
        query.validate().map_err(AppError::BadRequest)?;

        self.provider
            .fetch_forecast(query)
            .await
            .map_err(|e| match e {
                ProviderError::NotFound(location) => {
                    AppError::NotFound(format!("Location not found: {}", location))
                }
                other => {
                    tracing::warn!("Forecast for {} failed: {}", query.describe(), other);
                    AppError::ExternalServiceError(format!(
                        "Forecast provider unavailable: {}",
                        other
                    ))
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn service_for(server: &MockServer) -> ForecastService {
        ForecastService::new(OpenMeteoProvider::new(
            reqwest::Client::new(),
            &server.uri(),
            &server.uri(),
        ))
    }

    #[tokio::test]
    async fn test_invalid_query_is_bad_request() {
        let server = MockServer::start().await;
        let service = service_for(&server).await;

        let err = service
            .forecast(&LocationQuery::Coordinates {
                latitude: 0.0,
                longitude: 200.0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_unknown_city_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        let service = service_for(&server).await;

        let err = service
            .forecast(&LocationQuery::City {
                city: "Atlantis".to_string(),
                country: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_upstream_error_is_external_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        let service = service_for(&server).await;

        let err = service
            .forecast(&LocationQuery::City {
                city: "Tokyo".to_string(),
                country: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExternalServiceError(_)));
    }
}
