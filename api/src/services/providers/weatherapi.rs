//! WeatherAPI.com current-conditions client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{error_for_status, ProviderError, WeatherProvider};
use crate::services::weather::{LocationQuery, WeatherResult};

const NAME: &str = "weatherapi";

/// WeatherAPI error code for "No matching location found".
const NO_LOCATION_ERROR_CODE: i64 = 1006;

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    location: WaLocation,
    current: WaCurrent,
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    country: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    last_updated_epoch: Option<i64>,
    temp_c: f64,
    condition: WaCondition,
    humidity: f64,
    wind_kph: f64,
    pressure_mb: Option<f64>,
    vis_km: Option<f64>,
    uv: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaErrorBody {
    error: WaError,
}

#[derive(Debug, Deserialize)]
struct WaError {
    code: i64,
    message: String,
}

impl WeatherApiProvider {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
        }
    }
}

fn query_string(query: &LocationQuery) -> String {
    match query {
        LocationQuery::City {
            city,
            country: Some(country),
        } => format!("{},{}", city.trim(), country),
        LocationQuery::City {
            city,
            country: None,
        } => city.trim().to_string(),
        LocationQuery::Coordinates {
            latitude,
            longitude,
        } => format!("{},{}", latitude, longitude),
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn fetch(&self, query: &LocationQuery) -> Result<WeatherResult, ProviderError> {
        if !self.is_available() {
            return Err(ProviderError::NotConfigured { provider: NAME });
        }

        let url = format!("{}/current.json", self.base_url);
        let q = query_string(query);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", q.as_str()),
                ("aqi", "no"),
            ])
            .send()
            .await?;

        // WeatherAPI answers unknown locations with 400 + error code 1006
        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return match serde_json::from_str::<WaErrorBody>(&body) {
                Ok(err) if err.error.code == NO_LOCATION_ERROR_CODE => {
                    Err(ProviderError::NotFound(query.describe()))
                }
                Ok(err) => Err(ProviderError::Status {
                    status: 400,
                    body: err.error.message,
                }),
                Err(_) => Err(ProviderError::Status { status: 400, body }),
            };
        }
        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let body: WaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("WeatherAPI JSON: {}", e)))?;

        let observed_at = body
            .current
            .last_updated_epoch
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .unwrap_or_else(Utc::now);

        Ok(WeatherResult {
            city: body.location.name,
            country: body.location.country,
            latitude: body.location.lat,
            longitude: body.location.lon,
            temperature_c: body.current.temp_c,
            description: body.current.condition.text,
            humidity_pct: body.current.humidity,
            wind_speed_kmh: body.current.wind_kph,
            pressure_hpa: body.current.pressure_mb,
            visibility_km: body.current.vis_km,
            uv_index: body.current.uv,
            observed_at,
        }
        .validated()?)
    }
}
