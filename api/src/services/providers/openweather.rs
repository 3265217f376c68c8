//! OpenWeatherMap current-weather client.
//!
//! See: https://openweathermap.org/current

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{error_for_status, ProviderError, WeatherProvider};
use crate::services::weather::{LocationQuery, WeatherResult};

const NAME: &str = "openweather";

/// OpenWeatherMap reports visibility only up to 10 km; used when it is omitted.
const DEFAULT_VISIBILITY_KM: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

// --- OpenWeatherMap JSON response types ---

#[derive(Debug, Deserialize)]
struct OwResponse {
    name: String,
    dt: Option<i64>,
    coord: Option<OwCoord>,
    sys: Option<OwSys>,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwCondition>,
    wind: Option<OwWind>,
    /// Metres
    visibility: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: f64,
    pressure: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    /// Metres per second (with `units=metric`)
    speed: f64,
}

impl OpenWeatherProvider {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
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

        let url = format!("{}/weather", self.base_url);
        let mut params: Vec<(&str, String)> = vec![
            ("appid", self.api_key.clone()),
            ("units", "metric".to_string()),
        ];
        match query {
            LocationQuery::City { city, country } => {
                let q = match country {
                    Some(country) => format!("{},{}", city.trim(), country),
                    None => city.trim().to_string(),
                };
                params.push(("q", q));
            }
            LocationQuery::Coordinates {
                latitude,
                longitude,
            } => {
                params.push(("lat", latitude.to_string()));
                params.push(("lon", longitude.to_string()));
            }
        }

        let response = self.client.get(&url).query(&params).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(query.describe()));
        }
        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let body: OwResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("OpenWeatherMap JSON: {}", e)))?;

        Ok(normalize(body)?)
    }
}

/// Convert an OpenWeatherMap payload into the shared shape.
fn normalize(body: OwResponse) -> Result<WeatherResult, crate::services::weather::InvalidWeather> {
    let observed_at = body
        .dt
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);

    let description = body
        .weather
        .first()
        .map(|w| w.description.clone())
        .unwrap_or_else(|| "unknown".to_string());

    WeatherResult {
        city: body.name,
        country: body.sys.and_then(|s| s.country),
        latitude: body.coord.as_ref().map(|c| c.lat),
        longitude: body.coord.as_ref().map(|c| c.lon),
        temperature_c: body.main.temp,
        description,
        humidity_pct: body.main.humidity,
        wind_speed_kmh: body.wind.map(|w| w.speed * 3.6).unwrap_or(0.0),
        pressure_hpa: body.main.pressure,
        visibility_km: Some(
            body.visibility
                .map(|m| m / 1000.0)
                .unwrap_or(DEFAULT_VISIBILITY_KM),
        ),
        uv_index: None,
        observed_at,
    }
    .validated()
}
