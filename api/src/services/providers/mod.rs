//! External weather data sources.
//!
//! The set of adapters is fixed at compile time ([`ProviderKind`]); which ones
//! run, and in what order, comes from configuration at startup.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ProviderSettings;
use crate::services::weather::{InvalidWeather, LocationQuery, WeatherResult};

pub mod openmeteo;
pub mod openweather;
pub mod weatherapi;

pub use openmeteo::OpenMeteoProvider;
pub use openweather::OpenWeatherProvider;
pub use weatherapi::WeatherApiProvider;

/// Maximum number of response-body characters kept in error messages.
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenWeather,
    WeatherApi,
    OpenMeteo,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenWeather => "openweather",
            ProviderKind::WeatherApi => "weatherapi",
            ProviderKind::OpenMeteo => "openmeteo",
        }
    }

    pub const fn all() -> &'static [ProviderKind] {
        &[
            ProviderKind::OpenWeather,
            ProviderKind::WeatherApi,
            ProviderKind::OpenMeteo,
        ]
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderKind {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "openweather" | "openweathermap" => Ok(ProviderKind::OpenWeather),
            "weatherapi" => Ok(ProviderKind::WeatherApi),
            "openmeteo" | "open-meteo" => Ok(ProviderKind::OpenMeteo),
            _ => Err(format!(
                "Unknown provider '{}'. Supported providers: {}.",
                value,
                ProviderKind::all()
                    .iter()
                    .map(ProviderKind::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} is not configured")]
    NotConfigured { provider: &'static str },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("location not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidData(#[from] InvalidWeather),
}

/// One external weather source.
///
/// Implementations normalize the provider payload into [`WeatherResult`] and
/// must not retry internally; the fallback manager decides what happens next.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Stable name used in logs and attempt statistics.
    fn name(&self) -> &str;

    /// Cheap, local check (e.g. "is an API key configured"). Never does I/O.
    fn is_available(&self) -> bool;

    async fn fetch(&self, query: &LocationQuery) -> Result<WeatherResult, ProviderError>;
}

/// Shared handle to a configured provider.
pub type ProviderRef = Arc<dyn WeatherProvider>;

/// Build the HTTP client every adapter uses. The timeout is the only bound on
/// a slow provider; nothing above the adapter enforces one.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("weather-lookup-api/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Turn a non-success response into [`ProviderError::Status`], keeping a
/// truncated copy of the body for the logs.
pub(crate) async fn error_for_status(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ProviderError::Status {
        status,
        body: truncate_body(&body),
    }
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= ERROR_BODY_LIMIT {
        body.to_string()
    } else {
        let cut: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        format!("{}…", cut)
    }
}

/// Construct the configured providers in priority order.
pub fn build_providers(settings: &ProviderSettings) -> Result<Vec<ProviderRef>, ProviderError> {
    let client = http_client(settings.timeout_secs)?;

    let providers = settings
        .order
        .iter()
        .map(|kind| -> ProviderRef {
            match kind {
                ProviderKind::OpenWeather => Arc::new(OpenWeatherProvider::new(
                    client.clone(),
                    &settings.openweather_base_url,
                    &settings.openweather_api_key,
                )),
                ProviderKind::WeatherApi => Arc::new(WeatherApiProvider::new(
                    client.clone(),
                    &settings.weatherapi_base_url,
                    &settings.weatherapi_key,
                )),
                ProviderKind::OpenMeteo => Arc::new(OpenMeteoProvider::new(
                    client.clone(),
                    &settings.openmeteo_base_url,
                    &settings.openmeteo_geocoding_url,
                )),
            }
        })
        .collect();

    Ok(providers)
}
