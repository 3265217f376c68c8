//! Open-Meteo client (current conditions, multi-day forecast, geocoding).
//!
//! Keyless, so it is always available and usually sits last in the provider
//! order as the safety net. City names are resolved through a small table of
//! well-known cities first, then through the Open-Meteo geocoding API.
//! See: https://open-meteo.com/en/docs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use super::{error_for_status, ProviderError, WeatherProvider};
use crate::services::forecast::{DailyForecast, Forecast, HourlyForecast};
use crate::services::weather::{LocationQuery, WeatherResult};

const NAME: &str = "openmeteo";

/// Number of days returned by the forecast endpoint.
const FORECAST_DAYS: u8 = 5;

/// Number of geocoding candidates requested per city name.
const GEOCODING_CANDIDATES: u8 = 5;

/// Cities resolved without a geocoding round-trip: (lookup name, lat, lon, display name, country).
const KNOWN_CITIES: &[(&str, f64, f64, &str, &str)] = &[
    ("sao paulo", -23.5505, -46.6333, "São Paulo", "BR"),
    ("são paulo", -23.5505, -46.6333, "São Paulo", "BR"),
    ("rio de janeiro", -22.9068, -43.1729, "Rio de Janeiro", "BR"),
    ("brasilia", -15.7801, -47.9292, "Brasília", "BR"),
    ("brasília", -15.7801, -47.9292, "Brasília", "BR"),
    ("salvador", -12.9777, -38.5016, "Salvador", "BR"),
    ("fortaleza", -3.7319, -38.5267, "Fortaleza", "BR"),
    ("belo horizonte", -19.9167, -43.9345, "Belo Horizonte", "BR"),
    ("manaus", -3.1190, -60.0217, "Manaus", "BR"),
    ("curitiba", -25.4244, -49.2654, "Curitiba", "BR"),
    ("recife", -8.0476, -34.8770, "Recife", "BR"),
    ("porto alegre", -30.0346, -51.2177, "Porto Alegre", "BR"),
    ("london", 51.5074, -0.1278, "London", "GB"),
    ("new york", 40.7128, -74.0060, "New York", "US"),
    ("tokyo", 35.6762, 139.6503, "Tokyo", "JP"),
    ("paris", 48.8566, 2.3522, "Paris", "FR"),
];

#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    client: reqwest::Client,
    base_url: String,
    geocoding_url: String,
}

/// A query resolved to coordinates, with a display name when one is known.
#[derive(Debug, Clone, PartialEq)]
struct ResolvedPlace {
    latitude: f64,
    longitude: f64,
    name: String,
    country: Option<String>,
}

// --- Open-Meteo JSON response types ---

#[derive(Debug, Deserialize)]
struct OmCurrentResponse {
    current_weather: Option<OmCurrentWeather>,
    hourly: Option<OmHourly>,
}

#[derive(Debug, Deserialize)]
struct OmCurrentWeather {
    temperature: f64,
    /// km/h (Open-Meteo default unit)
    windspeed: f64,
    weathercode: u16,
    /// "YYYY-MM-DDTHH:MM" in the requested timezone (UTC)
    time: String,
}

#[derive(Debug, Default, Deserialize)]
struct OmHourly {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    relativehumidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    windspeed_10m: Vec<Option<f64>>,
    #[serde(default)]
    pressure_msl: Vec<Option<f64>>,
    /// Metres
    #[serde(default)]
    visibility: Vec<Option<f64>>,
    #[serde(default)]
    uv_index: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct OmForecastResponse {
    hourly: Option<OmHourly>,
    daily: Option<OmDaily>,
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<String>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    uv_index_max: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct OmGeocodingResponse {
    #[serde(default)]
    results: Vec<OmGeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct OmGeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
    country: Option<String>,
    country_code: Option<String>,
}

fn lookup_known_city(city: &str) -> Option<ResolvedPlace> {
    let needle = city.trim().to_lowercase();
    KNOWN_CITIES
        .iter()
        .find(|(name, ..)| *name == needle)
        .map(|&(_, latitude, longitude, name, country)| ResolvedPlace {
            latitude,
            longitude,
            name: name.to_string(),
            country: Some(country.to_string()),
        })
}

/// Value at `idx`, treating a short or null column as missing.
fn column_at(column: &[Option<f64>], idx: Option<usize>) -> Option<f64> {
    idx.and_then(|i| column.get(i).copied().flatten())
}

fn parse_local_time(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .ok()
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}

/// WMO weather interpretation code → description.
fn describe_weather_code(code: u16) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 | 57 => "Freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 | 67 => "Freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}

impl OpenMeteoProvider {
    pub fn new(client: reqwest::Client, base_url: &str, geocoding_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            geocoding_url: geocoding_url.trim_end_matches('/').to_string(),
        }
    }

    async fn resolve(&self, query: &LocationQuery) -> Result<ResolvedPlace, ProviderError> {
        let (city, country) = match query {
            LocationQuery::Coordinates {
                latitude,
                longitude,
            } => {
                return Ok(ResolvedPlace {
                    latitude: *latitude,
                    longitude: *longitude,
                    name: query.describe(),
                    country: None,
                })
            }
            LocationQuery::City { city, country } => (city, country),
        };

        if let Some(place) = lookup_known_city(city) {
            tracing::debug!("Open-Meteo: using built-in coordinates for {}", place.name);
            return Ok(place);
        }

        let url = format!("{}/search", self.geocoding_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("name", city.trim().to_string()),
                ("count", GEOCODING_CANDIDATES.to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let body: OmGeocodingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Open-Meteo geocoding JSON: {}", e)))?;

        // Prefer a candidate in the requested country; otherwise the top hit
        let wanted = country.as_deref().map(str::to_lowercase);
        let chosen = body
            .results
            .iter()
            .find(|r| match &wanted {
                Some(w) => {
                    r.country_code.as_deref().map(str::to_lowercase).as_ref() == Some(w)
                        || r.country.as_deref().map(str::to_lowercase).as_ref() == Some(w)
                }
                None => true,
            })
            .or_else(|| body.results.first())
            .ok_or_else(|| ProviderError::NotFound(query.describe()))?;

        Ok(ResolvedPlace {
            latitude: chosen.latitude,
            longitude: chosen.longitude,
            name: chosen.name.clone(),
            country: chosen
                .country_code
                .clone()
                .or_else(|| chosen.country.clone()),
        })
    }

    /// Multi-day forecast (daily extremes plus hourly readings) for a location.
    pub async fn fetch_forecast(&self, query: &LocationQuery) -> Result<Forecast, ProviderError> {
        let place = self.resolve(query).await?;

        let url = format!("{}/forecast", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", place.latitude.to_string()),
                ("longitude", place.longitude.to_string()),
                (
                    "hourly",
                    "temperature_2m,relativehumidity_2m,windspeed_10m".to_string(),
                ),
                (
                    "daily",
                    "temperature_2m_max,temperature_2m_min,uv_index_max".to_string(),
                ),
                ("forecast_days", FORECAST_DAYS.to_string()),
                ("timezone", "UTC".to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let body: OmForecastResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Open-Meteo forecast JSON: {}", e)))?;

        let (hourly, daily) = match (body.hourly, body.daily) {
            (Some(h), Some(d)) => (h, d),
            _ => {
                return Err(ProviderError::Parse(
                    "no forecast data available".to_string(),
                ))
            }
        };

        let daily = daily
            .time
            .iter()
            .enumerate()
            .filter_map(|(i, date)| {
                let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
                Some(DailyForecast {
                    date,
                    temperature_max_c: column_at(&daily.temperature_2m_max, Some(i)),
                    temperature_min_c: column_at(&daily.temperature_2m_min, Some(i)),
                    uv_index_max: column_at(&daily.uv_index_max, Some(i)),
                })
            })
            .collect();

        let hourly = hourly
            .time
            .iter()
            .enumerate()
            .filter_map(|(i, time)| {
                Some(HourlyForecast {
                    time: parse_local_time(time)?,
                    temperature_c: column_at(&hourly.temperature_2m, Some(i)),
                    humidity_pct: column_at(&hourly.relativehumidity_2m, Some(i)),
                    wind_speed_kmh: column_at(&hourly.windspeed_10m, Some(i)),
                })
            })
            .collect();

        Ok(Forecast {
            city: place.name,
            country: place.country,
            latitude: place.latitude,
            longitude: place.longitude,
            daily,
            hourly,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn fetch(&self, query: &LocationQuery) -> Result<WeatherResult, ProviderError> {
        let place = self.resolve(query).await?;

        let url = format!("{}/forecast", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", place.latitude.to_string()),
                ("longitude", place.longitude.to_string()),
                ("current_weather", "true".to_string()),
                (
                    "hourly",
                    "relativehumidity_2m,pressure_msl,visibility,uv_index".to_string(),
                ),
                ("forecast_days", "1".to_string()),
                ("timezone", "UTC".to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let body: OmCurrentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Open-Meteo JSON: {}", e)))?;

        let current = body
            .current_weather
            .ok_or_else(|| ProviderError::Parse("no current weather data".to_string()))?;
        let hourly = body.hourly.unwrap_or_default();

        // Hourly columns are aligned with `time`; pick the slot matching the observation
        let idx = hourly.time.iter().position(|t| *t == current.time);

        Ok(WeatherResult {
            city: place.name,
            country: place.country,
            latitude: Some(place.latitude),
            longitude: Some(place.longitude),
            temperature_c: current.temperature,
            description: describe_weather_code(current.weathercode).to_string(),
            humidity_pct: column_at(&hourly.relativehumidity_2m, idx).unwrap_or(0.0),
            wind_speed_kmh: current.windspeed,
            pressure_hpa: column_at(&hourly.pressure_msl, idx),
            visibility_km: column_at(&hourly.visibility, idx).map(|m| m / 1000.0),
            uv_index: column_at(&hourly.uv_index, idx),
            observed_at: parse_local_time(&current.time).unwrap_or_else(Utc::now),
        }
        .validated()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn current_payload() -> serde_json::Value {
        serde_json::json!({
            "latitude": -23.55,
            "longitude": -46.63,
            "current_weather": {
                "temperature": 25.3,
                "windspeed": 11.9,
                "winddirection": 120,
                "weathercode": 2,
                "time": "2026-10-19T12:00"
            },
            "hourly": {
                "time": ["2026-10-19T11:00", "2026-10-19T12:00"],
                "relativehumidity_2m": [70, 65],
                "pressure_msl": [1014.8, 1015.1],
                "visibility": [24140.0, null],
                "uv_index": [5.1, 6.3]
            }
        })
    }

    #[test]
    fn test_known_city_lookup_is_case_insensitive() {
        let place = lookup_known_city("  SÃO PAULO ").unwrap();
        assert_eq!(place.name, "São Paulo");
        assert_eq!(place.country.as_deref(), Some("BR"));
        assert!(lookup_known_city("Gotham").is_none());
    }

    #[test]
    fn test_describe_weather_code() {
        assert_eq!(describe_weather_code(0), "Clear sky");
        assert_eq!(describe_weather_code(95), "Thunderstorm");
        assert_eq!(describe_weather_code(42), "Unknown");
    }

    #[test]
    fn test_column_at_handles_gaps() {
        let col = vec![Some(1.0), None];
        assert_eq!(column_at(&col, Some(0)), Some(1.0));
        assert_eq!(column_at(&col, Some(1)), None);
        assert_eq!(column_at(&col, Some(5)), None);
        assert_eq!(column_at(&col, None), None);
    }

    #[tokio::test]
    async fn test_fetch_known_city_skips_geocoding() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("latitude", "-23.5505"))
            .and(query_param("current_weather", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_payload()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let provider = OpenMeteoProvider::new(reqwest::Client::new(), &server.uri(), &server.uri());
        let result = provider
            .fetch(&LocationQuery::City {
                city: "Sao Paulo".to_string(),
                country: None,
            })
            .await
            .unwrap();

        assert_eq!(result.city, "São Paulo");
        assert_eq!(result.temperature_c, 25.3);
        assert_eq!(result.humidity_pct, 65.0);
        assert_eq!(result.description, "Partly cloudy");
        assert_eq!(result.pressure_hpa, Some(1015.1));
        assert_eq!(result.visibility_km, None);
        assert_eq!(result.uv_index, Some(6.3));
        assert_eq!(
            result.observed_at,
            "2026-10-19T12:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[tokio::test]
    async fn test_fetch_geocodes_unknown_city_preferring_country() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("name", "Springfield"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    { "name": "Springfield", "latitude": 39.80, "longitude": -89.64,
                      "country": "United States", "country_code": "US" },
                    { "name": "Springfield", "latitude": -43.33, "longitude": 172.18,
                      "country": "New Zealand", "country_code": "NZ" }
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("latitude", "-43.33"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_payload()))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenMeteoProvider::new(reqwest::Client::new(), &server.uri(), &server.uri());
        let result = provider
            .fetch(&LocationQuery::City {
                city: "Springfield".to_string(),
                country: Some("nz".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(result.country.as_deref(), Some("NZ"));
        assert_eq!(result.latitude, Some(-43.33));
    }

    #[tokio::test]
    async fn test_geocoding_no_results_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let provider = OpenMeteoProvider::new(reqwest::Client::new(), &server.uri(), &server.uri());
        let err = provider
            .fetch(&LocationQuery::City {
                city: "Qwertyuiop".to_string(),
                country: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_current_weather_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hourly": { "time": [] }
            })))
            .mount(&server)
            .await;

        let provider = OpenMeteoProvider::new(reqwest::Client::new(), &server.uri(), &server.uri());
        let err = provider
            .fetch(&LocationQuery::Coordinates {
                latitude: 1.0,
                longitude: 2.0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[tokio::test]
    async fn test_fetch_forecast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("forecast_days", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hourly": {
                    "time": ["2026-10-19T00:00", "2026-10-19T01:00"],
                    "temperature_2m": [12.1, 11.8],
                    "relativehumidity_2m": [88, 90],
                    "windspeed_10m": [7.2, null]
                },
                "daily": {
                    "time": ["2026-10-19", "2026-10-20"],
                    "temperature_2m_max": [17.4, 15.0],
                    "temperature_2m_min": [9.9, 8.1],
                    "uv_index_max": [3.2, 2.1]
                }
            })))
            .mount(&server)
            .await;

        let provider = OpenMeteoProvider::new(reqwest::Client::new(), &server.uri(), &server.uri());
        let forecast = provider
            .fetch_forecast(&LocationQuery::City {
                city: "London".to_string(),
                country: None,
            })
            .await
            .unwrap();

        assert_eq!(forecast.city, "London");
        assert_eq!(forecast.daily.len(), 2);
        assert_eq!(forecast.daily[0].temperature_max_c, Some(17.4));
        assert_eq!(forecast.daily[1].temperature_min_c, Some(8.1));
        assert_eq!(forecast.hourly.len(), 2);
        assert_eq!(forecast.hourly[1].wind_speed_kmh, None);
    }
}
