//! Weather domain types shared by providers, cache, history and routes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Normalized current-weather observation.
///
/// Every provider adapter produces this shape; the cache stores it as JSON and
/// history entries copy their snapshot fields from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherResult {
    /// Resolved city name as reported by the provider
    pub city: String,
    /// Country name or ISO code, when the provider reports one
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Air temperature in Celsius
    pub temperature_c: f64,
    /// Human-readable condition (e.g. "light rain")
    pub description: String,
    /// Relative humidity percentage, 0–100
    pub humidity_pct: f64,
    /// Wind speed in km/h
    pub wind_speed_kmh: f64,
    /// Sea-level pressure in hPa
    pub pressure_hpa: Option<f64>,
    /// Visibility in km
    pub visibility_km: Option<f64>,
    pub uv_index: Option<f64>,
    /// When the observation was taken (provider time, or fetch time if absent)
    pub observed_at: DateTime<Utc>,
}

/// A provider payload that cannot be turned into a valid [`WeatherResult`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid weather data: {0}")]
pub struct InvalidWeather(pub String);

impl WeatherResult {
    /// Check the observation invariants: finite readings, humidity within
    /// 0–100 and non-negative wind speed.
    pub fn validated(self) -> Result<Self, InvalidWeather> {
        if !self.temperature_c.is_finite() {
            return Err(InvalidWeather(format!(
                "temperature {} is not finite",
                self.temperature_c
            )));
        }
        if !(0.0..=100.0).contains(&self.humidity_pct) {
            return Err(InvalidWeather(format!(
                "humidity {} outside 0-100",
                self.humidity_pct
            )));
        }
        if !self.wind_speed_kmh.is_finite() || self.wind_speed_kmh < 0.0 {
            return Err(InvalidWeather(format!(
                "wind speed {} must be >= 0",
                self.wind_speed_kmh
            )));
        }
        if self.city.trim().is_empty() {
            return Err(InvalidWeather("missing city name".to_string()));
        }
        Ok(self)
    }
}

/// What the caller asked for: a named place or a coordinate pair.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    City {
        city: String,
        country: Option<String>,
    },
    Coordinates {
        latitude: f64,
        longitude: f64,
    },
}

impl LocationQuery {
    /// Build a query from the optional HTTP parameters.
    ///
    /// Coordinates win when both latitude and longitude are given; a lone
    /// latitude or longitude is rejected rather than silently ignored.
    pub fn from_parts(
        city: Option<String>,
        country: Option<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<Self, String> {
        let country = country
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let query = match (latitude, longitude, city) {
            (Some(latitude), Some(longitude), _) => LocationQuery::Coordinates {
                latitude,
                longitude,
            },
            (Some(_), None, _) | (None, Some(_), _) => {
                return Err("latitude and longitude must be given together".to_string())
            }
            (None, None, Some(city)) => LocationQuery::City { city, country },
            (None, None, None) => return Err("city or coordinates are required".to_string()),
        };
        query.validate()?;
        Ok(query)
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            LocationQuery::City { city, .. } => {
                if city.trim().is_empty() {
                    return Err("city must not be empty".to_string());
                }
            }
            LocationQuery::Coordinates {
                latitude,
                longitude,
            } => {
                if !latitude.is_finite() || !(-90.0..=90.0).contains(latitude) {
                    return Err(format!("latitude {} must be within -90..90", latitude));
                }
                if !longitude.is_finite() || !(-180.0..=180.0).contains(longitude) {
                    return Err(format!("longitude {} must be within -180..180", longitude));
                }
            }
        }
        Ok(())
    }

    /// Short human-readable form for logs and error messages.
    pub fn describe(&self) -> String {
        match self {
            LocationQuery::City {
                city,
                country: Some(country),
            } => format!("{}, {}", city, country),
            LocationQuery::City {
                city,
                country: None,
            } => city.clone(),
            LocationQuery::Coordinates {
                latitude,
                longitude,
            } => format!("({:.4}, {:.4})", latitude, longitude),
        }
    }
}

/// Cache index derived from a [`LocationQuery`].
///
/// Normalization is lowercase + trim only: "Sao Paulo" and "São Paulo" map to
/// different keys and may both be cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationKey(String);

impl LocationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&LocationQuery> for LocationKey {
    fn from(query: &LocationQuery) -> Self {
        match query {
            LocationQuery::City { city, country } => {
                let country = country
                    .as_deref()
                    .map(|c| c.trim().to_lowercase())
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| "unknown".to_string());
                LocationKey(format!(
                    "weather:{}:{}",
                    city.trim().to_lowercase(),
                    country
                ))
            }
            LocationQuery::Coordinates {
                latitude,
                longitude,
            } => LocationKey(format!(
                "weather:coords:{}:{}",
                key_coordinate(*latitude),
                key_coordinate(*longitude)
            )),
        }
    }
}

/// Coordinate rounded to two decimals, with "-0.00" folded into "0.00".
fn key_coordinate(value: f64) -> String {
    let rounded = format!("{:.2}", value);
    if rounded == "-0.00" {
        "0.00".to_string()
    } else {
        rounded
    }
}

impl std::fmt::Display for LocationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
pub(crate) fn sample_weather(city: &str) -> WeatherResult {
    WeatherResult {
        city: city.to_string(),
        country: Some("BR".to_string()),
        latitude: Some(-23.5505),
        longitude: Some(-46.6333),
        temperature_c: 25.0,
        description: "scattered clouds".to_string(),
        humidity_pct: 65.0,
        wind_speed_kmh: 12.0,
        pressure_hpa: Some(1015.0),
        visibility_km: Some(10.0),
        uv_index: None,
        observed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city(name: &str, country: Option<&str>) -> LocationQuery {
        LocationQuery::City {
            city: name.to_string(),
            country: country.map(str::to_string),
        }
    }

    #[test]
    fn test_key_city_without_country() {
        let key = LocationKey::from(&city("São Paulo", None));
        assert_eq!(key.as_str(), "weather:são paulo:unknown");
    }

    #[test]
    fn test_key_is_case_folded_and_trimmed() {
        let a = LocationKey::from(&city("  LONDON ", Some(" GB")));
        let b = LocationKey::from(&city("london", Some("gb")));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "weather:london:gb");
    }

    #[test]
    fn test_key_does_not_fold_accents() {
        let plain = LocationKey::from(&city("Sao Paulo", None));
        let accented = LocationKey::from(&city("São Paulo", None));
        assert_ne!(plain, accented);
    }

    #[test]
    fn test_key_rounds_coordinates() {
        let a = LocationKey::from(&LocationQuery::Coordinates {
            latitude: -23.55049,
            longitude: -46.63331,
        });
        let b = LocationKey::from(&LocationQuery::Coordinates {
            latitude: -23.5505,
            longitude: -46.6333,
        });
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "weather:coords:-23.55:-46.63");
    }

    #[test]
    fn test_key_folds_negative_zero() {
        let south = LocationKey::from(&LocationQuery::Coordinates {
            latitude: -0.001,
            longitude: -0.004,
        });
        let north = LocationKey::from(&LocationQuery::Coordinates {
            latitude: 0.001,
            longitude: 0.0,
        });
        assert_eq!(south, north);
        assert_eq!(south.as_str(), "weather:coords:0.00:0.00");
    }

    #[test]
    fn test_from_parts_prefers_coordinates() {
        let q = LocationQuery::from_parts(Some("Paris".to_string()), None, Some(48.85), Some(2.35))
            .unwrap();
        assert!(matches!(q, LocationQuery::Coordinates { .. }));
    }

    #[test]
    fn test_from_parts_rejects_half_coordinates() {
        let err = LocationQuery::from_parts(None, None, Some(10.0), None).unwrap_err();
        assert!(err.contains("together"));
    }

    #[test]
    fn test_from_parts_rejects_empty() {
        assert!(LocationQuery::from_parts(None, None, None, None).is_err());
        assert!(LocationQuery::from_parts(Some("   ".to_string()), None, None, None).is_err());
    }

    #[test]
    fn test_from_parts_rejects_out_of_range() {
        assert!(LocationQuery::from_parts(None, None, Some(91.0), Some(0.0)).is_err());
        assert!(LocationQuery::from_parts(None, None, Some(0.0), Some(f64::NAN)).is_err());
    }

    #[test]
    fn test_blank_country_is_dropped() {
        let q = LocationQuery::from_parts(
            Some("Lima".to_string()),
            Some(" ".to_string()),
            None,
            None,
        )
        .unwrap();
        assert_eq!(q, city("Lima", None));
    }

    #[test]
    fn test_validated_rejects_bad_humidity() {
        let mut w = sample_weather("Recife");
        w.humidity_pct = 101.0;
        assert!(w.validated().is_err());
    }

    #[test]
    fn test_validated_rejects_negative_wind() {
        let mut w = sample_weather("Recife");
        w.wind_speed_kmh = -1.0;
        assert!(w.validated().is_err());
    }

    #[test]
    fn test_validated_accepts_bounds() {
        let mut w = sample_weather("Recife");
        w.humidity_pct = 100.0;
        w.wind_speed_kmh = 0.0;
        assert!(w.validated().is_ok());
    }
}
