use crate::services::providers::ProviderKind;

/// Default provider priority when `WEATHER_PROVIDERS` is unset.
const DEFAULT_PROVIDER_ORDER: &str = "openweather,weatherapi,openmeteo";

/// Which backing store holds cached lookup results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Postgres,
    Memory,
}

/// Endpoint and credential settings for the external weather providers.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Providers in priority order. Lookups try them front to back.
    pub order: Vec<ProviderKind>,
    pub openweather_api_key: String,
    pub openweather_base_url: String,
    pub weatherapi_key: String,
    pub weatherapi_base_url: String,
    pub openmeteo_base_url: String,
    pub openmeteo_geocoding_url: String,
    /// Per-request HTTP timeout applied by every provider client.
    pub timeout_secs: u64,
}

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub cache_backend: CacheBackend,
    pub cache_ttl_secs: u64,
    /// Maximum number of history entries kept per user.
    pub history_retention: usize,
    pub providers: ProviderSettings,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// `from_env` delegates here; tests pass a closure over a map so they never
    /// touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let order_raw = get_or("WEATHER_PROVIDERS", DEFAULT_PROVIDER_ORDER);
        let order = parse_provider_order(&order_raw);

        let cache_backend = match get_or("CACHE_BACKEND", "postgres").to_lowercase().as_str() {
            "memory" => CacheBackend::Memory,
            "postgres" => CacheBackend::Postgres,
            other => panic!(
                "CACHE_BACKEND must be 'postgres' or 'memory', got '{}'",
                other
            ),
        };

        Self {
            database_url: lookup("DATABASE_URL").expect("DATABASE_URL must be set"),
            port: get_or("PORT", "8080")
                .parse()
                .expect("PORT must be a valid u16"),
            cache_backend,
            cache_ttl_secs: get_or("CACHE_TTL_SECS", "300")
                .parse()
                .expect("CACHE_TTL_SECS must be a whole number of seconds"),
            history_retention: get_or("HISTORY_RETENTION", "5")
                .parse()
                .expect("HISTORY_RETENTION must be a non-negative integer"),
            providers: ProviderSettings {
                order,
                openweather_api_key: get_or("OPENWEATHER_API_KEY", ""),
                openweather_base_url: get_or(
                    "OPENWEATHER_BASE_URL",
                    "https://api.openweathermap.org/data/2.5",
                ),
                weatherapi_key: get_or("WEATHERAPI_KEY", ""),
                weatherapi_base_url: get_or("WEATHERAPI_BASE_URL", "https://api.weatherapi.com/v1"),
                openmeteo_base_url: get_or("OPENMETEO_BASE_URL", "https://api.open-meteo.com/v1"),
                openmeteo_geocoding_url: get_or(
                    "OPENMETEO_GEOCODING_URL",
                    "https://geocoding-api.open-meteo.com/v1",
                ),
                timeout_secs: get_or("PROVIDER_TIMEOUT_SECS", "10")
                    .parse()
                    .expect("PROVIDER_TIMEOUT_SECS must be a whole number of seconds"),
            },
        }
    }
}

/// Parse a comma-separated provider list, keeping the first occurrence of each.
///
/// Unknown names are logged and skipped so a typo never takes every provider down.
fn parse_provider_order(raw: &str) -> Vec<ProviderKind> {
    let mut order = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match ProviderKind::try_from(name) {
            Ok(kind) if !order.contains(&kind) => order.push(kind),
            Ok(kind) => tracing::warn!("Provider '{}' listed twice, ignoring repeat", kind),
            Err(e) => tracing::warn!("{}", e),
        }
    }
    order
}
