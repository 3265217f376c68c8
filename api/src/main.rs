// Weather Lookup API v0.1
use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod errors;
mod helpers;
mod routes;
mod services;

use config::{AppConfig, CacheBackend};
use routes::weather::AppState;
use services::cache::{
    run_cache_sweeper, CacheStore, MemoryCacheStore, PgCacheStore, ResultCache,
    CACHE_SWEEP_INTERVAL,
};
use services::events::{spawn_event_logger, BroadcastEventBus, EVENT_BUS_CAPACITY};
use services::fallback::ProviderFallbackManager;
use services::forecast::ForecastService;
use services::history::{HistoryLedger, PgHistoryStore};
use services::lookup::{LookupSettings, WeatherLookupOrchestrator};
use services::observations::PgObservationStore;
use services::providers::{build_providers, http_client, OpenMeteoProvider};

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 2;

/// Weather Lookup API OpenAPI document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weather Lookup API",
        version = "0.1.0",
        description = "Current-weather lookup by city or coordinates. Results come from \
            a short-lived cache or from an ordered list of weather providers \
            (OpenWeatherMap, WeatherAPI, Open-Meteo) with automatic fallback. \
            Identified users get a per-user search history.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Weather", description = "Current weather, forecasts and search history"),
        (name = "Providers", description = "Weather provider status"),
    ),
    paths(
        routes::health::health_check,
        routes::weather::get_weather,
        routes::weather::get_history,
        routes::weather::delete_history,
        routes::weather::get_forecast,
        routes::providers::get_providers_status,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            services::weather::WeatherResult,
            services::lookup::LookupOutcome,
            services::history::HistoryEntry,
            routes::weather::HistoryResponse,
            services::forecast::Forecast,
            services::forecast::DailyForecast,
            services::forecast::HourlyForecast,
            services::fallback::ProviderAttemptStats,
            routes::providers::ProviderStatusEntry,
            routes::providers::ProvidersStatusResponse,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_lookup_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    // Set up database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    // Weather providers, in configured priority order
    let providers = build_providers(&config.providers).expect("Failed to build HTTP client");
    let fallback = ProviderFallbackManager::new(providers);
    let available = fallback.available_providers();
    if available.is_empty() {
        tracing::warn!("No weather provider is available; every uncached lookup will fail");
    } else {
        tracing::info!("Weather providers available: {}", available.join(", "));
    }

    let cache_store: Arc<dyn CacheStore> = match config.cache_backend {
        CacheBackend::Postgres => Arc::new(PgCacheStore::new(pool.clone())),
        CacheBackend::Memory => Arc::new(MemoryCacheStore::new()),
    };
    tracing::info!(
        "Result cache: {:?} backend, TTL {}s",
        config.cache_backend,
        config.cache_ttl_secs
    );

    // Expired cache entries are swept in the background
    let cache = ResultCache::new(cache_store);
    tokio::spawn(run_cache_sweeper(cache.clone(), CACHE_SWEEP_INTERVAL));

    // Domain events go to an in-process bus; a background task logs them
    let event_bus = BroadcastEventBus::new(EVENT_BUS_CAPACITY);
    spawn_event_logger(&event_bus);

    let lookup = WeatherLookupOrchestrator::new(
        fallback,
        cache,
        HistoryLedger::new(Arc::new(PgHistoryStore::new(pool.clone()))),
        Arc::new(PgObservationStore::new(pool.clone())),
        Arc::new(event_bus),
        LookupSettings {
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            history_retention: config.history_retention,
        },
    );

    // Forecasts always come from Open-Meteo, whatever the lookup order is
    let forecast_client =
        http_client(config.providers.timeout_secs).expect("Failed to build HTTP client");
    let forecasts = ForecastService::new(OpenMeteoProvider::new(
        forecast_client,
        &config.providers.openmeteo_base_url,
        &config.providers.openmeteo_geocoding_url,
    ));

    let app_state = AppState {
        pool,
        lookup,
        forecasts,
    };

    // CORS: GET for lookups, DELETE for clearing history
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::DELETE])
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/weather", get(routes::weather::get_weather))
        .route(
            "/api/v1/weather/history",
            get(routes::weather::get_history).delete(routes::weather::delete_history),
        )
        .route(
            "/api/v1/weather/forecast",
            get(routes::weather::get_forecast),
        )
        .route(
            "/api/v1/providers/status",
            get(routes::providers::get_providers_status),
        )
        .with_state(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
