//! Provider status HTTP endpoint.
//!
//! GET /api/v1/providers/status: configured weather providers in priority
//! order, with availability and attempt statistics since startup.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::routes::weather::AppState;
use crate::services::fallback::ProviderAttemptStats;

/// Status of one configured provider.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderStatusEntry {
    pub name: String,
    /// Whether the provider is configured (e.g. has an API key)
    pub available: bool,
    /// Attempts since startup; zeroed until the provider is first tried
    pub stats: ProviderAttemptStats,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProvidersStatusResponse {
    pub providers: Vec<ProviderStatusEntry>,
}

/// Get the status of every configured weather provider.
#[utoipa::path(
    get,
    path = "/api/v1/providers/status",
    tag = "Providers",
    responses(
        (status = 200, description = "Provider availability and statistics", body = ProvidersStatusResponse),
    )
)]
pub async fn get_providers_status(State(state): State<AppState>) -> Json<ProvidersStatusResponse> {
    let manager = state.lookup.providers();
    let stats = manager.stats();
    let stats = stats.read().await;

    let providers = manager
        .provider_status()
        .into_iter()
        .map(|status| ProviderStatusEntry {
            stats: stats.get(&status.name).cloned().unwrap_or_default(),
            name: status.name,
            available: status.available,
        })
        .collect();

    Json(ProvidersStatusResponse { providers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_state;
    use crate::services::testing::FakeProvider;
    use crate::services::weather::{sample_weather, LocationQuery};

    #[tokio::test]
    async fn test_status_lists_providers_with_stats() {
        let state = test_state(&[
            FakeProvider::unavailable("openweather"),
            FakeProvider::failing("weatherapi"),
            FakeProvider::ok("openmeteo", sample_weather("Recife")),
        ]);
        state
            .lookup
            .lookup(
                &LocationQuery::City {
                    city: "Recife".to_string(),
                    country: None,
                },
                None,
            )
            .await
            .unwrap();

        let Json(response) = get_providers_status(State(state)).await;
        let names: Vec<&str> = response.providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["openweather", "weatherapi", "openmeteo"]);

        assert!(!response.providers[0].available);
        assert_eq!(response.providers[0].stats.successes, 0);
        assert_eq!(response.providers[0].stats.failures, 0);
        assert_eq!(response.providers[1].stats.failures, 1);
        assert_eq!(response.providers[2].stats.successes, 1);
    }
}
