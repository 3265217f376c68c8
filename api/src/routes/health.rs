use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::routes::weather::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" when healthy, "degraded" when the database is unreachable or no
    /// weather provider is configured
    pub status: String,
    /// API version
    pub version: String,
    /// Whether the database is reachable
    pub database: bool,
    /// Names of the providers lookups can currently use, in priority order
    pub providers_available: Vec<String>,
}

fn overall_status(database: bool, providers_available: &[String]) -> &'static str {
    if database && !providers_available.is_empty() {
        "ok"
    } else {
        "degraded"
    }
}

/// Health check endpoint.
///
/// Always returns 200; `status` is "degraded" when a dependency is missing so
/// load balancers can tell partial failures apart from a dead process.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();

    let providers_available: Vec<String> = state
        .lookup
        .providers()
        .available_providers()
        .into_iter()
        .map(str::to_string)
        .collect();

    Json(HealthResponse {
        status: overall_status(database, &providers_available).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        providers_available,
    })
}
