//! Ordered multi-provider fetch with fallback.
//!
//! Providers are tried in their configured order. Unavailable ones are skipped
//! without being called, a failing one is not retried, and the first success
//! wins. Every attempt is recorded (tracing event + in-memory statistics) so
//! the status endpoint can show how each provider is behaving.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::services::lookup::LookupError;
use crate::services::providers::ProviderRef;
use crate::services::weather::{LocationQuery, WeatherResult};

/// Name and current availability of one configured provider.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProviderStatus {
    pub name: String,
    pub available: bool,
}

/// Attempt counters for a single provider since process start.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ProviderAttemptStats {
    pub successes: u64,
    pub failures: u64,
    /// Latency of the most recent attempt in milliseconds
    pub last_latency_ms: Option<u64>,
    /// "success" or "failure"
    pub last_outcome: Option<String>,
    /// Error message of the most recent failure
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Per-provider attempt statistics (in-memory, shared via Arc<RwLock<>>).
#[derive(Debug, Default)]
pub struct ProviderStats {
    by_provider: HashMap<String, ProviderAttemptStats>,
}

impl ProviderStats {
    pub fn get(&self, provider: &str) -> Option<&ProviderAttemptStats> {
        self.by_provider.get(provider)
    }

    fn record(&mut self, provider: &str, latency_ms: u64, error: Option<String>) {
        let entry = self.by_provider.entry(provider.to_string()).or_default();
        match error {
            None => {
                entry.successes += 1;
                entry.last_outcome = Some("success".to_string());
            }
            Some(e) => {
                entry.failures += 1;
                entry.last_outcome = Some("failure".to_string());
                entry.last_error = Some(e);
            }
        }
        entry.last_latency_ms = Some(latency_ms);
        entry.last_attempt_at = Some(Utc::now());
    }
}

/// Shared provider statistics handle.
pub type SharedProviderStats = Arc<RwLock<ProviderStats>>;

#[derive(Debug, Clone)]
pub struct ProviderFallbackManager {
    providers: Vec<ProviderRef>,
    stats: SharedProviderStats,
}

impl ProviderFallbackManager {
    pub fn new(providers: Vec<ProviderRef>) -> Self {
        Self {
            providers,
            stats: Arc::new(RwLock::new(ProviderStats::default())),
        }
    }

    pub fn stats(&self) -> SharedProviderStats {
        self.stats.clone()
    }

    /// Fetch current weather from the first provider that succeeds.
    pub async fn fetch(&self, query: &LocationQuery) -> Result<WeatherResult, LookupError> {
        let mut attempted = 0;

        for provider in &self.providers {
            let name = provider.name();
            if !provider.is_available() {
                tracing::debug!("Provider {} unavailable, skipping", name);
                continue;
            }

            attempted += 1;
            let started = Instant::now();
            let result = provider.fetch(query).await;
            let latency_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(weather) => {
                    tracing::info!(
                        provider = name,
                        latency_ms,
                        "Fetched weather for {} from {}",
                        query.describe(),
                        name
                    );
                    self.stats.write().await.record(name, latency_ms, None);
                    return Ok(weather);
                }
                Err(e) => {
                    tracing::warn!(
                        provider = name,
                        latency_ms,
                        "Provider {} failed for {}: {}",
                        name,
                        query.describe(),
                        e
                    );
                    self.stats
                        .write()
                        .await
                        .record(name, latency_ms, Some(e.to_string()));
                }
            }
        }

        tracing::error!(
            "All weather providers failed for {} ({} attempted of {})",
            query.describe(),
            attempted,
            self.providers.len()
        );
        Err(LookupError::AllProvidersFailed {
            location: query.describe(),
            attempted,
        })
    }

    /// Availability of every configured provider, in priority order.
    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        self.providers
            .iter()
            .map(|p| ProviderStatus {
                name: p.name().to_string(),
                available: p.is_available(),
            })
            .collect()
    }

    /// Names of the currently available providers, in priority order.
    pub fn available_providers(&self) -> Vec<&str> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.name())
            .collect()
    }
}
