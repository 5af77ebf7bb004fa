//! Builder for configuring gateway instances.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};

use super::client::{RotomClient, spawn_sweep};
use crate::cache::{CacheConfig, DiscoveryCache, DiscoveryConfig, ResponseCache, persist};
use crate::providers::{
    BreakerConfig, CircuitBreaker, DexClient, RetryConfig, SetsClient,
};
use crate::{Result, RotomError};

/// Default bound on concurrent upstream requests.
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 5;

/// Default absolute per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval for the background expiry sweep.
const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Main entry point for creating gateway instances.
pub struct Rotom;

impl Rotom {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> RotomBuilder {
        RotomBuilder::new()
    }
}

/// Builder for configuring gateway instances.
///
/// All tunables arrive here, at construction time; the library never
/// reads environment variables or config files itself.
pub struct RotomBuilder {
    cache: CacheConfig,
    discovery: DiscoveryConfig,
    retry: RetryConfig,
    breaker: BreakerConfig,
    max_concurrent_requests: usize,
    request_timeout: Duration,
    cleanup_interval: Duration,
    sets_base_url: Option<String>,
    dex_base_url: Option<String>,
    persist_enabled: bool,
    persist_path: Option<PathBuf>,
}

impl RotomBuilder {
    pub fn new() -> Self {
        Self {
            cache: CacheConfig::default(),
            discovery: DiscoveryConfig::default(),
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            sets_base_url: None,
            dex_base_url: None,
            persist_enabled: false,
            persist_path: None,
        }
    }

    /// Configure the response cache (capacity, TTL).
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Configure format discovery (candidate lists, TTL).
    pub fn discovery(mut self, config: DiscoveryConfig) -> Self {
        self.discovery = config;
        self
    }

    /// Configure retry behaviour for transient upstream failures.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Configure the per-operation circuit breakers.
    pub fn breaker(mut self, config: BreakerConfig) -> Self {
        self.breaker = config;
        self
    }

    /// Bound on concurrent upstream requests across the whole client.
    pub fn max_concurrent_requests(mut self, n: usize) -> Self {
        self.max_concurrent_requests = n;
        self
    }

    /// Absolute timeout applied to every upstream request.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Interval of the background expiry sweep.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Point the sets client at a custom base URL (for testing with
    /// wiremock).
    pub fn sets_base_url(mut self, url: impl Into<String>) -> Self {
        self.sets_base_url = Some(url.into());
        self
    }

    /// Point the dex client at a custom base URL (for testing with
    /// wiremock).
    pub fn dex_base_url(mut self, url: impl Into<String>) -> Self {
        self.dex_base_url = Some(url.into());
        self
    }

    /// Enable disk persistence at the platform cache directory.
    pub fn persistence(mut self, enabled: bool) -> Self {
        self.persist_enabled = enabled;
        self
    }

    /// Enable disk persistence with an explicit snapshot path.
    pub fn persist_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.persist_enabled = true;
        self.persist_path = Some(path.into());
        self
    }

    /// Build the client: HTTP pool, caches (reloading a persisted
    /// snapshot if one is configured and readable), breakers, and the
    /// background sweep.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context (the sweep task is spawned here).
    pub fn build(self) -> Result<RotomClient> {
        let http = Client::builder()
            .timeout(self.request_timeout)
            .user_agent(concat!("rotom/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RotomError::Configuration(format!("failed to build HTTP client: {e}")))?;

        let sets = match &self.sets_base_url {
            Some(url) => SetsClient::with_base_url(http.clone(), url.clone()),
            None => SetsClient::new(http.clone()),
        };
        let dex = match &self.dex_base_url {
            Some(url) => DexClient::with_base_url(http.clone(), url.clone()),
            None => DexClient::new(http),
        };

        let cache = Arc::new(ResponseCache::new(&self.cache));
        let discovery = Arc::new(DiscoveryCache::new(&self.discovery));

        let persist_path = if let Some(path) = self.persist_path {
            Some(path)
        } else if self.persist_enabled {
            Some(persist::default_path())
        } else {
            None
        };
        if let Some(path) = &persist_path {
            match persist::load(path) {
                Ok(Some(snapshot)) => {
                    let (admitted, discarded) = cache.absorb(snapshot.entries);
                    let discovery_records = discovery.absorb(snapshot.formats, snapshot.locations);
                    info!(
                        admitted,
                        discarded, discovery_records, "cache snapshot loaded"
                    );
                }
                Ok(None) => debug!("no usable cache snapshot, starting empty"),
                Err(e) => warn!(error = %e, "failed to load cache snapshot, starting empty"),
            }
        }

        let sweep = spawn_sweep(
            Arc::clone(&cache),
            Arc::clone(&discovery),
            self.cleanup_interval,
        );

        Ok(RotomClient::new(
            sets,
            dex,
            cache,
            discovery,
            self.max_concurrent_requests,
            self.retry,
            self.discovery.priority_formats,
            self.discovery.candidate_formats,
            (
                CircuitBreaker::new("fetch_sets", self.breaker.clone()),
                CircuitBreaker::new("fetch_sprite", self.breaker.clone()),
                CircuitBreaker::new("fetch_ev_yield", self.breaker),
            ),
            persist_path,
            sweep,
        ))
    }
}

impl Default for RotomBuilder {
    fn default() -> Self {
        Self::new()
    }
}
