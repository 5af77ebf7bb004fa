//! The caching fetch client.
//!
//! [`RotomClient`] owns the HTTP pool, the request gate, both caches, and
//! the retry/breaker policies, composed in a fixed order around every
//! upstream read:
//!
//! ```text
//! caller -> response cache -> breaker check -> retry loop
//!            (hit returns)     (fail fast)      |- gate permit
//!                                               |- HTTP GET
//! ```
//!
//! A cache hit touches none of the machinery below it. A permit is held
//! only for the duration of one HTTP call and is released on every exit
//! path, timeouts included, so the configured bound on in-flight requests
//! holds no matter how many callers fan out concurrently.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::persist::{self, Snapshot};
use crate::cache::{CachedPayload, DiscoveryCache, ResponseCache};
use crate::providers::sets::find_entry;
use crate::providers::{
    CircuitBreaker, DexClient, PokemonPayload, RetryConfig, SetsClient, SpeciesInfo, with_retry,
};
use crate::telemetry;
use crate::Result;
use crate::types::{CacheStats, EvYield, SetsData, SpriteInfo, SpriteOutcome, normalize_name};

/// Caching gateway over the sets and dex services.
///
/// Construct once per process via [`Rotom::builder()`](crate::Rotom) and
/// share by reference; every method takes `&self` and the client is
/// `Send + Sync`.
pub struct RotomClient {
    sets: SetsClient,
    dex: DexClient,
    cache: Arc<ResponseCache>,
    discovery: Arc<DiscoveryCache>,
    gate: Semaphore,
    retry: RetryConfig,
    priority_formats: Vec<String>,
    candidate_formats: Vec<String>,
    sets_breaker: CircuitBreaker,
    sprite_breaker: CircuitBreaker,
    ev_breaker: CircuitBreaker,
    persist_path: Option<PathBuf>,
    sweep: Mutex<Option<JoinHandle<()>>>,
}

impl RotomClient {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        sets: SetsClient,
        dex: DexClient,
        cache: Arc<ResponseCache>,
        discovery: Arc<DiscoveryCache>,
        max_concurrent_requests: usize,
        retry: RetryConfig,
        priority_formats: Vec<String>,
        candidate_formats: Vec<String>,
        breakers: (CircuitBreaker, CircuitBreaker, CircuitBreaker),
        persist_path: Option<PathBuf>,
        sweep: JoinHandle<()>,
    ) -> Self {
        let (sets_breaker, sprite_breaker, ev_breaker) = breakers;
        Self {
            sets,
            dex,
            cache,
            discovery,
            gate: Semaphore::new(max_concurrent_requests),
            retry,
            priority_formats,
            candidate_formats,
            sets_breaker,
            sprite_breaker,
            ev_breaker,
            persist_path,
            sweep: Mutex::new(Some(sweep)),
        }
    }

    /// Fetch competitive sets for one Pokemon in one format.
    ///
    /// Returns `Ok(None)` when the format doesn't exist upstream or the
    /// Pokemon isn't in its payload; both are normal outcomes. Only the
    /// matched entry is cached, keyed by format and normalized name.
    pub async fn fetch_sets(
        &self,
        pokemon: &str,
        generation: &str,
        tier: &str,
    ) -> Result<Option<SetsData>> {
        let pokemon = normalize_name(pokemon);
        let generation = normalize_name(generation);
        let tier = normalize_name(tier);
        let format_id = format!("{generation}{tier}");
        let key = format!("{format_id}:{pokemon}");

        if let Some(CachedPayload::Sets(sets)) = self.cache.get("fetch_sets", &key) {
            return Ok(Some(sets));
        }

        self.sets_breaker.check()?;
        let start = Instant::now();
        let format_ref = format_id.as_str();
        let result = with_retry(&self.retry, "sets", "fetch_sets", || {
            self.gated_fetch_format(format_ref)
        })
        .await;

        let payload = match result {
            Ok(payload) => {
                self.sets_breaker.record_success();
                Self::record_request("fetch_sets", "sets", start, true);
                payload
            }
            Err(e) => {
                self.sets_breaker.record_failure();
                Self::record_request("fetch_sets", "sets", start, false);
                return Err(e);
            }
        };

        let Some(payload) = payload else {
            return Ok(None);
        };
        match find_entry(&payload, &pokemon) {
            Some((matched, sets)) => {
                debug!(pokemon = %pokemon, matched, format_id = %format_id, "found sets entry");
                let data: SetsData = Arc::new(sets.clone());
                self.cache
                    .insert(key, CachedPayload::Sets(Arc::clone(&data)));
                Ok(Some(data))
            }
            None => {
                debug!(pokemon = %pokemon, format_id = %format_id, "not present in format payload");
                Ok(None)
            }
        }
    }

    /// Discover which formats exist for a generation.
    ///
    /// Probes the configured priority formats first, then the remaining
    /// candidates, all bounded by the request gate. The surviving set is
    /// cached on the discovery TTL. Probe transport errors count as
    /// "doesn't exist" rather than failing the sweep.
    pub async fn discover_formats(&self, generation: &str) -> Result<BTreeSet<String>> {
        let generation = normalize_name(generation);
        if let Some(formats) = self.discovery.formats(&generation) {
            debug!(generation = %generation, "using cached format list");
            return Ok(formats);
        }

        info!(generation = %generation, "discovering available formats");
        let mut discovered = BTreeSet::new();
        self.probe_formats(&generation, &self.priority_formats, &mut discovered)
            .await;
        let remaining: Vec<String> = self
            .candidate_formats
            .iter()
            .filter(|format| !self.priority_formats.contains(format))
            .cloned()
            .collect();
        self.probe_formats(&generation, &remaining, &mut discovered)
            .await;

        self.discovery
            .set_formats(generation.clone(), discovered.clone());
        metrics::counter!(telemetry::FORMAT_DISCOVERIES_TOTAL).increment(1);
        info!(
            generation = %generation,
            count = discovered.len(),
            "format discovery complete"
        );
        Ok(discovered)
    }

    /// Find a Pokemon across every format of a generation.
    ///
    /// Probes discovered formats concurrently (bounded by the gate) and
    /// returns only the tiers where the Pokemon is present; an upstream
    /// 404 or an absent name simply doesn't contribute a key. Successful
    /// tiers are remembered so the next lookup for the same Pokemon
    /// queries them directly instead of re-probing the generation.
    pub async fn find_across_tiers(
        &self,
        pokemon: &str,
        generation: &str,
    ) -> Result<BTreeMap<String, SetsData>> {
        let pokemon = normalize_name(pokemon);
        let generation = normalize_name(generation);
        let location_key = format!("{generation}:{pokemon}");

        if let Some(tiers) = self.discovery.locations(&location_key) {
            debug!(pokemon = %pokemon, generation = %generation, "using remembered tier locations");
            let mut found = BTreeMap::new();
            for tier in &tiers {
                if let Some(sets) = self.fetch_sets(&pokemon, &generation, tier).await? {
                    found.insert(tier.clone(), sets);
                }
            }
            if !found.is_empty() {
                return Ok(found);
            }
            // The remembered tiers no longer hold it; fall through to a
            // full probe.
        }

        let formats = self.discover_formats(&generation).await?;
        if formats.is_empty() {
            warn!(generation = %generation, "no formats discovered");
            return Ok(BTreeMap::new());
        }
        debug!(
            pokemon = %pokemon,
            generation = %generation,
            formats = formats.len(),
            "searching formats"
        );

        let pokemon_name = pokemon.as_str();
        let generation_id = generation.as_str();
        let probes = formats.iter().map(|tier| async move {
            let result = self.fetch_sets(pokemon_name, generation_id, tier).await;
            (tier.clone(), result)
        });
        let mut found = BTreeMap::new();
        for (tier, result) in join_all(probes).await {
            match result {
                Ok(Some(sets)) => {
                    found.insert(tier, sets);
                }
                Ok(None) => {}
                Err(e) => debug!(tier = %tier, error = %e, "tier probe failed"),
            }
        }

        if !found.is_empty() {
            self.discovery
                .set_locations(location_key, found.keys().cloned().collect());
        }
        Ok(found)
    }

    /// Fetch a sprite for a Pokemon in a specific generation.
    ///
    /// Looks up the species first: a request for a generation before the
    /// species existed is answered with
    /// [`SpriteOutcome::NotIntroduced`] without touching the detail
    /// endpoint. Only resolved sprites are cached.
    pub async fn fetch_sprite(
        &self,
        pokemon: &str,
        shiny: bool,
        generation: u8,
    ) -> Result<SpriteOutcome> {
        let pokemon = normalize_name(pokemon);
        let key = format!("sprite:{pokemon}:{shiny}:{generation}");
        if let Some(CachedPayload::Sprite(info)) = self.cache.get("fetch_sprite", &key) {
            return Ok(SpriteOutcome::Found(info));
        }

        self.sprite_breaker.check()?;
        let start = Instant::now();
        let pokemon_ref = pokemon.as_str();
        let species = match with_retry(&self.retry, "dex", "fetch_species", || {
            self.gated_fetch_species(pokemon_ref)
        })
        .await
        {
            Ok(species) => species,
            Err(e) => {
                self.sprite_breaker.record_failure();
                Self::record_request("fetch_sprite", "dex", start, false);
                return Err(e);
            }
        };

        let Some(species) = species else {
            self.sprite_breaker.record_success();
            Self::record_request("fetch_sprite", "dex", start, true);
            return Ok(SpriteOutcome::NotFound);
        };
        if generation < species.introduced_in {
            self.sprite_breaker.record_success();
            Self::record_request("fetch_sprite", "dex", start, true);
            debug!(
                pokemon = %pokemon,
                introduced_in = species.introduced_in,
                requested = generation,
                "species postdates requested generation"
            );
            return Ok(SpriteOutcome::NotIntroduced {
                introduced_in: species.introduced_in,
                requested: generation,
            });
        }

        let detail = match with_retry(&self.retry, "dex", "fetch_pokemon", || {
            self.gated_fetch_pokemon(pokemon_ref)
        })
        .await
        {
            Ok(detail) => {
                self.sprite_breaker.record_success();
                Self::record_request("fetch_sprite", "dex", start, true);
                detail
            }
            Err(e) => {
                self.sprite_breaker.record_failure();
                Self::record_request("fetch_sprite", "dex", start, false);
                return Err(e);
            }
        };

        let Some(detail) = detail else {
            return Ok(SpriteOutcome::NotFound);
        };
        match detail.sprite_for(shiny, generation) {
            Some(url) => {
                let info = SpriteInfo {
                    url,
                    name: detail.name.clone(),
                    id: detail.id,
                    shiny,
                    generation,
                };
                self.cache
                    .insert(key, CachedPayload::Sprite(info.clone()));
                Ok(SpriteOutcome::Found(info))
            }
            None => {
                debug!(pokemon = %pokemon, shiny, generation, "no sprite published");
                Ok(SpriteOutcome::NotFound)
            }
        }
    }

    /// Fetch the EV yield for a Pokemon. `Ok(None)` for unknown names.
    pub async fn fetch_ev_yield(&self, pokemon: &str) -> Result<Option<EvYield>> {
        let pokemon = normalize_name(pokemon);
        let key = format!("ev:{pokemon}");
        if let Some(CachedPayload::EvYield(ev)) = self.cache.get("fetch_ev_yield", &key) {
            return Ok(Some(ev));
        }

        self.ev_breaker.check()?;
        let start = Instant::now();
        let pokemon_ref = pokemon.as_str();
        let result = with_retry(&self.retry, "dex", "fetch_ev_yield", || {
            self.gated_fetch_pokemon(pokemon_ref)
        })
        .await;

        match result {
            Ok(Some(detail)) => {
                self.ev_breaker.record_success();
                Self::record_request("fetch_ev_yield", "dex", start, true);
                let ev = detail.ev_yield();
                self.cache.insert(key, CachedPayload::EvYield(ev.clone()));
                Ok(Some(ev))
            }
            Ok(None) => {
                self.ev_breaker.record_success();
                Self::record_request("fetch_ev_yield", "dex", start, true);
                Ok(None)
            }
            Err(e) => {
                self.ev_breaker.record_failure();
                Self::record_request("fetch_ev_yield", "dex", start, false);
                Err(e)
            }
        }
    }

    /// Read-only snapshot of cache health.
    pub fn stats(&self) -> CacheStats {
        let (size, max_size, hits, misses) = self.cache.stats();
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };
        CacheStats {
            size,
            max_size,
            hits,
            misses,
            hit_rate,
            discovered_generations: self.discovery.generation_count(),
        }
    }

    /// Clear both caches and zero the hit/miss counters.
    pub fn invalidate_all(&self) {
        self.cache.clear();
        self.discovery.clear();
        info!("cache cleared");
    }

    /// Stop the background sweep and, when persistence is configured,
    /// flush the live cache contents to disk.
    ///
    /// Safe to call with zero prior requests, and more than once; only
    /// the first call stops the sweep.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(handle) = self.sweep.lock().expect("sweep handle lock poisoned").take() {
            handle.abort();
        }
        if let Some(path) = &self.persist_path {
            let (formats, locations) = self.discovery.snapshot();
            let snapshot = Snapshot {
                entries: self.cache.snapshot(),
                formats,
                locations,
            };
            persist::save(path, &snapshot)?;
            info!(
                path = %path.display(),
                entries = snapshot.entries.len(),
                "cache snapshot written"
            );
        }
        let (_, _, hits, misses) = self.cache.stats();
        info!(hits, misses, "gateway shut down");
        Ok(())
    }

    async fn probe_formats(
        &self,
        generation: &str,
        tiers: &[String],
        discovered: &mut BTreeSet<String>,
    ) {
        let probes = tiers.iter().map(|tier| {
            let format_id = format!("{generation}{tier}");
            async move {
                let _permit = self.acquire_permit().await;
                let exists = match self.sets.format_exists(&format_id).await {
                    Ok(exists) => exists,
                    Err(e) => {
                        debug!(format_id = %format_id, error = %e, "format probe failed");
                        false
                    }
                };
                (tier, exists)
            }
        });
        for (tier, exists) in join_all(probes).await {
            if exists {
                discovered.insert(tier.clone());
            }
        }
    }

    /// One gate-bounded round trip to the sets service.
    async fn gated_fetch_format(
        &self,
        format_id: &str,
    ) -> Result<Option<serde_json::Map<String, serde_json::Value>>> {
        let _permit = self.acquire_permit().await;
        self.sets.fetch_format(format_id).await
    }

    /// One gate-bounded round trip to the dex species endpoint.
    async fn gated_fetch_species(&self, pokemon: &str) -> Result<Option<SpeciesInfo>> {
        let _permit = self.acquire_permit().await;
        self.dex.fetch_species(pokemon).await
    }

    /// One gate-bounded round trip to the dex detail endpoint.
    async fn gated_fetch_pokemon(&self, pokemon: &str) -> Result<Option<PokemonPayload>> {
        let _permit = self.acquire_permit().await;
        self.dex.fetch_pokemon(pokemon).await
    }

    /// The gate bounds total in-flight upstream requests. The permit is
    /// an RAII guard, so it is released on every exit path.
    async fn acquire_permit(&self) -> SemaphorePermit<'_> {
        self.gate.acquire().await.expect("request gate closed")
    }

    fn record_request(operation: &'static str, service: &'static str, start: Instant, ok: bool) {
        let status = if ok { "ok" } else { "error" };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "service" => service,
            "operation" => operation,
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "service" => service,
            "operation" => operation,
        )
        .record(start.elapsed().as_secs_f64());
    }
}

/// Periodic expiry sweep, independent of request-driven eviction.
///
/// Uses the same locking discipline as request-path access, so it never
/// observes a half-updated structure.
pub(crate) fn spawn_sweep(
    cache: Arc<ResponseCache>,
    discovery: Arc<DiscoveryCache>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.remove_expired() + discovery.remove_expired();
            if removed > 0 {
                debug!(removed, "swept expired cache entries");
            }
        }
    })
}
