//! Core DataGateway trait

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use crate::{CacheStats, EvYield, Result, RotomClient, SetsData, SpriteOutcome};

/// The surface the chat-command layer consumes.
///
/// Implemented by [`RotomClient`]; kept as a trait so command handlers
/// can be tested against a stub without a network or a tokio runtime
/// spinning real sweeps.
#[async_trait]
pub trait DataGateway: Send + Sync {
    /// Competitive sets for one Pokemon in one format.
    /// `Ok(None)` means "not found", which is a normal outcome.
    async fn fetch_sets(
        &self,
        pokemon: &str,
        generation: &str,
        tier: &str,
    ) -> Result<Option<SetsData>>;

    /// Search every format of a generation, returning only the tiers
    /// where the Pokemon is present.
    async fn find_across_tiers(
        &self,
        pokemon: &str,
        generation: &str,
    ) -> Result<BTreeMap<String, SetsData>>;

    /// Which formats exist for a generation.
    async fn discover_formats(&self, generation: &str) -> Result<BTreeSet<String>>;

    /// A sprite for a Pokemon in a specific generation, or a semantic
    /// explanation of why there isn't one.
    async fn fetch_sprite(&self, pokemon: &str, shiny: bool, generation: u8)
    -> Result<SpriteOutcome>;

    /// EV yield for a Pokemon.
    async fn fetch_ev_yield(&self, pokemon: &str) -> Result<Option<EvYield>>;

    /// Cache health snapshot, for diagnostics.
    fn stats(&self) -> CacheStats;

    /// Clear all caches and counters.
    fn invalidate_all(&self);

    /// Stop background work and flush persistent state.
    async fn shutdown(&self) -> Result<()>;
}

#[async_trait]
impl DataGateway for RotomClient {
    async fn fetch_sets(
        &self,
        pokemon: &str,
        generation: &str,
        tier: &str,
    ) -> Result<Option<SetsData>> {
        RotomClient::fetch_sets(self, pokemon, generation, tier).await
    }

    async fn find_across_tiers(
        &self,
        pokemon: &str,
        generation: &str,
    ) -> Result<BTreeMap<String, SetsData>> {
        RotomClient::find_across_tiers(self, pokemon, generation).await
    }

    async fn discover_formats(&self, generation: &str) -> Result<BTreeSet<String>> {
        RotomClient::discover_formats(self, generation).await
    }

    async fn fetch_sprite(
        &self,
        pokemon: &str,
        shiny: bool,
        generation: u8,
    ) -> Result<SpriteOutcome> {
        RotomClient::fetch_sprite(self, pokemon, shiny, generation).await
    }

    async fn fetch_ev_yield(&self, pokemon: &str) -> Result<Option<EvYield>> {
        RotomClient::fetch_ev_yield(self, pokemon).await
    }

    fn stats(&self) -> CacheStats {
        RotomClient::stats(self)
    }

    fn invalidate_all(&self) {
        RotomClient::invalidate_all(self)
    }

    async fn shutdown(&self) -> Result<()> {
        RotomClient::shutdown(self).await
    }
}
