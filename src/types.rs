//! Public data types shared across the gateway surface.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Latest main-series generation the dex service knows about.
pub const MAX_GENERATION: u8 = 9;

/// Competitive sets for one Pokemon in one format, as returned by the
/// sets service. The payload shape is owned by the upstream; the gateway
/// stores and returns it opaquely.
///
/// Shared rather than cloned: cached values are never mutated after
/// insertion, only replaced.
pub type SetsData = Arc<serde_json::Value>;

/// A resolved sprite for a Pokemon in a specific generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteInfo {
    /// Direct image URL.
    pub url: String,
    /// Canonical name as reported by the dex service.
    pub name: String,
    /// National dex number.
    pub id: u32,
    /// Whether this is the shiny variant.
    pub shiny: bool,
    /// Generation the sprite was rendered for.
    pub generation: u8,
}

/// Outcome of a sprite lookup.
///
/// `NotIntroduced` is a semantic miss, distinct from `NotFound`: the
/// species exists, but predates the requested generation. It carries the
/// earliest valid generation so the caller can render an actionable
/// message instead of a generic "not found".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpriteOutcome {
    /// Sprite resolved.
    Found(SpriteInfo),
    /// The species did not exist yet in the requested generation.
    NotIntroduced {
        /// Generation the species first appeared in.
        introduced_in: u8,
        /// Generation that was asked for.
        requested: u8,
    },
    /// Unknown species, or no sprite published for this combination.
    NotFound,
}

/// Effort-value yield for a Pokemon, aggregated from the dex service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvYield {
    /// Canonical name as reported by the dex service.
    pub name: String,
    /// National dex number.
    pub id: u32,
    /// Per-stat effort yields, keyed by stat name.
    pub yields: BTreeMap<String, u32>,
    /// Sum of all effort yields.
    pub total: u32,
    /// Type names, in slot order.
    pub types: Vec<String>,
    /// Default front sprite, when the service publishes one.
    pub sprite: Option<String>,
}

/// Read-only snapshot of cache health, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Live entries in the response cache.
    pub size: usize,
    /// Configured response cache capacity.
    pub max_size: usize,
    /// Lookups answered from cache since construction or the last
    /// `invalidate_all`.
    pub hits: u64,
    /// Lookups that went to the network.
    pub misses: u64,
    /// `hits / (hits + misses)`, or 0.0 before any lookup.
    pub hit_rate: f64,
    /// Generations with a live format discovery entry.
    pub discovered_generations: usize,
}

/// Normalize a user-supplied identifier the way the upstream services
/// spell theirs: lowercased, trimmed, inner whitespace collapsed to `-`.
///
/// Every cache key is derived from normalized identifiers, so the same
/// logical request always maps to the same key.
pub fn normalize_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}
