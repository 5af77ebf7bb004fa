//! Dex service client (species metadata, sprites, EV yields).
//!
//! Two endpoints matter here: the species lookup, whose `generation`
//! resource tells us when a Pokemon was introduced, and the pokemon
//! detail lookup, which carries stats and a nested per-generation sprite
//! tree. Requesting a sprite for a generation before the species existed
//! is a semantic miss the gateway reports separately from 404.

use std::collections::BTreeMap;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::types::{EvYield, MAX_GENERATION};
use crate::{Result, RotomError};

use super::handle_response_errors;

/// Default base URL for the dex service.
const DEFAULT_BASE_URL: &str = "https://pokeapi.co/api/v2";

/// Sprite tree keys for past generations, in generation order.
const GENERATION_KEYS: [&str; 8] = [
    "generation-i",
    "generation-ii",
    "generation-iii",
    "generation-iv",
    "generation-v",
    "generation-vi",
    "generation-vii",
    "generation-viii",
];

/// Client for the species/sprite service.
#[derive(Clone)]
pub struct DexClient {
    http: Client,
    base_url: String,
}

/// Species metadata relevant to sprite lookups.
#[derive(Debug, Clone)]
pub struct SpeciesInfo {
    /// Generation the species first appeared in.
    pub introduced_in: u8,
}

#[derive(Deserialize)]
struct SpeciesPayload {
    generation: Option<ResourceRef>,
}

#[derive(Deserialize)]
struct ResourceRef {
    url: String,
}

/// Pokemon detail payload, decoded to the fields the gateway serves.
/// The sprite tree stays raw JSON: its shape is deep, sparsely
/// populated, and versioned by game rather than by schema.
#[derive(Debug, Clone, Deserialize)]
pub struct PokemonPayload {
    pub name: String,
    pub id: u32,
    stats: Vec<StatSlot>,
    types: Vec<TypeSlot>,
    sprites: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct StatSlot {
    effort: u32,
    stat: NamedEntry,
}

#[derive(Debug, Clone, Deserialize)]
struct TypeSlot {
    #[serde(rename = "type")]
    kind: NamedEntry,
}

#[derive(Debug, Clone, Deserialize)]
struct NamedEntry {
    name: String,
}

impl DexClient {
    /// Create a client against the public service.
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Look up species metadata. `Ok(None)` for an unknown species.
    pub async fn fetch_species(&self, pokemon: &str) -> Result<Option<SpeciesInfo>> {
        let url = format!("{}/pokemon-species/{}", self.base_url, pokemon);
        debug!(%url, "fetching species metadata");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(RotomError::from_reqwest)?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(pokemon, "species not found (404)");
            return Ok(None);
        }
        handle_response_errors(&response)?;

        let payload: SpeciesPayload = response
            .json()
            .await
            .map_err(RotomError::from_reqwest)?;
        let introduced_in = payload
            .generation
            .and_then(|resource| parse_trailing_id(&resource.url))
            .unwrap_or(1);
        Ok(Some(SpeciesInfo { introduced_in }))
    }

    /// Fetch the pokemon detail payload. `Ok(None)` for an unknown name.
    pub async fn fetch_pokemon(&self, pokemon: &str) -> Result<Option<PokemonPayload>> {
        let url = format!("{}/pokemon/{}", self.base_url, pokemon);
        debug!(%url, "fetching pokemon detail");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(RotomError::from_reqwest)?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(pokemon, "pokemon not found (404)");
            return Ok(None);
        }
        handle_response_errors(&response)?;

        let payload: PokemonPayload = response
            .json()
            .await
            .map_err(RotomError::from_reqwest)?;
        Ok(Some(payload))
    }
}

impl PokemonPayload {
    /// Resolve a sprite URL for the given variant and generation.
    ///
    /// The latest generation reads the top-level sprite slots; earlier
    /// ones walk `sprites.versions.{generation}` and take the first game
    /// that published the requested slot.
    pub fn sprite_for(&self, shiny: bool, generation: u8) -> Option<String> {
        let slot = if shiny { "front_shiny" } else { "front_default" };
        if generation >= MAX_GENERATION {
            return string_field(&self.sprites, slot);
        }

        let key = GENERATION_KEYS.get(usize::from(generation).checked_sub(1)?)?;
        let games = self.sprites.get("versions")?.get(*key)?.as_object()?;
        games
            .values()
            .find_map(|game_sprites| string_field(game_sprites, slot))
    }

    /// Aggregate effort yields from the stat slots.
    pub fn ev_yield(&self) -> EvYield {
        let mut yields = BTreeMap::new();
        let mut total = 0;
        for slot in &self.stats {
            yields.insert(slot.stat.name.clone(), slot.effort);
            total += slot.effort;
        }
        EvYield {
            name: self.name.clone(),
            id: self.id,
            yields,
            total,
            types: self.types.iter().map(|t| t.kind.name.clone()).collect(),
            sprite: string_field(&self.sprites, "front_default"),
        }
    }
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value.get(field)?.as_str().map(str::to_string)
}

/// Extract the numeric id that closes a dex resource URL, e.g.
/// `.../generation/4/` -> 4.
fn parse_trailing_id(url: &str) -> Option<u8> {
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(sprites: Value) -> PokemonPayload {
        serde_json::from_value(json!({
            "name": "garchomp",
            "id": 445,
            "stats": [
                {"effort": 0, "stat": {"name": "hp"}},
                {"effort": 3, "stat": {"name": "attack"}},
            ],
            "types": [
                {"type": {"name": "dragon"}},
                {"type": {"name": "ground"}},
            ],
            "sprites": sprites,
        }))
        .expect("valid payload")
    }

    #[test]
    fn trailing_id_parses_generation_urls() {
        assert_eq!(
            parse_trailing_id("https://pokeapi.co/api/v2/generation/4/"),
            Some(4)
        );
        assert_eq!(parse_trailing_id("https://x/generation/9"), Some(9));
        assert_eq!(parse_trailing_id("https://x/generation/none/"), None);
    }

    #[test]
    fn latest_generation_uses_top_level_slots() {
        let pokemon = payload(json!({
            "front_default": "https://img/445.png",
            "front_shiny": "https://img/445-shiny.png",
        }));

        assert_eq!(
            pokemon.sprite_for(false, MAX_GENERATION).as_deref(),
            Some("https://img/445.png")
        );
        assert_eq!(
            pokemon.sprite_for(true, MAX_GENERATION).as_deref(),
            Some("https://img/445-shiny.png")
        );
    }

    #[test]
    fn old_generation_takes_first_game_with_the_slot() {
        let pokemon = payload(json!({
            "front_default": "https://img/445.png",
            "versions": {
                "generation-iv": {
                    "diamond-pearl": {"front_default": null},
                    "platinum": {"front_default": "https://img/plat/445.png"},
                },
            },
        }));

        assert_eq!(
            pokemon.sprite_for(false, 4).as_deref(),
            Some("https://img/plat/445.png")
        );
        assert!(pokemon.sprite_for(true, 4).is_none());
        assert!(pokemon.sprite_for(false, 2).is_none());
    }

    #[test]
    fn ev_yield_aggregates_stats_and_types() {
        let pokemon = payload(json!({"front_default": "https://img/445.png"}));
        let ev = pokemon.ev_yield();

        assert_eq!(ev.name, "garchomp");
        assert_eq!(ev.id, 445);
        assert_eq!(ev.total, 3);
        assert_eq!(ev.yields.get("attack"), Some(&3));
        assert_eq!(ev.types, vec!["dragon".to_string(), "ground".to_string()]);
        assert_eq!(ev.sprite.as_deref(), Some("https://img/445.png"));
    }
}
