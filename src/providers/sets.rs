//! Sets service client.
//!
//! The sets service publishes one JSON resource per format
//! (`GET /{generation}{tier}.json`), each an object mapping Pokemon name
//! to its competitive sets. A missing format is a plain 404, which is a
//! normal outcome here, not an error.

use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use tracing::debug;

use crate::types::normalize_name;
use crate::{Result, RotomError};

use super::handle_response_errors;

/// Default base URL for the sets service.
const DEFAULT_BASE_URL: &str = "https://data.pkmn.cc/sets";

/// Client for the sets data service.
#[derive(Clone)]
pub struct SetsClient {
    http: Client,
    base_url: String,
}

impl SetsClient {
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

    /// Fetch the full payload for one format.
    ///
    /// Returns `Ok(None)` when the format resource does not exist.
    pub async fn fetch_format(&self, format_id: &str) -> Result<Option<Map<String, Value>>> {
        let url = format!("{}/{}.json", self.base_url, format_id);
        debug!(%url, "fetching format payload");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(RotomError::from_reqwest)?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(format_id, "format not found (404)");
            return Ok(None);
        }
        handle_response_errors(&response)?;

        let payload: Map<String, Value> = response
            .json()
            .await
            .map_err(RotomError::from_reqwest)?;
        Ok(Some(payload))
    }

    /// Probe whether a format resource exists. HEAD keeps discovery cheap.
    pub async fn format_exists(&self, format_id: &str) -> Result<bool> {
        let url = format!("{}/{}.json", self.base_url, format_id);
        let response = self
            .http
            .head(&url)
            .send()
            .await
            .map_err(RotomError::from_reqwest)?;
        Ok(response.status().is_success())
    }
}

/// Find a Pokemon's entry in a format payload.
///
/// Exact case/separator-insensitive match first, then the first key that
/// contains the target as a substring. Iteration follows the payload's
/// own key order (preserved from the wire), so when several keys would
/// substring-match, which one wins depends on upstream ordering; that
/// ambiguity is deliberately left to the upstream.
pub(crate) fn find_entry<'a>(
    payload: &'a Map<String, Value>,
    pokemon: &str,
) -> Option<(&'a str, &'a Value)> {
    let target = normalize_name(pokemon);
    payload
        .iter()
        .find(|(name, _)| normalize_name(name.as_str()) == target)
        .or_else(|| {
            payload
                .iter()
                .find(|(name, _)| normalize_name(name.as_str()).contains(target.as_str()))
        })
        .map(|(name, sets)| (name.as_str(), sets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Map<String, Value> {
        let value = json!({
            "Great Tusk": {"tier": "ou"},
            "Garchomp": {"tier": "uu"},
            "Mega Garchomp": {"tier": "ubers"},
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn exact_match_ignores_case_and_separators() {
        let payload = payload();
        let (name, _) = find_entry(&payload, "great tusk").expect("found");
        assert_eq!(name, "Great Tusk");
        let (name, _) = find_entry(&payload, "GARCHOMP").expect("found");
        assert_eq!(name, "Garchomp");
    }

    #[test]
    fn exact_match_wins_over_substring() {
        // "garchomp" is a substring of "Mega Garchomp" too; the exact
        // match must win regardless of key order.
        let payload = payload();
        let (name, _) = find_entry(&payload, "garchomp").expect("found");
        assert_eq!(name, "Garchomp");
    }

    #[test]
    fn substring_fallback_takes_first_in_payload_order() {
        let payload = payload();
        let (name, _) = find_entry(&payload, "chomp").expect("found");
        assert_eq!(name, "Garchomp");
    }

    #[test]
    fn absent_name_finds_nothing() {
        let payload = payload();
        assert!(find_entry(&payload, "azumarill").is_none());
    }
}
