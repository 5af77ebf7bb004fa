//! Format discovery cache.
//!
//! The sets service publishes one resource per `{generation}{tier}`
//! format, and which formats exist varies by generation. Rather than
//! hard-coding that layout, the gateway probes a candidate list once and
//! remembers the survivors here. It also remembers which tiers a given
//! Pokemon was last found in, so a repeat lookup queries those tiers
//! first instead of re-probing the whole generation.
//!
//! Both records age out on an independent, much longer TTL than the
//! response cache: resource existence churns slowly, payload contents
//! churn fast.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// Configuration for format discovery.
///
/// ```rust
/// # use rotom::DiscoveryConfig;
/// # use std::time::Duration;
/// let config = DiscoveryConfig::new()
///     .ttl(Duration::from_secs(12 * 3600))
///     .priority_formats(["ou", "ubers"]);
/// ```
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Time-to-live for discovery records. Default: 6 hours.
    pub ttl: Duration,
    /// Formats probed first, in order. Default: the most common ones.
    pub priority_formats: Vec<String>,
    /// Full candidate list a generation is probed against.
    pub candidate_formats: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let as_strings = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            ttl: Duration::from_secs(6 * 3600),
            priority_formats: as_strings(&["ou", "ubers", "uu", "doublesou"]),
            candidate_formats: as_strings(&[
                "ou",
                "ubers",
                "nationaldex",
                "uu",
                "doublesou",
                "ru",
                "nu",
                "pu",
                "lc",
                "monotype",
                "1v1",
                "vgc2025regh",
                "zu",
                "cap",
                "ag",
                "nfe",
            ]),
        }
    }
}

impl DiscoveryConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time-to-live for discovery records.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the formats probed first.
    pub fn priority_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority_formats = formats.into_iter().map(Into::into).collect();
        self
    }

    /// Set the full candidate format list.
    pub fn candidate_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidate_formats = formats.into_iter().map(Into::into).collect();
        self
    }
}

struct Stamped<T> {
    value: T,
    stored_at: SystemTime,
}

struct Inner {
    /// generation -> formats that exist for it.
    formats: HashMap<String, Stamped<BTreeSet<String>>>,
    /// "{generation}:{pokemon}" -> tiers the Pokemon was found in.
    locations: HashMap<String, Stamped<Vec<String>>>,
}

/// Thread-safe cache of probe results, on the discovery TTL.
pub(crate) struct DiscoveryCache {
    inner: Mutex<Inner>,
    ttl: Duration,
}

impl DiscoveryCache {
    pub fn new(config: &DiscoveryConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                formats: HashMap::new(),
                locations: HashMap::new(),
            }),
            ttl: config.ttl,
        }
    }

    /// Formats known to exist for a generation, if discovered recently.
    pub fn formats(&self, generation: &str) -> Option<BTreeSet<String>> {
        let now = SystemTime::now();
        let mut inner = self.lock();
        if let Some(stamped) = inner.formats.get(generation) {
            if Self::fresh(stamped.stored_at, now, self.ttl) {
                return Some(stamped.value.clone());
            }
            inner.formats.remove(generation);
        }
        None
    }

    pub fn set_formats(&self, generation: String, formats: BTreeSet<String>) {
        self.lock().formats.insert(
            generation,
            Stamped {
                value: formats,
                stored_at: SystemTime::now(),
            },
        );
    }

    /// Tiers a Pokemon was last found in, if remembered recently.
    pub fn locations(&self, key: &str) -> Option<Vec<String>> {
        let now = SystemTime::now();
        let mut inner = self.lock();
        if let Some(stamped) = inner.locations.get(key) {
            if Self::fresh(stamped.stored_at, now, self.ttl) {
                return Some(stamped.value.clone());
            }
            inner.locations.remove(key);
        }
        None
    }

    pub fn set_locations(&self, key: String, tiers: Vec<String>) {
        self.lock().locations.insert(
            key,
            Stamped {
                value: tiers,
                stored_at: SystemTime::now(),
            },
        );
    }

    /// Drop expired records from both maps. Called by the background sweep.
    pub fn remove_expired(&self) -> usize {
        let now = SystemTime::now();
        let ttl = self.ttl;
        let mut inner = self.lock();
        let before = inner.formats.len() + inner.locations.len();
        inner
            .formats
            .retain(|_, stamped| Self::fresh(stamped.stored_at, now, ttl));
        inner
            .locations
            .retain(|_, stamped| Self::fresh(stamped.stored_at, now, ttl));
        before - (inner.formats.len() + inner.locations.len())
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.formats.clear();
        inner.locations.clear();
    }

    /// Generations with a live discovery record.
    pub fn generation_count(&self) -> usize {
        self.lock().formats.len()
    }

    /// Copy out live records for persistence:
    /// `(formats, locations)`, each with their original timestamps.
    #[allow(clippy::type_complexity)]
    pub fn snapshot(
        &self,
    ) -> (
        Vec<(String, BTreeSet<String>, SystemTime)>,
        Vec<(String, Vec<String>, SystemTime)>,
    ) {
        let now = SystemTime::now();
        let inner = self.lock();
        let formats = inner
            .formats
            .iter()
            .filter(|(_, stamped)| Self::fresh(stamped.stored_at, now, self.ttl))
            .map(|(key, stamped)| (key.clone(), stamped.value.clone(), stamped.stored_at))
            .collect();
        let locations = inner
            .locations
            .iter()
            .filter(|(_, stamped)| Self::fresh(stamped.stored_at, now, self.ttl))
            .map(|(key, stamped)| (key.clone(), stamped.value.clone(), stamped.stored_at))
            .collect();
        (formats, locations)
    }

    /// Readmit persisted records, discarding any already past the TTL.
    /// Returns how many were admitted.
    pub fn absorb(
        &self,
        formats: Vec<(String, BTreeSet<String>, SystemTime)>,
        locations: Vec<(String, Vec<String>, SystemTime)>,
    ) -> usize {
        let now = SystemTime::now();
        let ttl = self.ttl;
        let mut inner = self.lock();
        let mut admitted = 0;
        for (key, value, stored_at) in formats {
            if Self::fresh(stored_at, now, ttl) {
                inner.formats.insert(key, Stamped { value, stored_at });
                admitted += 1;
            }
        }
        for (key, value, stored_at) in locations {
            if Self::fresh(stored_at, now, ttl) {
                inner.locations.insert(key, Stamped { value, stored_at });
                admitted += 1;
            }
        }
        admitted
    }

    fn fresh(stored_at: SystemTime, now: SystemTime, ttl: Duration) -> bool {
        match now.duration_since(stored_at) {
            Ok(age) => age < ttl,
            Err(_) => true,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("discovery cache lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formats_of(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn formats_round_trip() {
        let cache = DiscoveryCache::new(&DiscoveryConfig::new());
        assert!(cache.formats("gen9").is_none());

        cache.set_formats("gen9".into(), formats_of(&["ou", "ubers"]));
        assert_eq!(cache.formats("gen9"), Some(formats_of(&["ou", "ubers"])));
        assert_eq!(cache.generation_count(), 1);
    }

    #[test]
    fn locations_round_trip() {
        let cache = DiscoveryCache::new(&DiscoveryConfig::new());
        cache.set_locations("gen9:garchomp".into(), vec!["ubers".into()]);

        assert_eq!(
            cache.locations("gen9:garchomp"),
            Some(vec!["ubers".to_string()])
        );
        assert!(cache.locations("gen9:azumarill").is_none());
    }

    #[test]
    fn ttl_expiry() {
        let config = DiscoveryConfig::new().ttl(Duration::from_millis(10));
        let cache = DiscoveryCache::new(&config);
        cache.set_formats("gen9".into(), formats_of(&["ou"]));

        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.formats("gen9").is_none());
    }

    #[test]
    fn sweep_drops_expired_records() {
        let config = DiscoveryConfig::new().ttl(Duration::from_millis(10));
        let cache = DiscoveryCache::new(&config);
        cache.set_formats("gen9".into(), formats_of(&["ou"]));
        cache.set_locations("gen9:garchomp".into(), vec!["ou".into()]);

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.remove_expired(), 2);
        assert_eq!(cache.generation_count(), 0);
    }

    #[test]
    fn absorb_respects_ttl() {
        let cache = DiscoveryCache::new(&DiscoveryConfig::new().ttl(Duration::from_secs(60)));
        let now = SystemTime::now();
        let stale = now - Duration::from_secs(120);
        let admitted = cache.absorb(
            vec![
                ("gen9".into(), formats_of(&["ou"]), now),
                ("gen8".into(), formats_of(&["ou"]), stale),
            ],
            vec![("gen9:garchomp".into(), vec!["ou".into()], now)],
        );

        assert_eq!(admitted, 2);
        assert!(cache.formats("gen9").is_some());
        assert!(cache.formats("gen8").is_none());
    }

    #[test]
    fn config_builder_pattern() {
        let config = DiscoveryConfig::new()
            .ttl(Duration::from_secs(3600))
            .priority_formats(["ou"])
            .candidate_formats(["ou", "uu"]);
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert_eq!(config.priority_formats, vec!["ou".to_string()]);
        assert_eq!(config.candidate_formats.len(), 2);
    }
}
