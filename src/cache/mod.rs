//! Caching subsystem.
//!
//! Two caches with independent lifetimes, plus their disk snapshot:
//!
//! - `response::ResponseCache`: short-TTL LRU cache of the sub-items
//!   actually served to callers (sets, sprites, EV yields). Built on the
//!   hand-rolled `store::LruStore`; bounded, with hit/miss accounting.
//!
//! - `discovery::DiscoveryCache`: long-TTL memory of which formats
//!   exist per generation and which tiers a Pokemon was found in, so
//!   repeat lookups skip the full probe.
//!
//! - `persist`: versioned JSON snapshot of both, written on shutdown
//!   and reloaded (TTL permitting) on startup.

pub mod discovery;
pub(crate) mod persist;
pub mod response;
pub(crate) mod store;

pub use discovery::DiscoveryConfig;
pub use response::CacheConfig;

pub(crate) use discovery::DiscoveryCache;
pub(crate) use response::{CachedPayload, ResponseCache};
