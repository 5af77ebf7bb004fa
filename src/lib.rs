//! Rotom - caching data gateway for competitive Pokemon APIs
//!
//! This crate fronts two public REST services (the per-format
//! competitive sets service and the species/sprite service) behind one
//! client that minimizes redundant network calls and tolerates transient
//! upstream failures: a bounded LRU + TTL response cache, a concurrency
//! gate on outbound requests, retry with exponential backoff, per-
//! operation circuit breakers, and optional disk persistence of the
//! cache across restarts.
//!
//! # Example
//!
//! ```rust,no_run
//! use rotom::Rotom;
//!
//! #[tokio::main]
//! async fn main() -> rotom::Result<()> {
//!     let gateway = Rotom::builder().build()?;
//!
//!     if let Some(sets) = gateway.fetch_sets("Garchomp", "gen9", "ou").await? {
//!         println!("{sets:#}");
//!     }
//!
//!     // Tier unknown? Probe the whole generation (bounded concurrency):
//!     let found = gateway.find_across_tiers("Garchomp", "gen9").await?;
//!     for tier in found.keys() {
//!         println!("present in {tier}");
//!     }
//!
//!     gateway.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Not-found vs failure
//!
//! Upstream "doesn't exist" is a normal outcome, returned as `Ok(None)`
//! (or [`SpriteOutcome::NotFound`]); it never shares an error path with
//! timeouts or 5xx responses. A sprite requested for a generation before
//! the species existed is reported as
//! [`SpriteOutcome::NotIntroduced`], carrying the earliest valid
//! generation.

pub mod cache;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod telemetry;
pub mod traits;
pub mod types;

// Re-export main types at crate root
pub use error::{Result, RotomError};
pub use gateway::{Rotom, RotomBuilder, RotomClient};
pub use traits::DataGateway;

// Re-export configuration types
pub use cache::{CacheConfig, DiscoveryConfig};
pub use providers::{BreakerConfig, BreakerState, RetryConfig};

// Re-export all data types
pub use types::{CacheStats, EvYield, MAX_GENERATION, SetsData, SpriteInfo, SpriteOutcome};
