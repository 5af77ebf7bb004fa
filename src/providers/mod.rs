//! Upstream service clients and the policies wrapped around them.
//!
//! - [`sets::SetsClient`]: the per-format competitive sets service.
//! - [`dex::DexClient`]: the species/sprite/stats service.
//! - [`retry`]: shared exponential-backoff retry helper.
//! - [`breaker`]: per-operation circuit breakers.
//!
//! The clients are thin: they speak HTTP and decode payloads. Caching,
//! the concurrency gate, retry, and breakers all live one level up in
//! [`RotomClient`](crate::RotomClient), composed around these calls.

pub mod breaker;
pub mod dex;
pub mod retry;
pub mod sets;

pub use breaker::{BreakerConfig, BreakerState};
pub use dex::{DexClient, PokemonPayload, SpeciesInfo};
pub use retry::RetryConfig;
pub use sets::SetsClient;

pub(crate) use breaker::CircuitBreaker;
pub(crate) use retry::with_retry;

use std::time::Duration;

use crate::{Result, RotomError};

/// Map a non-404 error status onto the taxonomy.
///
/// Callers handle 404 themselves, since "absent" is a normal outcome for
/// both services, not a failure.
pub(crate) fn handle_response_errors(response: &reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    match status.as_u16() {
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(RotomError::RateLimited { retry_after })
        }
        code => Err(RotomError::Api {
            status: code,
            message: format!("upstream error: {}", status),
        }),
    }
}
