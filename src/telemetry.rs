//! Telemetry metric name constants.
//!
//! Centralised metric names for rotom operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `rotom_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `service`: upstream queried ("sets" | "dex")
//! - `operation`: call site (e.g. "fetch_sets", "fetch_sprite")
//! - `status`: outcome, "ok" or "error"

/// Total upstream requests dispatched through the gateway.
///
/// Labels: `service`, `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "rotom_requests_total";

/// Upstream request duration in seconds.
///
/// Labels: `service`, `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "rotom_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `service`, `operation`.
pub const RETRIES_TOTAL: &str = "rotom_retries_total";

/// Total response cache hits.
///
/// Labels: `operation`.
pub const CACHE_HITS_TOTAL: &str = "rotom_cache_hits_total";

/// Total response cache misses.
///
/// Labels: `operation`.
pub const CACHE_MISSES_TOTAL: &str = "rotom_cache_misses_total";

/// Total format discovery sweeps performed against the sets service.
pub const FORMAT_DISCOVERIES_TOTAL: &str = "rotom_format_discoveries_total";

/// Total circuit breaker open transitions.
///
/// Labels: `operation`.
pub const BREAKER_OPENS_TOTAL: &str = "rotom_breaker_opens_total";
