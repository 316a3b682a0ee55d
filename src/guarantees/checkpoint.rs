//! Usage snapshots and checkpoint records.
//!
//! Everything here is a plain serializable record; durable storage is left to
//! the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::config::duration_ms;

/// Voluntary snapshot of partial progress and the usage at that moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Best answer available when the snapshot was taken
    pub partial_result: String,
    pub cost_used: f64,
    pub tokens_used: u64,
    pub calls_used: u32,
    /// Recursion depth at the time of the snapshot
    pub depth: u32,
    pub timestamp: DateTime<Utc>,
}

/// Resources consumed so far.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub cost_usd: f64,
    pub tokens: u64,
    pub calls: u32,
    pub current_depth: u32,
    /// Deepest recursion reached; never decreases
    pub max_depth_seen: u32,
    #[serde(rename = "elapsed_ms", with = "duration_ms")]
    pub elapsed: Duration,
}

impl Usage {
    /// Format as a single human-readable line.
    pub fn summary(&self) -> String {
        format!(
            "${:.4} spent, {} tokens, {} calls, depth {} (max {}), {:.1}s elapsed",
            self.cost_usd,
            self.tokens,
            self.calls,
            self.current_depth,
            self.max_depth_seen,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Headroom left before each limit, clamped at zero.
///
/// Unlimited dimensions report the largest representable value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RemainingBudget {
    pub cost_usd: f64,
    pub tokens: u64,
    pub calls: u32,
    /// Further levels of recursion allowed from the current depth
    pub depth: u32,
    #[serde(rename = "time_ms", with = "duration_ms")]
    pub time: Duration,
}
