use std::time::Duration;
use thiserror::Error;

/// Configuration problems, caught before any virtual user spawns.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("profile has no actions")]
    EmptyActions,

    #[error("profile action weights sum to zero")]
    ZeroTotalWeight,

    #[error("pace bounds inverted: min {min:?} > max {max:?}")]
    InvalidPaceRange { min: Duration, max: Duration },

    #[error("batch size bounds invalid: min {min}, max {max} (need 1 <= min <= max)")]
    InvalidBatchRange { min: usize, max: usize },

    #[error("anomaly probability {0} outside [0, 1]")]
    InvalidProbability(f64),

    #[error("value range invalid: [{lo}, {hi}] (need finite lo <= hi)")]
    InvalidValueRange { lo: f64, hi: f64 },

    #[error("anomaly probability is positive but a candidate rule set is empty")]
    NoAnomalousCandidates,

    #[error("run has no users")]
    NoUsers,

    #[error("ramp-up rate must be positive and finite, got {0}")]
    InvalidRampRate(f64),
}

/// One request attempt that failed. Recorded by the virtual user, never
/// fatal to its loop.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The exchange never completed: connect failure, timeout, protocol error.
    #[error("transport: {0}")]
    Transport(String),

    /// The exchange completed with a non-2xx status.
    #[error("unexpected status {0}")]
    Status(u16),
}
