use std::time::Duration;

use rand::Rng;

use crate::action::Action;
use crate::error::ConfigError;

/// Inclusive think-time bounds between a user's consecutive actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaceRange {
    min: Duration,
    max: Duration,
}

impl PaceRange {
    pub fn new(min: Duration, max: Duration) -> Result<Self, ConfigError> {
        if min > max {
            return Err(ConfigError::InvalidPaceRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Uniform draw over the bounds. Equal bounds short-circuit to the exact
    /// value so a fixed pace never wobbles.
    pub fn sample(&self, rng: &mut impl Rng) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        Duration::from_nanos(rng.gen_range(self.min.as_nanos() as u64..=self.max.as_nanos() as u64))
    }
}

/// A named, validated set of weighted actions plus the pace of the users
/// running them.
///
/// Selection uses cumulative weight boundaries: a draw in `[0, total)` maps
/// to the first action whose boundary exceeds it, so zero-weight actions are
/// skipped and ties resolve in declared order.
#[derive(Debug, Clone)]
pub struct Profile {
    name: String,
    actions: Vec<Action>,
    boundaries: Vec<u64>,
    total_weight: u64,
    pace: PaceRange,
}

impl Profile {
    pub fn new(
        name: impl Into<String>,
        actions: Vec<Action>,
        pace: PaceRange,
    ) -> Result<Self, ConfigError> {
        if actions.is_empty() {
            return Err(ConfigError::EmptyActions);
        }
        for action in &actions {
            action.validate()?;
        }
        let mut boundaries = Vec::with_capacity(actions.len());
        let mut total_weight = 0u64;
        for action in &actions {
            total_weight += u64::from(action.weight);
            boundaries.push(total_weight);
        }
        if total_weight == 0 {
            return Err(ConfigError::ZeroTotalWeight);
        }
        Ok(Self {
            name: name.into(),
            actions,
            boundaries,
            total_weight,
            pace,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn pace(&self) -> PaceRange {
        self.pace
    }

    /// Picks the next action for one iteration of a user's loop.
    pub fn select(&self, rng: &mut impl Rng) -> &Action {
        self.action_for(rng.gen_range(0..self.total_weight))
    }

    fn action_for(&self, draw: u64) -> &Action {
        let idx = self.boundaries.partition_point(|&b| b <= draw);
        &self.actions[idx]
    }
}
