//! Virtual-user swarm engine for synthetic load.
//!
//! A swarm spawns a population of independent virtual users at a ramp rate.
//! Each user loops: pick a weighted action from its profile, issue it against
//! a [`Target`], then pause for a sampled think time. Stopping is cooperative;
//! in-flight requests get a grace period to drain.
//!
//! The engine is transport-agnostic. Binaries plug in an HTTP client through
//! the [`Target`] trait; tests plug in fakes and drive the clock.

pub mod action;
pub mod error;
pub mod payload;
pub mod profile;
pub mod swarm;
pub mod target;
pub mod user;

pub use action::{Action, ActionKind};
pub use error::{ConfigError, RequestError};
pub use payload::{AnomalyPolicy, BatchSpec, CpuRule, MetricSample, RpsRule};
pub use profile::{PaceRange, Profile};
pub use swarm::{Cohort, Swarm, SwarmConfig, SwarmHandle};
pub use target::Target;
pub use user::{UserState, VirtualUser};
