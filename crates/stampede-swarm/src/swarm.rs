use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::profile::Profile;
use crate::target::Target;
use crate::user::VirtualUser;

/// A profile and how many users run it.
#[derive(Debug, Clone)]
pub struct Cohort {
    pub profile: Profile,
    pub users: usize,
}

/// Everything a run needs besides the target itself.
#[derive(Debug, Clone)]
pub struct SwarmConfig {
    pub cohorts: Vec<Cohort>,
    /// Users spawned per second during ramp-up.
    pub ramp_rate: f64,
    /// Stop automatically after this long. `None` runs until `stop`.
    pub run_duration: Option<Duration>,
    /// How long a stopping user may keep its in-flight request alive.
    pub grace: Duration,
    /// Base for per-user RNG seeds; pin it to replay a run.
    pub seed: u64,
}

/// A running swarm. Owns the stop token and the per-user tasks.
///
/// Users spawn at `ramp_rate` per second in cohort order, the first one
/// immediately. `stop` is idempotent; users not yet past their ramp delay
/// when it fires never issue a request.
pub struct Swarm {
    token: CancellationToken,
    active: Arc<AtomicUsize>,
    total: usize,
    tasks: Vec<JoinHandle<()>>,
}

impl Swarm {
    /// Validates the run shape and spawns one task per user onto the current
    /// runtime.
    pub fn start(config: SwarmConfig, target: Arc<dyn Target>) -> Result<Self, ConfigError> {
        let total: usize = config.cohorts.iter().map(|c| c.users).sum();
        if total == 0 {
            return Err(ConfigError::NoUsers);
        }
        if !config.ramp_rate.is_finite() || config.ramp_rate <= 0.0 {
            return Err(ConfigError::InvalidRampRate(config.ramp_rate));
        }

        info!(
            users = total,
            cohorts = config.cohorts.len(),
            ramp_rate = config.ramp_rate,
            seed = config.seed,
            "swarm starting"
        );

        let token = CancellationToken::new();
        let active = Arc::new(AtomicUsize::new(0));
        let mut tasks = Vec::with_capacity(total);
        let mut index = 0u64;

        for cohort in config.cohorts {
            let profile = Arc::new(cohort.profile);
            for _ in 0..cohort.users {
                let delay = Duration::from_secs_f64(index as f64 / config.ramp_rate);
                let user_token = token.child_token();
                let mut user = VirtualUser::new(
                    index,
                    Arc::clone(&profile),
                    Arc::clone(&target),
                    user_token.clone(),
                    config.grace,
                    config.seed.wrapping_add(index),
                );
                let active = Arc::clone(&active);
                tasks.push(tokio::spawn(async move {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        // Stopped during ramp-up: this user never starts.
                        _ = user_token.cancelled() => return,
                    }
                    active.fetch_add(1, Ordering::Relaxed);
                    user.run().await;
                    active.fetch_sub(1, Ordering::Relaxed);
                }));
                index += 1;
            }
        }

        if let Some(duration) = config.run_duration {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {
                        info!(seconds = duration.as_secs_f64(), "run duration reached, stopping swarm");
                        token.cancel();
                    }
                    _ = token.cancelled() => {}
                }
            });
        }

        Ok(Self {
            token,
            active,
            total,
            tasks,
        })
    }

    /// Signals every user to stop. Safe to call more than once.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Users currently inside their action loop.
    pub fn active_users(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn total_users(&self) -> usize {
        self.total
    }

    /// A cheap clone for signal handlers and reporters.
    pub fn handle(&self) -> SwarmHandle {
        SwarmHandle {
            token: self.token.clone(),
            active: Arc::clone(&self.active),
        }
    }

    /// Resolves once every user task has wound down. Without a run duration
    /// or a `stop` call this waits forever.
    pub async fn wait(self) {
        for task in self.tasks {
            if task.await.is_err() {
                warn!("virtual user task panicked");
            }
        }
        info!("swarm stopped");
    }
}

/// Detached view of a running swarm.
#[derive(Clone)]
pub struct SwarmHandle {
    token: CancellationToken,
    active: Arc<AtomicUsize>,
}

impl SwarmHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn active_users(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}
