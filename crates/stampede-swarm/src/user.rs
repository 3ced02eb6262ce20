use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::action::{Action, ActionKind};
use crate::error::RequestError;
use crate::payload::{synthesize_batch, synthesize_single};
use crate::profile::Profile;
use crate::target::Target;

/// Lifecycle of a single virtual user.
///
/// `Created` until `run` is polled, `Running` while looping, `Stopping` once
/// a stop is observed (possibly with one request still in flight), `Stopped`
/// when the loop has fully wound down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserState {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// One independent traffic loop: select an action, issue it, think, repeat.
///
/// Users never abort mid-request on their own; a stop signal lets the
/// in-flight exchange drain within the grace period before the loop exits.
/// Request failures are recorded and the loop continues.
pub struct VirtualUser {
    id: u64,
    profile: Arc<Profile>,
    target: Arc<dyn Target>,
    rng: StdRng,
    token: CancellationToken,
    grace: Duration,
    state: UserState,
}

impl VirtualUser {
    pub fn new(
        id: u64,
        profile: Arc<Profile>,
        target: Arc<dyn Target>,
        token: CancellationToken,
        grace: Duration,
        seed: u64,
    ) -> Self {
        Self {
            id,
            profile,
            target,
            rng: StdRng::seed_from_u64(seed),
            token,
            grace,
            state: UserState::Created,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> UserState {
        self.state
    }

    /// Drives the user until the stop token fires. Always leaves the user
    /// in `Stopped`.
    pub async fn run(&mut self) {
        self.state = UserState::Running;
        trace!(user = self.id, profile = self.profile.name(), "running");

        let profile = Arc::clone(&self.profile);
        let target = Arc::clone(&self.target);

        while !self.token.is_cancelled() {
            let action = profile.select(&mut self.rng);

            let body = match &action.kind {
                ActionKind::WriteSingle { anomaly } => Some(
                    serde_json::to_string(&synthesize_single(anomaly, &mut self.rng))
                        .expect("sample serializes"),
                ),
                ActionKind::WriteBatch { anomaly, batch } => Some(
                    serde_json::to_string(&synthesize_batch(anomaly, batch, &mut self.rng))
                        .expect("batch serializes"),
                ),
                ActionKind::Read => None,
            };
            let mut call = match body {
                Some(body) => target.post_json(&action.path, body),
                None => target.get(&action.path),
            };

            tokio::select! {
                result = &mut call => self.record(action, result),
                _ = self.token.cancelled() => {
                    self.state = UserState::Stopping;
                    // Let the in-flight request drain, bounded by the grace period.
                    match tokio::time::timeout(self.grace, &mut call).await {
                        Ok(result) => self.record(action, result),
                        Err(_) => warn!(
                            user = self.id,
                            action = %action.name,
                            "grace period expired, abandoning in-flight request"
                        ),
                    }
                    break;
                }
            }

            let pause = profile.pace().sample(&mut self.rng);
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = self.token.cancelled() => {
                    self.state = UserState::Stopping;
                    break;
                }
            }
        }

        if self.state == UserState::Running {
            self.state = UserState::Stopping;
        }
        self.state = UserState::Stopped;
        trace!(user = self.id, "stopped");
    }

    fn record(&self, action: &Action, result: Result<(), RequestError>) {
        if let Err(err) = result {
            debug!(user = self.id, action = %action.name, error = %err, "request failed");
        }
    }
}
