use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use stampede_swarm::{
    Action, AnomalyPolicy, BatchSpec, Cohort, ConfigError, PaceRange, Profile, SwarmConfig,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_target_url")]
    pub target_url: String,
    /// Users spawned per second during ramp-up.
    #[serde(default = "default_ramp_rate")]
    pub ramp_rate: f64,
    /// Stop after this many seconds. Omit to run until interrupted.
    #[serde(default)]
    pub run_duration_secs: Option<u64>,
    /// Seconds granted to in-flight requests once a stop is requested.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
    /// Base RNG seed. Omit for a fresh seed per run.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_profiles", rename = "profile")]
    pub profiles: Vec<ProfileConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    pub name: String,
    pub users: usize,
    pub pace_min_ms: u64,
    pub pace_max_ms: u64,
    #[serde(rename = "action")]
    pub actions: Vec<Action>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Config {
            target_url: default_target_url(),
            ramp_rate: default_ramp_rate(),
            run_duration_secs: None,
            grace_secs: default_grace_secs(),
            seed: None,
            profiles: default_profiles(),
        }
    }

    pub fn total_users(&self) -> usize {
        self.profiles.iter().map(|p| p.users).sum()
    }

    /// Rescales the profile mix to a new total, keeping proportions by
    /// largest remainder so the counts always sum to `total`.
    pub fn scale_users(&mut self, total: usize) {
        let current = self.total_users();
        if current == 0 {
            return;
        }

        let mut allotted: Vec<usize> = Vec::with_capacity(self.profiles.len());
        let mut remainders: Vec<(usize, usize)> = Vec::with_capacity(self.profiles.len());
        for (idx, profile) in self.profiles.iter().enumerate() {
            let scaled = total * profile.users;
            allotted.push(scaled / current);
            remainders.push((idx, scaled % current));
        }

        let mut leftover = total - allotted.iter().sum::<usize>();
        remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        for (idx, _) in remainders {
            if leftover == 0 {
                break;
            }
            allotted[idx] += 1;
            leftover -= 1;
        }

        for (profile, users) in self.profiles.iter_mut().zip(allotted) {
            profile.users = users;
        }
    }

    /// Builds the validated run description the engine consumes.
    pub fn swarm_config(&self, seed: u64) -> Result<SwarmConfig, ConfigError> {
        let mut cohorts = Vec::with_capacity(self.profiles.len());
        for profile in &self.profiles {
            let pace = PaceRange::new(
                Duration::from_millis(profile.pace_min_ms),
                Duration::from_millis(profile.pace_max_ms),
            )?;
            cohorts.push(Cohort {
                profile: Profile::new(profile.name.clone(), profile.actions.clone(), pace)?,
                users: profile.users,
            });
        }
        Ok(SwarmConfig {
            cohorts,
            ramp_rate: self.ramp_rate,
            run_duration: self.run_duration_secs.map(Duration::from_secs),
            grace: Duration::from_secs(self.grace_secs),
            seed,
        })
    }
}

/// The stock workload: an interactive mix that writes, reads, and polls
/// health, plus a small bulk-ingestion cohort.
fn default_profiles() -> Vec<ProfileConfig> {
    let nominal = AnomalyPolicy::nominal((20.0, 95.0), (500, 2000));
    vec![
        ProfileConfig {
            name: "interactive".to_string(),
            users: 10,
            pace_min_ms: 10,
            pace_max_ms: 50,
            actions: vec![
                Action::write_single("post_metrics", "/ingest", 3, nominal.clone()),
                Action::write_single(
                    "post_metrics_with_anomaly",
                    "/ingest",
                    1,
                    AnomalyPolicy::default(),
                ),
                Action::read("get_analyze", "/analyze", 1),
                Action::read("get_anomalies", "/anomalies", 1),
                Action::read("get_stats", "/stats", 1),
                Action::read("get_health", "/health", 2),
            ],
        },
        ProfileConfig {
            name: "batch".to_string(),
            users: 2,
            pace_min_ms: 500,
            pace_max_ms: 1000,
            actions: vec![Action::write_batch(
                "post_batch_metrics",
                "/ingest/batch",
                1,
                nominal,
                BatchSpec::default(),
            )],
        },
    ]
}

fn default_target_url() -> String {
    "http://127.0.0.1:8080".to_string()
}
fn default_ramp_rate() -> f64 {
    10.0
}
fn default_grace_secs() -> u64 {
    2
}
