use chrono::{SecondsFormat, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One simulated device reading, shaped for the ingestion wire format.
///
/// Built fresh per request and discarded once serialized; nothing retains it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// UTC instant at construction time, RFC 3339 with a literal `Z` suffix.
    pub timestamp: String,
    pub cpu: f64,
    pub rps: u64,
}

/// How one anomalous cpu value is produced: a fixed out-of-range constant,
/// or a fresh uniform draw over a tail sub-range.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CpuRule {
    Fixed(f64),
    Uniform(f64, f64),
}

impl CpuRule {
    fn eval(&self, rng: &mut impl Rng) -> f64 {
        match *self {
            CpuRule::Fixed(value) => value,
            CpuRule::Uniform(lo, hi) => rng.gen_range(lo..=hi),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            CpuRule::Fixed(value) => check_float_span(value, value),
            CpuRule::Uniform(lo, hi) => check_float_span(lo, hi),
        }
    }
}

/// Integer-valued counterpart of [`CpuRule`], for rps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RpsRule {
    Fixed(u64),
    Uniform(u64, u64),
}

impl RpsRule {
    fn eval(&self, rng: &mut impl Rng) -> u64 {
        match *self {
            RpsRule::Fixed(value) => value,
            RpsRule::Uniform(lo, hi) => rng.gen_range(lo..=hi),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            RpsRule::Fixed(_) => Ok(()),
            RpsRule::Uniform(lo, hi) => check_int_span(lo, hi),
        }
    }
}

/// Controls anomaly injection for single-sample writes.
///
/// Each synthesized sample lands on the anomalous path with `probability`;
/// there cpu and rps are drawn independently from the candidate rule sets.
/// Otherwise both come uniformly from the nominal ranges. The batch path
/// reads only the nominal ranges (bulk ingestion stays nominal).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnomalyPolicy {
    pub probability: f64,
    /// Inclusive nominal cpu bounds.
    pub normal_cpu: (f64, f64),
    /// Inclusive nominal rps bounds.
    pub normal_rps: (u64, u64),
    pub anomalous_cpu: Vec<CpuRule>,
    pub anomalous_rps: Vec<RpsRule>,
}

impl Default for AnomalyPolicy {
    /// The reference anomaly mix: one in ten samples carries either a
    /// near-zero or a saturated reading.
    fn default() -> Self {
        Self {
            probability: 0.1,
            normal_cpu: (40.0, 80.0),
            normal_rps: (800, 1500),
            anomalous_cpu: vec![
                CpuRule::Fixed(5.0),
                CpuRule::Fixed(99.0),
                CpuRule::Uniform(0.0, 10.0),
                CpuRule::Uniform(95.0, 100.0),
            ],
            anomalous_rps: vec![
                RpsRule::Fixed(50),
                RpsRule::Fixed(5000),
                RpsRule::Uniform(0, 100),
                RpsRule::Uniform(4000, 6000),
            ],
        }
    }
}

impl AnomalyPolicy {
    /// A policy that never injects anomalies; only the nominal ranges matter.
    pub fn nominal(cpu: (f64, f64), rps: (u64, u64)) -> Self {
        Self {
            probability: 0.0,
            normal_cpu: cpu,
            normal_rps: rps,
            anomalous_cpu: Vec::new(),
            anomalous_rps: Vec::new(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !self.probability.is_finite() || !(0.0..=1.0).contains(&self.probability) {
            return Err(ConfigError::InvalidProbability(self.probability));
        }
        check_float_span(self.normal_cpu.0, self.normal_cpu.1)?;
        check_int_span(self.normal_rps.0, self.normal_rps.1)?;
        for rule in &self.anomalous_cpu {
            rule.validate()?;
        }
        for rule in &self.anomalous_rps {
            rule.validate()?;
        }
        if self.probability > 0.0 && (self.anomalous_cpu.is_empty() || self.anomalous_rps.is_empty())
        {
            return Err(ConfigError::NoAnomalousCandidates);
        }
        Ok(())
    }
}

/// Inclusive bounds for batch write sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BatchSpec {
    pub size_min: usize,
    pub size_max: usize,
}

impl Default for BatchSpec {
    fn default() -> Self {
        Self {
            size_min: 10,
            size_max: 50,
        }
    }
}

impl BatchSpec {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.size_min < 1 || self.size_max < self.size_min {
            return Err(ConfigError::InvalidBatchRange {
                min: self.size_min,
                max: self.size_max,
            });
        }
        Ok(())
    }
}

/// Builds one sample. Draws the anomaly branch first, then the field values.
pub fn synthesize_single(policy: &AnomalyPolicy, rng: &mut impl Rng) -> MetricSample {
    let (cpu, rps) = if rng.gen::<f64>() < policy.probability {
        // Startup validation guarantees non-empty candidate lists whenever
        // probability is positive.
        let cpu = policy.anomalous_cpu.choose(rng).expect("cpu candidates").eval(rng);
        let rps = policy.anomalous_rps.choose(rng).expect("rps candidates").eval(rng);
        (cpu, rps)
    } else {
        nominal_values(policy, rng)
    };

    MetricSample {
        timestamp: utc_timestamp(),
        cpu,
        rps,
    }
}

/// Builds a batch of always-nominal samples. The size is uniform over the
/// batch bounds, inclusive; each sample takes its own timestamp.
pub fn synthesize_batch(
    policy: &AnomalyPolicy,
    batch: &BatchSpec,
    rng: &mut impl Rng,
) -> Vec<MetricSample> {
    let size = rng.gen_range(batch.size_min..=batch.size_max);
    (0..size)
        .map(|_| {
            let (cpu, rps) = nominal_values(policy, rng);
            MetricSample {
                timestamp: utc_timestamp(),
                cpu,
                rps,
            }
        })
        .collect()
}

fn nominal_values(policy: &AnomalyPolicy, rng: &mut impl Rng) -> (f64, u64) {
    (
        rng.gen_range(policy.normal_cpu.0..=policy.normal_cpu.1),
        rng.gen_range(policy.normal_rps.0..=policy.normal_rps.1),
    )
}

fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn check_float_span(lo: f64, hi: f64) -> Result<(), ConfigError> {
    if !lo.is_finite() || !hi.is_finite() || lo > hi {
        return Err(ConfigError::InvalidValueRange { lo, hi });
    }
    Ok(())
}

fn check_int_span(lo: u64, hi: u64) -> Result<(), ConfigError> {
    if lo > hi {
        return Err(ConfigError::InvalidValueRange {
            lo: lo as f64,
            hi: hi as f64,
        });
    }
    Ok(())
}
