use serde::Deserialize;

use crate::error::ConfigError;
use crate::payload::{AnomalyPolicy, BatchSpec};

/// What a virtual user does when an action is selected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ActionKind {
    /// POST one synthesized sample, subject to anomaly injection.
    WriteSingle {
        #[serde(default)]
        anomaly: AnomalyPolicy,
    },
    /// POST an array of nominal samples.
    WriteBatch {
        #[serde(default)]
        anomaly: AnomalyPolicy,
        #[serde(default)]
        batch: BatchSpec,
    },
    /// GET with no body.
    Read,
}

/// One weighted entry in a workload profile.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Action {
    pub name: String,
    /// Request path relative to the target root, e.g. `/ingest`.
    pub path: String,
    /// Relative selection weight. Zero is legal and means never selected.
    pub weight: u32,
    #[serde(flatten)]
    pub kind: ActionKind,
}

impl Action {
    pub fn write_single(
        name: impl Into<String>,
        path: impl Into<String>,
        weight: u32,
        anomaly: AnomalyPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            weight,
            kind: ActionKind::WriteSingle { anomaly },
        }
    }

    pub fn write_batch(
        name: impl Into<String>,
        path: impl Into<String>,
        weight: u32,
        anomaly: AnomalyPolicy,
        batch: BatchSpec,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            weight,
            kind: ActionKind::WriteBatch { anomaly, batch },
        }
    }

    pub fn read(name: impl Into<String>, path: impl Into<String>, weight: u32) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            weight,
            kind: ActionKind::Read,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match &self.kind {
            ActionKind::WriteSingle { anomaly } => anomaly.validate(),
            ActionKind::WriteBatch { anomaly, batch } => {
                anomaly.validate()?;
                batch.validate()
            }
            ActionKind::Read => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_covers_embedded_policies() {
        let mut anomaly = AnomalyPolicy::default();
        anomaly.probability = -0.5;
        let action = Action::write_single("write", "/ingest", 3, anomaly);
        assert!(matches!(
            action.validate(),
            Err(ConfigError::InvalidProbability(_))
        ));

        let bad_batch = BatchSpec {
            size_min: 0,
            size_max: 0,
        };
        let action = Action::write_batch(
            "bulk",
            "/ingest/batch",
            1,
            AnomalyPolicy::nominal((20.0, 95.0), (500, 2000)),
            bad_batch,
        );
        assert!(matches!(
            action.validate(),
            Err(ConfigError::InvalidBatchRange { .. })
        ));

        assert!(Action::read("health", "/health", 2).validate().is_ok());
    }

    #[test]
    fn kind_deserializes_from_tagged_form() {
        let action: Action = serde_json::from_str(
            r#"{
                "name": "write",
                "path": "/ingest",
                "weight": 3,
                "kind": "write_single",
                "anomaly": { "probability": 0.0, "anomalous_cpu": [], "anomalous_rps": [] }
            }"#,
        )
        .unwrap();
        match action.kind {
            ActionKind::WriteSingle { ref anomaly } => assert_eq!(anomaly.probability, 0.0),
            ref other => panic!("wrong kind: {other:?}"),
        }

        let action: Action = serde_json::from_str(
            r#"{ "name": "health", "path": "/health", "weight": 2, "kind": "read" }"#,
        )
        .unwrap();
        assert_eq!(action.kind, ActionKind::Read);
    }
}
