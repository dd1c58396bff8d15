use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{LineageError, Result};

/// One stage of a metric's computation. Records missing fields in the input
/// corpus deserialize to empty strings rather than failing the load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub description: String,
}

impl Step {
    /// Flattened text form used as the unit of semantic retrieval. Keeps the
    /// original casing; only query-side text is normalized.
    pub fn document(&self, metric: &str) -> String {
        format!(
            "METRIC: {}\nSTEP_ID: {}\nSQL: {}\nDESC: {}",
            metric, self.id, self.sql, self.description
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(default)]
    pub metric: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Globally unique step identity. Both retrieval legs produce candidates
/// through this function so hits referencing the same step compare equal.
pub fn step_key(metric: &str, step_id: &str) -> String {
    format!("{metric}__{step_id}")
}

/// The metric corpus: metric name to definition, immutable after load.
/// A `BTreeMap` keeps iteration order stable so index build and the
/// boosting scan are deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lineage {
    metrics: BTreeMap<String, Metric>,
}

impl Lineage {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LineageError::CorpusNotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        let lineage: Lineage = serde_json::from_str(&contents)?;
        info!(
            metrics = lineage.metrics.len(),
            steps = lineage.step_count(),
            "loaded lineage corpus"
        );
        Ok(lineage)
    }

    pub fn from_metrics(metrics: impl IntoIterator<Item = Metric>) -> Self {
        Self {
            metrics: metrics
                .into_iter()
                .map(|metric| (metric.metric.clone(), metric))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Metric)> {
        self.metrics.iter()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn step_count(&self) -> usize {
        self.metrics.values().map(|metric| metric.steps.len()).sum()
    }
}
