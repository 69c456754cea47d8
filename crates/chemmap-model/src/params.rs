// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::ValidationError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Set-overlap distance between binary vectors: `1 - |a ∩ b| / |a ∪ b|`.
    #[default]
    Jaccard,
}

/// Global thread policy of the embedding step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Single worker thread and a seeded layout; bit-identical across runs.
    Deterministic,
    /// Worker pool for neighbour search and a lock-free layout whose result
    /// may vary between runs.
    #[default]
    Parallel,
}

/// How cache artifact names are derived.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheKeyStrategy {
    /// Same-named artifact is reused regardless of input content.
    #[default]
    DatasetName,
    /// Artifact names embed a hash of the input content and parameters.
    ContentHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingParams {
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub spread: f64,
    pub metric: Metric,
    pub seed: u64,
    pub n_epochs: Option<usize>,
    pub negative_sample_rate: usize,
    pub learning_rate: f64,
}

impl Default for EmbeddingParams {
    fn default() -> Self {
        Self {
            n_neighbors: 50,
            min_dist: 0.1,
            spread: 1.0,
            metric: Metric::Jaccard,
            seed: 42,
            n_epochs: None,
            negative_sample_rate: 5,
            learning_rate: 1.0,
        }
    }
}

impl EmbeddingParams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.n_neighbors < 2 {
            return Err(ValidationError("n_neighbors must be >= 2".to_string()));
        }
        if !(self.spread.is_finite() && self.spread > 0.0) {
            return Err(ValidationError("spread must be a positive number".to_string()));
        }
        if !(self.min_dist.is_finite() && self.min_dist >= 0.0) {
            return Err(ValidationError("min_dist must be >= 0".to_string()));
        }
        if self.min_dist > self.spread {
            return Err(ValidationError(format!(
                "min_dist {} must not exceed spread {}",
                self.min_dist, self.spread
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ValidationError(
                "learning_rate must be a positive number".to_string(),
            ));
        }
        if self.n_epochs == Some(0) {
            return Err(ValidationError("n_epochs must be >= 1 when set".to_string()));
        }
        Ok(())
    }

    /// Epoch count used for `n_rows` inputs when none is configured.
    #[must_use]
    pub fn effective_epochs(&self, n_rows: usize) -> usize {
        self.n_epochs
            .unwrap_or(if n_rows <= 10_000 { 500 } else { 200 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        EmbeddingParams::default().validate().expect("defaults are valid");
    }

    #[test]
    fn min_dist_above_spread_is_rejected() {
        let params = EmbeddingParams {
            min_dist: 2.0,
            ..EmbeddingParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn epochs_default_by_size() {
        let p = EmbeddingParams::default();
        assert_eq!(p.effective_epochs(100), 500);
        assert_eq!(p.effective_epochs(20_000), 200);
        let fixed = EmbeddingParams {
            n_epochs: Some(30),
            ..p
        };
        assert_eq!(fixed.effective_epochs(20_000), 30);
    }
}
