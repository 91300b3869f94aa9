//! Session tuning knobs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{FewShotError, FewShotResult};

/// Default number of neighbors consulted per prediction.
pub const DEFAULT_NEIGHBORS: usize = 3;

/// Default number of exemplars added per correction.
pub const DEFAULT_CORRECTION_WEIGHT: usize = 3;

/// Default minimum examples per category before training.
pub const DEFAULT_MIN_EXAMPLES: usize = 3;

/// Default minimum number of categories before training.
pub const DEFAULT_MIN_CATEGORIES: usize = 2;

/// A classifier needs at least two classes to tell apart. Configs may raise
/// the category floor but never lower it below this.
pub const MIN_CATEGORIES_FLOOR: usize = 2;

/// Configuration for a classification session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// k in the k-nearest-neighbor vote.
    pub neighbors: usize,
    /// How many times a corrected image is inserted as an exemplar.
    pub correction_weight: usize,
    pub min_examples_per_category: usize,
    /// Never below [`MIN_CATEGORIES_FLOOR`].
    pub min_categories: usize,
    /// CLIP ONNX model. Falls back to the default model location when unset.
    pub model_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            neighbors: DEFAULT_NEIGHBORS,
            correction_weight: DEFAULT_CORRECTION_WEIGHT,
            min_examples_per_category: DEFAULT_MIN_EXAMPLES,
            min_categories: DEFAULT_MIN_CATEGORIES,
            model_path: None,
        }
    }
}

impl SessionConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> FewShotResult<Self> {
        let bytes = std::fs::read(path)?;
        let config: SessionConfig = serde_json::from_slice(&bytes).map_err(|e| {
            FewShotError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make training or voting meaningless.
    pub fn validate(&self) -> FewShotResult<()> {
        if self.neighbors == 0 {
            return Err(FewShotError::InvalidConfig("neighbors must be at least 1".into()));
        }
        if self.correction_weight == 0 {
            return Err(FewShotError::InvalidConfig(
                "correction_weight must be at least 1".into(),
            ));
        }
        if self.min_examples_per_category == 0 {
            return Err(FewShotError::InvalidConfig(
                "min_examples_per_category must be at least 1".into(),
            ));
        }
        if self.min_categories < MIN_CATEGORIES_FLOOR {
            return Err(FewShotError::InvalidConfig(format!(
                "min_categories must be at least {MIN_CATEGORIES_FLOOR}"
            )));
        }
        Ok(())
    }
}
