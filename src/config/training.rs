use super::traits::ConfigSection;
use crate::error::{PipelineError, Result};
use crate::ml::models::{ForestParams, MaxFeatures};
use crate::ml::splitters::{validate_ratio, SplitConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Replace artifacts already stored for the new model date; when off, a
    /// second run for the same date fails before training
    pub overwrite_files: bool,
    pub split: SplitConfig,
    pub forest: ForestParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            overwrite_files: true,
            split: SplitConfig::default(),
            forest: ForestParams::default(),
        }
    }
}

impl ConfigSection for TrainingConfig {
    fn section_name() -> &'static str {
        "training"
    }

    fn validate(&self) -> Result<()> {
        validate_ratio(self.split.ratio)?;
        if self.forest.n_estimators == 0 {
            return Err(PipelineError::Configuration(
                "Forest needs at least one estimator".to_string(),
            ));
        }
        if self.forest.min_samples_split < 2 {
            return Err(PipelineError::Configuration(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.forest.max_features == MaxFeatures::Fixed(0) {
            return Err(PipelineError::Configuration(
                "max_features must select at least one feature".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = TrainingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.split.ratio, 0.6);
        assert_eq!(config.forest.n_estimators, 250);
    }

    #[test]
    fn test_ratio_out_of_range() {
        let mut config = TrainingConfig::default();
        config.split.ratio = 1.5;
        assert!(matches!(config.validate(), Err(PipelineError::Configuration(_))));
    }
}
