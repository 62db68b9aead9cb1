use super::traits::ConfigSection;
use crate::artifacts::{RetentionCollection, RetentionMode, RetentionPolicy};
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub model_dir: PathBuf,
    pub training_retention: RetentionPolicy,
    pub prediction_retention: RetentionPolicy,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            training_retention: RetentionPolicy {
                mode: RetentionMode::Drop,
                collection: RetentionCollection::ModelRetraining,
            },
            prediction_retention: RetentionPolicy {
                mode: RetentionMode::Drop,
                collection: RetentionCollection::Prediction,
            },
        }
    }
}

impl ConfigSection for ArtifactsConfig {
    fn section_name() -> &'static str {
        "artifacts"
    }

    fn validate(&self) -> Result<()> {
        if self.model_dir.as_os_str().is_empty() {
            return Err(PipelineError::Configuration(
                "artifacts.model_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
