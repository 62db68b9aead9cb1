use super::traits::ConfigSection;
use crate::error::{PipelineError, Result};
use crate::types::CURRENT_MODEL_VERSION;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Date the model bundle is resolved against; today when unset
    pub scoring_date: Option<NaiveDate>,
    /// Score and report without writing to the warehouse
    pub dry_run: bool,
    pub model_version: String,
    pub predictions_table: String,
    pub job_log_table: String,
    pub output_dir: PathBuf,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            scoring_date: None,
            dry_run: false,
            model_version: CURRENT_MODEL_VERSION.to_string(),
            predictions_table: "conversion_predictions_log".to_string(),
            job_log_table: "prediction_job_log".to_string(),
            output_dir: PathBuf::from("warehouse"),
        }
    }
}

impl ConfigSection for PredictionConfig {
    fn section_name() -> &'static str {
        "prediction"
    }

    fn validate(&self) -> Result<()> {
        for (key, table) in [
            ("predictions_table", &self.predictions_table),
            ("job_log_table", &self.job_log_table),
        ] {
            if table.trim().is_empty() {
                return Err(PipelineError::Configuration(format!(
                    "prediction.{} must not be empty",
                    key
                )));
            }
        }
        if self.predictions_table == self.job_log_table {
            return Err(PipelineError::Configuration(
                "Predictions and job log must go to different tables".to_string(),
            ));
        }
        Ok(())
    }
}
