use super::traits::ConfigSection;
use crate::error::{PipelineError, Result};
use crate::types::AggregationFunction;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Date range and source settings shared by training and prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub min_date: Option<NaiveDate>,
    /// Defaults to the day before the run
    pub max_date: Option<NaiveDate>,
    pub window_length: usize,
    pub aggregation_functions: Vec<AggregationFunction>,
    pub input_dir: PathBuf,
    /// Derive training labels from commerce and pageview exports instead of
    /// the `outcome` column of the profiles
    pub label_from_events: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            min_date: None,
            max_date: None,
            window_length: 7,
            aggregation_functions: vec![AggregationFunction::Count],
            input_dir: PathBuf::from("data"),
            label_from_events: false,
        }
    }
}

impl DataConfig {
    /// Resolves the inclusive date range relative to `today`
    pub fn date_range(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
        let min_date = self.min_date.ok_or_else(|| {
            PipelineError::Configuration("data.min_date is required to run the pipeline".to_string())
        })?;
        let max_date = self.max_date.unwrap_or(today - Duration::days(1));
        if min_date > max_date {
            return Err(PipelineError::Configuration(format!(
                "Max date {} is sooner than the min date {}",
                max_date, min_date
            )));
        }
        Ok((min_date, max_date))
    }
}

impl ConfigSection for DataConfig {
    fn section_name() -> &'static str {
        "data"
    }

    fn validate(&self) -> Result<()> {
        if self.window_length == 0 {
            return Err(PipelineError::Configuration(
                "Window length must be at least one day".to_string(),
            ));
        }
        if self.aggregation_functions.is_empty() {
            return Err(PipelineError::Configuration(
                "At least one aggregation function is required".to_string(),
            ));
        }
        if let (Some(min_date), Some(max_date)) = (self.min_date, self.max_date) {
            if min_date > max_date {
                return Err(PipelineError::Configuration(format!(
                    "Max date {} is sooner than the min date {}",
                    max_date, min_date
                )));
            }
        }
        Ok(())
    }
}
