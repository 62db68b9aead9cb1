pub mod context;
pub mod predict;
pub mod train;

pub use context::PipelineContext;
pub use predict::{PredictionPipeline, PredictionRun};
pub use train::{TrainingPipeline, TrainingRun};

use crate::data::frame::frame_from_series;
use crate::error::Result;
use crate::ml::features::registry::OUTCOME_COLUMN;
use crate::types::Outcome;
use polars::prelude::*;

/// Single-column frame of outcome labels, for retention of outcome artifacts
pub(crate) fn outcome_frame(labels: &[usize]) -> Result<DataFrame> {
    let values: Vec<Option<&str>> = labels
        .iter()
        .map(|&l| Outcome::from_index(l).map(|o| o.as_str()))
        .collect();
    frame_from_series(vec![Series::new(OUTCOME_COLUMN.into(), values)])
}
