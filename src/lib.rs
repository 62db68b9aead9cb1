//! Conversion prediction for anonymous website visitors.
//!
//! Browsers are profiled per day over a rolling window, labelled with what
//! they did in the following week, and scored by a classifier whose
//! artifacts are versioned by model date.

pub mod artifacts;
pub mod config;
pub mod data;
pub mod error;
pub mod ml;
pub mod pipeline;
pub mod types;

pub use error::{PipelineError, Result};
pub use pipeline::{PredictionPipeline, PredictionRun, TrainingPipeline, TrainingRun};
pub use types::{Outcome, PredictionRecord};
