pub mod base;
pub mod random;
pub mod time_based;
pub mod types;

pub use base::DataSplitter;
pub use random::RandomSplitter;
pub use time_based::TimeBasedSplitter;
pub use types::{SplitConfig, SplitIndices, SplitKind};

use crate::error::{PipelineError, Result};
use chrono::NaiveDate;

/// Splitter for the configured kind; a time based split divides the
/// calendar days between `min_date` and `max_date`
pub fn splitter_for(
    config: &SplitConfig,
    min_date: NaiveDate,
    max_date: NaiveDate,
) -> Result<Box<dyn DataSplitter>> {
    validate_ratio(config.ratio)?;
    Ok(match config.kind {
        SplitKind::Random => Box::new(RandomSplitter::new(config.ratio, config.seed)),
        SplitKind::TimeBased => Box::new(TimeBasedSplitter::new(config.ratio, min_date, max_date)),
    })
}

pub(crate) fn validate_ratio(ratio: f64) -> Result<()> {
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(PipelineError::Configuration(format!(
            "Split ratio must be in (0, 1], got {}",
            ratio
        )));
    }
    Ok(())
}
