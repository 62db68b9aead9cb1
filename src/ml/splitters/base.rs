use super::types::{SplitConfig, SplitIndices};
use crate::error::Result;
use crate::ml::features::FeatureFrame;

pub trait DataSplitter {
    /// Partition the frame's rows into train and test positions
    fn split(&self, frame: &FeatureFrame) -> Result<SplitIndices>;

    /// Get splitter configuration
    fn config(&self) -> &SplitConfig;
}
