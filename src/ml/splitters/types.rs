use serde::{Deserialize, Serialize};

/// Disjoint row positions of one train/test partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SplitKind {
    Random,
    #[default]
    TimeBased,
}

/// Configuration for data splitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub kind: SplitKind,
    pub ratio: f64, // share of rows (random) or of calendar days in range (time based) used for training
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            kind: SplitKind::TimeBased,
            ratio: 0.6,
            seed: 42,
        }
    }
}
