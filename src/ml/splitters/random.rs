use super::base::DataSplitter;
use super::types::{SplitConfig, SplitIndices, SplitKind};
use crate::error::Result;
use crate::ml::features::FeatureFrame;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Seeded shuffle; `ratio` is the share of rows used for training
pub struct RandomSplitter {
    config: SplitConfig,
}

impl RandomSplitter {
    pub fn new(ratio: f64, seed: u64) -> Self {
        Self {
            config: SplitConfig {
                kind: SplitKind::Random,
                ratio,
                seed,
            },
        }
    }
}

impl DataSplitter for RandomSplitter {
    fn split(&self, frame: &FeatureFrame) -> Result<SplitIndices> {
        super::validate_ratio(self.config.ratio)?;

        let total_rows = frame.height();
        // Epsilon absorbs float noise in 1 - ratio before rounding up
        let test_rows = ((1.0 - self.config.ratio) * total_rows as f64 - 1e-9).ceil().max(0.0) as usize;
        let train_rows = total_rows - test_rows.min(total_rows);

        let mut order: Vec<usize> = (0..total_rows).collect();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        order.shuffle(&mut rng);

        let mut train = order[..train_rows].to_vec();
        let mut test = order[train_rows..].to_vec();
        train.sort_unstable();
        test.sort_unstable();

        Ok(SplitIndices { train, test })
    }

    fn config(&self) -> &SplitConfig {
        &self.config
    }
}
