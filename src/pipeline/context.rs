use crate::artifacts::{ArtifactStore, PipelineArtifact, RetentionPolicy};
use crate::error::Result;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Intermediate frames of one run, threaded through its stages.
///
/// A frame handed to [`PipelineContext::release`] is either kept here (when
/// the retention collection names it) or dumped/dropped according to the mode.
#[derive(Debug)]
pub struct PipelineContext {
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
    policy: RetentionPolicy,
    retained: BTreeMap<PipelineArtifact, DataFrame>,
    dumped: Vec<PathBuf>,
}

impl PipelineContext {
    pub fn new(min_date: NaiveDate, max_date: NaiveDate, policy: RetentionPolicy) -> Self {
        Self {
            min_date,
            max_date,
            policy,
            retained: BTreeMap::new(),
            dumped: Vec::new(),
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    pub fn release(&mut self, store: &ArtifactStore, artifact: PipelineArtifact, frame: DataFrame) -> Result<()> {
        let (kept, dumped) = self
            .policy
            .release(store, artifact, frame, self.min_date, self.max_date)?;
        if let Some(frame) = kept {
            self.retained.insert(artifact, frame);
        }
        self.dumped.extend(dumped);
        Ok(())
    }

    pub fn get(&self, artifact: PipelineArtifact) -> Option<&DataFrame> {
        self.retained.get(&artifact)
    }

    pub fn retained(&self) -> Vec<PipelineArtifact> {
        self.retained.keys().copied().collect()
    }

    /// Files written for DUMP-ed artifacts, in release order
    pub fn dumped(&self) -> &[PathBuf] {
        &self.dumped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{RetentionCollection, RetentionMode};
    use crate::types::parse_date;
    use polars::df;

    #[test]
    fn test_context_tracks_kept_and_dumped_frames() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut context = PipelineContext::new(
            parse_date("2024-01-01").unwrap(),
            parse_date("2024-01-07").unwrap(),
            RetentionPolicy {
                mode: RetentionMode::Dump,
                collection: RetentionCollection::Prediction,
            },
        );

        let frame = df! { "browser_id" => &["a"] }.unwrap();
        context
            .release(&store, PipelineArtifact::PredictionData, frame)
            .unwrap();

        assert!(context.get(PipelineArtifact::PredictionData).is_none());
        assert!(context.retained().is_empty());
        assert_eq!(context.dumped().len(), 1);
        assert!(context.dumped()[0].is_file());
    }
}
