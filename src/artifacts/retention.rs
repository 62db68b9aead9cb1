use super::store::ArtifactStore;
use crate::error::Result;
use crate::types::format_date;
use chrono::NaiveDate;
use log::{debug, info};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What happens to an intermediate artifact the collection does not retain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RetentionMode {
    /// Persisted to disk, then released
    Dump,
    #[default]
    Drop,
}

/// Intermediate artifacts produced along a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineArtifact {
    UserProfiles,
    TrainDataFeatures,
    TrainDataOutcome,
    TestDataFeatures,
    TestDataOutcome,
    Model,
    PredictionData,
}

impl PipelineArtifact {
    pub const ALL: [PipelineArtifact; 7] = [
        PipelineArtifact::UserProfiles,
        PipelineArtifact::TrainDataFeatures,
        PipelineArtifact::TrainDataOutcome,
        PipelineArtifact::TestDataFeatures,
        PipelineArtifact::TestDataOutcome,
        PipelineArtifact::Model,
        PipelineArtifact::PredictionData,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::UserProfiles => "user_profiles",
            Self::TrainDataFeatures => "train_data_features",
            Self::TrainDataOutcome => "train_data_outcome",
            Self::TestDataFeatures => "test_data_features",
            Self::TestDataOutcome => "test_data_outcome",
            Self::Model => "model",
            Self::PredictionData => "prediction_data",
        }
    }
}

/// Sets of artifacts a run keeps in memory once they have been used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionCollection {
    ModelTuning,
    #[default]
    ModelRetraining,
    Prediction,
}

impl RetentionCollection {
    pub fn artifacts(&self) -> &'static [PipelineArtifact] {
        match self {
            Self::ModelTuning => &PipelineArtifact::ALL,
            Self::ModelRetraining => &[PipelineArtifact::Model],
            Self::Prediction => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    pub mode: RetentionMode,
    pub collection: RetentionCollection,
}

impl RetentionPolicy {
    pub fn retains(&self, artifact: PipelineArtifact) -> bool {
        self.collection.artifacts().contains(&artifact)
    }

    /// Applies the policy to a used frame. Returns the frame if it is retained;
    /// otherwise dumps it (DUMP) and returns `None`.
    pub fn release(
        &self,
        store: &ArtifactStore,
        artifact: PipelineArtifact,
        frame: DataFrame,
        min_date: NaiveDate,
        max_date: NaiveDate,
    ) -> Result<(Option<DataFrame>, Option<PathBuf>)> {
        if self.retains(artifact) {
            return Ok((Some(frame), None));
        }

        match self.mode {
            RetentionMode::Dump => {
                let name = format!(
                    "artifact_{}_{}_{}",
                    artifact.name(),
                    format_date(min_date),
                    format_date(max_date)
                );
                let path = store.dump_frame(&name, &frame)?;
                info!("  * Dumped {} to {}", artifact.name(), path.display());
                Ok((None, Some(path)))
            }
            RetentionMode::Drop => {
                debug!("Dropped {} from pipeline context", artifact.name());
                Ok((None, None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_date;
    use polars::df;

    fn frame() -> DataFrame {
        df! { "browser_id" => &["a", "b"] }.unwrap()
    }

    #[test]
    fn test_collections() {
        let tuning = RetentionPolicy {
            mode: RetentionMode::Drop,
            collection: RetentionCollection::ModelTuning,
        };
        assert!(PipelineArtifact::ALL.iter().all(|a| tuning.retains(*a)));

        let retraining = RetentionPolicy::default();
        assert!(retraining.retains(PipelineArtifact::Model));
        assert!(!retraining.retains(PipelineArtifact::UserProfiles));
    }

    #[test]
    fn test_dump_writes_named_csv() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let policy = RetentionPolicy {
            mode: RetentionMode::Dump,
            collection: RetentionCollection::Prediction,
        };

        let (kept, path) = policy
            .release(
                &store,
                PipelineArtifact::UserProfiles,
                frame(),
                parse_date("2024-01-01").unwrap(),
                parse_date("2024-01-10").unwrap(),
            )
            .unwrap();
        assert!(kept.is_none());
        let path = path.unwrap();
        assert!(path.ends_with("artifact_user_profiles_2024-01-01_2024-01-10.csv"));
        assert!(path.is_file());
    }

    #[test]
    fn test_drop_and_retain() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let day = parse_date("2024-01-01").unwrap();

        let (kept, path) = RetentionPolicy::default()
            .release(&store, PipelineArtifact::TestDataFeatures, frame(), day, day)
            .unwrap();
        assert!(kept.is_none() && path.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let tuning = RetentionPolicy {
            mode: RetentionMode::Drop,
            collection: RetentionCollection::ModelTuning,
        };
        let (kept, _) = tuning
            .release(&store, PipelineArtifact::TestDataFeatures, frame(), day, day)
            .unwrap();
        assert_eq!(kept.map(|f| f.height()), Some(2));
    }
}
