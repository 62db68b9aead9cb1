use super::{outcome_frame, PipelineContext};
use crate::artifacts::{ArtifactStore, ModelArtifactBundle, PipelineArtifact};
use crate::config::AppConfig;
use crate::error::{PipelineError, Result};
use crate::ml::features::{
    design_matrix, encode_labels, normalize, CategoryEncoder, FeatureFrame, FeatureFrameBuilder,
    MinMaxScaler,
};
use crate::ml::models::{Classifier, EvaluationSet, ModelTrainer, OutcomeReport, RandomForestClassifier};
use crate::ml::splitters::splitter_for;
use crate::types::DataRetrievalMode;
use chrono::{Duration, NaiveDate};
use log::info;
use serde::Serialize;

/// Result of one training run
pub struct TrainingRun<C> {
    /// Day after the latest profile date; tags every saved artifact
    pub model_date: NaiveDate,
    pub report: OutcomeReport,
    /// Present when the retention collection keeps the model
    pub bundle: Option<ModelArtifactBundle<C>>,
    pub context: PipelineContext,
}

pub struct TrainingPipeline {
    config: AppConfig,
    builder: FeatureFrameBuilder,
    store: ArtifactStore,
}

impl TrainingPipeline {
    pub fn new(config: AppConfig, builder: FeatureFrameBuilder) -> Self {
        let store = ArtifactStore::new(&config.artifacts.model_dir);
        Self {
            config,
            builder,
            store,
        }
    }

    /// Trains the built-in random forest with the configured parameters
    pub fn run(&self, min_date: NaiveDate, max_date: NaiveDate) -> Result<TrainingRun<RandomForestClassifier>> {
        self.run_with::<RandomForestClassifier>(min_date, max_date, &self.config.training.forest)
    }

    pub fn run_with<C: Classifier + Serialize>(
        &self,
        min_date: NaiveDate,
        max_date: NaiveDate,
        params: &C::Params,
    ) -> Result<TrainingRun<C>> {
        let data_config = &self.config.data;
        let mut context = PipelineContext::new(min_date, max_date, self.config.artifacts.training_retention);

        info!("Building training feature frame {} - {}", min_date, max_date);
        let frame = self.builder.build(
            min_date,
            max_date,
            data_config.window_length,
            &data_config.aggregation_functions,
            DataRetrievalMode::ModelTrainData,
        )?;
        let profile_max_date = frame.max_date()?.ok_or_else(|| {
            PipelineError::Validation(format!(
                "No active profiles between {} and {} to train on",
                min_date, max_date
            ))
        })?;
        let model_date = profile_max_date + Duration::days(1);
        let overwrite = self.config.training.overwrite_files;
        self.store.ensure_writable(model_date, overwrite)?;

        let encoder = CategoryEncoder::new(&frame.columns.categorical_columns);
        let (recoded, collapsed) = encoder.recode_rare(&frame.data)?;
        let category_lists = encoder.fit(&recoded, collapsed)?;

        let mut columns = frame.columns.clone();
        let groups = columns.normalization_groups();
        let normalized = normalize(&recoded, &mut columns, &groups, self.config.features.normalization)?;
        let frame = FeatureFrame {
            data: normalized,
            columns,
        };

        let split = splitter_for(&self.config.training.split, min_date, max_date)?.split(&frame)?;
        if split.train.is_empty() {
            return Err(PipelineError::Validation("Split left no training rows".to_string()));
        }
        info!(
            "  * Split {} rows into {} train / {} test",
            frame.height(),
            split.train.len(),
            split.test.len()
        );
        let train = frame.subset(&split.train)?;
        let test = frame.subset(&split.test)?;

        let scaler = MinMaxScaler::fit(&train.data, &frame.columns.numeric_columns_with_window_variants)?;
        let x_train = design_matrix(&train.data, &frame.columns, &category_lists, &scaler)?;
        let y_train = encode_labels(&train.outcomes()?)?;
        let x_test = design_matrix(&test.data, &frame.columns, &category_lists, &scaler)?;
        let y_test = encode_labels(&test.outcomes()?)?;

        let holdout = if x_test.height() > 0 {
            vec![EvaluationSet {
                name: "test",
                features: &x_test,
                labels: &y_test,
            }]
        } else {
            Vec::new()
        };
        let output = ModelTrainer::train::<C>(&x_train, &y_train, params, &holdout)?;
        info!("Outcome report:\n{}", output.report);

        let bundle = ModelArtifactBundle {
            model_date,
            category_lists,
            scaler,
            model: output.model,
            variable_importances: output.variable_importances,
        };
        self.store.save(&bundle, overwrite)?;

        context.release(&self.store, PipelineArtifact::UserProfiles, frame.data)?;
        context.release(&self.store, PipelineArtifact::TrainDataFeatures, x_train)?;
        context.release(&self.store, PipelineArtifact::TrainDataOutcome, outcome_frame(&y_train)?)?;
        context.release(&self.store, PipelineArtifact::TestDataFeatures, x_test)?;
        context.release(&self.store, PipelineArtifact::TestDataOutcome, outcome_frame(&y_test)?)?;

        let bundle = context.policy().retains(PipelineArtifact::Model).then_some(bundle);
        info!("Training finished, model date {}", model_date);

        Ok(TrainingRun {
            model_date,
            report: output.report,
            bundle,
            context,
        })
    }
}
