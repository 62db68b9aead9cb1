use super::PipelineContext;
use crate::artifacts::{ArtifactStore, ModelArtifactBundle, PipelineArtifact};
use crate::config::AppConfig;
use crate::data::frame::{filter_rows, str_values};
use crate::data::sources::WarehouseSink;
use crate::error::{PipelineError, Result};
use crate::ml::features::registry::USER_IDS_COLUMN;
use crate::ml::features::{align, design_matrix, encode_labels, normalize, FeatureFrameBuilder};
use crate::ml::models::{Classifier, EvaluationSet, ModelTrainer, OutcomeReport, RandomForestClassifier};
use crate::types::{parse_user_ids, DataRetrievalMode, Outcome, PredictionJobLog, PredictionRecord};
use chrono::{NaiveDate, Utc};
use log::{info, warn};
use serde::de::DeserializeOwned;

pub struct PredictionRun {
    pub model_date: NaiveDate,
    pub records: Vec<PredictionRecord>,
    /// Scored rows against their historical outcome; dry runs only
    pub report: Option<OutcomeReport>,
    pub context: PipelineContext,
}

pub struct PredictionPipeline {
    config: AppConfig,
    builder: FeatureFrameBuilder,
    store: ArtifactStore,
    sink: Box<dyn WarehouseSink>,
}

impl PredictionPipeline {
    pub fn new(config: AppConfig, builder: FeatureFrameBuilder, sink: Box<dyn WarehouseSink>) -> Self {
        let store = ArtifactStore::new(&config.artifacts.model_dir);
        Self {
            config,
            builder,
            store,
            sink,
        }
    }

    pub fn run(&self, min_date: NaiveDate, max_date: NaiveDate) -> Result<PredictionRun> {
        self.run_with::<RandomForestClassifier>(min_date, max_date)
    }

    pub fn run_with<C: Classifier + DeserializeOwned>(
        &self,
        min_date: NaiveDate,
        max_date: NaiveDate,
    ) -> Result<PredictionRun> {
        let settings = &self.config.prediction;
        let scoring_date = settings.scoring_date.unwrap_or_else(|| Utc::now().date_naive());
        let bundle: ModelArtifactBundle<C> = self.store.load(scoring_date)?;
        let mut context =
            PipelineContext::new(min_date, max_date, self.config.artifacts.prediction_retention);

        // Dry runs are evaluated, so they need the historical labels
        let mode = if settings.dry_run {
            DataRetrievalMode::ModelTrainData
        } else {
            DataRetrievalMode::PredictData
        };
        info!("Building scoring feature frame {} - {}", min_date, max_date);
        let frame = self.builder.build(
            min_date,
            max_date,
            self.config.data.window_length,
            &self.config.data.aggregation_functions,
            mode,
        )?;

        let mut columns = frame.columns.clone();
        let groups = columns.normalization_groups();
        let data = normalize(&frame.data, &mut columns, &groups, self.config.features.normalization)?;
        let features = design_matrix(&data, &columns, &bundle.category_lists, &bundle.scaler)?;
        let features = align(&features, &bundle.model.feature_columns)?;

        let records = if features.height() == 0 {
            warn!("No active profiles between {} and {}; nothing to score", min_date, max_date);
            Vec::new()
        } else {
            let user_ids = str_values(&data, USER_IDS_COLUMN)?;
            self.records(&bundle, &frame.dates()?, &frame.browser_ids()?, &user_ids, &features)?
        };
        info!("  * Scored {} rows with model dated {}", records.len(), bundle.model_date);

        let report = if settings.dry_run {
            let outcomes = frame.outcomes()?;
            let labelled: Vec<bool> = outcomes.iter().map(|o| o.is_some()).collect();
            let labelled_features = filter_rows(&features, &labelled)?;
            let labels = encode_labels(&outcomes.into_iter().filter(|o| o.is_some()).collect::<Vec<_>>())?;
            let report = ModelTrainer::predict_report(
                &bundle.model,
                &[EvaluationSet {
                    name: "test",
                    features: &labelled_features,
                    labels: &labels,
                }],
            )?;
            info!("Dry run, nothing uploaded. Outcome report:\n{}", report);
            Some(report)
        } else {
            self.upload(&records, max_date)?;
            None
        };

        context.release(&self.store, PipelineArtifact::UserProfiles, data)?;
        context.release(&self.store, PipelineArtifact::PredictionData, features)?;

        Ok(PredictionRun {
            model_date: bundle.model_date,
            records,
            report,
            context,
        })
    }

    fn records<C: Classifier>(
        &self,
        bundle: &ModelArtifactBundle<C>,
        dates: &[NaiveDate],
        browser_ids: &[String],
        user_ids: &[Option<String>],
        features: &polars::prelude::DataFrame,
    ) -> Result<Vec<PredictionRecord>> {
        let probabilities = bundle.model.predict_proba(features)?;
        let predicted = bundle.model.predict(features)?;
        if probabilities.len() != dates.len() || predicted.len() != dates.len() {
            return Err(PipelineError::Model(format!(
                "Model returned {} probability rows and {} labels for {} profiles",
                probabilities.len(),
                predicted.len(),
                dates.len()
            )));
        }

        let probability = |row: &[f64], outcome: Outcome| {
            bundle
                .model
                .labels
                .iter()
                .position(|l| *l == outcome)
                .and_then(|i| row.get(i).copied())
                .unwrap_or(0.0)
        };

        let created_at = Utc::now();
        Ok((0..dates.len())
            .map(|row| {
                let ids = parse_user_ids(user_ids[row].as_deref().unwrap_or_default());
                PredictionRecord {
                    date: dates[row],
                    browser_id: browser_ids[row].clone(),
                    user_ids: (!ids.is_empty()).then_some(ids),
                    conversion_probability: probability(&probabilities[row], Outcome::Conversion),
                    no_conversion_probability: probability(&probabilities[row], Outcome::NoConversion),
                    shared_account_login_probability: probability(
                        &probabilities[row],
                        Outcome::SharedAccountLogin,
                    ),
                    predicted_outcome: predicted[row],
                    model_version: self.config.prediction.model_version.clone(),
                    created_at,
                }
            })
            .collect())
    }

    fn upload(&self, records: &[PredictionRecord], date: NaiveDate) -> Result<()> {
        let settings = &self.config.prediction;
        let rows = records
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.sink.append_rows(&settings.predictions_table, &rows)?;

        let job_log = PredictionJobLog {
            date,
            model_version: settings.model_version.clone(),
            created_at: Utc::now(),
            rows_predicted: records.len(),
        };
        self.sink
            .append_rows(&settings.job_log_table, &[serde_json::to_value(&job_log)?])?;
        info!(
            "  * Uploaded {} predictions to {} and logged the job to {}",
            records.len(),
            settings.predictions_table,
            settings.job_log_table
        );
        Ok(())
    }
}
