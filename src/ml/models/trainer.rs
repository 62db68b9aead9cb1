use super::classifier::Classifier;
use super::report::{classification_metrics, OutcomeReport};
use crate::data::frame::row_matrix;
use crate::error::Result;
use crate::types::Outcome;
use log::info;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// A fitted classifier with the positional column order it was trained on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel<C> {
    pub classifier: C,
    pub feature_columns: Vec<String>,
    pub labels: Vec<Outcome>,
}

impl<C: Classifier> TrainedModel<C> {
    /// `features` must already be aligned to `feature_columns`
    pub fn predict_proba(&self, features: &DataFrame) -> Result<Vec<Vec<f64>>> {
        self.classifier
            .predict_proba(&row_matrix(features, &self.feature_columns)?)
    }

    pub fn predict(&self, features: &DataFrame) -> Result<Vec<Outcome>> {
        Ok(self
            .classifier
            .predict(&row_matrix(features, &self.feature_columns)?)?
            .into_iter()
            .filter_map(|class| self.labels.get(class).copied())
            .collect())
    }
}

/// Column importances, most important first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableImportances(pub Vec<(String, f64)>);

impl VariableImportances {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.0.iter().find(|(c, _)| c == column).map(|(_, v)| *v)
    }
}

/// A named feature/label set to evaluate a model on
pub struct EvaluationSet<'a> {
    pub name: &'a str,
    pub features: &'a DataFrame,
    pub labels: &'a [usize],
}

pub struct TrainingOutput<C> {
    pub model: TrainedModel<C>,
    pub report: OutcomeReport,
    pub variable_importances: VariableImportances,
}

pub struct ModelTrainer;

impl ModelTrainer {
    /// Fits a fresh classifier on `x_train`, then reports on the train set and
    /// every holdout set
    pub fn train<C: Classifier>(
        x_train: &DataFrame,
        y_train: &[usize],
        params: &C::Params,
        holdout: &[EvaluationSet<'_>],
    ) -> Result<TrainingOutput<C>> {
        let feature_columns: Vec<String> = x_train
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        info!(
            "  * Fitting classifier on {} rows x {} features",
            x_train.height(),
            feature_columns.len()
        );
        let mut classifier = C::from_params(params);
        classifier.fit(
            &row_matrix(x_train, &feature_columns)?,
            y_train,
            Outcome::ALL.len(),
        )?;

        let model = TrainedModel {
            classifier,
            feature_columns,
            labels: Outcome::ALL.to_vec(),
        };

        let mut sets = vec![EvaluationSet {
            name: "train",
            features: x_train,
            labels: y_train,
        }];
        sets.extend(holdout.iter().map(|s| EvaluationSet {
            name: s.name,
            features: s.features,
            labels: s.labels,
        }));
        let report = Self::predict_report(&model, &sets)?;

        let variable_importances = match model.classifier.feature_importances() {
            Some(importances) => {
                let mut pairs: Vec<(String, f64)> = model
                    .feature_columns
                    .iter()
                    .cloned()
                    .zip(importances)
                    .collect();
                pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
                VariableImportances(pairs)
            }
            None => VariableImportances::default(),
        };

        Ok(TrainingOutput {
            model,
            report,
            variable_importances,
        })
    }

    pub fn predict_report<C: Classifier>(
        model: &TrainedModel<C>,
        sets: &[EvaluationSet<'_>],
    ) -> Result<OutcomeReport> {
        let mut metrics = Vec::with_capacity(sets.len());
        for set in sets {
            let predicted = if set.features.height() == 0 {
                Vec::new()
            } else {
                model
                    .classifier
                    .predict(&row_matrix(set.features, &model.feature_columns)?)?
            };
            metrics.push((
                set.name.to_string(),
                classification_metrics(set.labels, &predicted, model.labels.len()),
            ));
        }
        OutcomeReport::from_sets(&metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::ml::models::forest::{ForestParams, RandomForestClassifier};
    use polars::df;

    /// Always predicts the majority training class and has no importances
    struct Majority(Vec<f64>);

    impl Classifier for Majority {
        type Params = ();

        fn from_params(_params: &()) -> Self {
            Majority(Vec::new())
        }

        fn fit(&mut self, _features: &[Vec<f64>], labels: &[usize], n_classes: usize) -> Result<()> {
            let mut counts = vec![0.0; n_classes];
            for &l in labels {
                counts[l] += 1.0;
            }
            let total: f64 = counts.iter().sum();
            self.0 = counts.iter().map(|c| c / total).collect();
            Ok(())
        }

        fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
            if self.0.is_empty() {
                return Err(PipelineError::Model("not fitted".to_string()));
            }
            Ok(vec![self.0.clone(); features.len()])
        }
    }

    fn train_frame() -> (DataFrame, Vec<usize>) {
        let x = df! {
            "a" => &[0.0, 0.1, 0.2, 5.0, 5.1, 5.2],
            "b" => &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
        }
        .unwrap();
        (x, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn test_train_reports_train_and_holdout_sets() {
        let (x, y) = train_frame();
        let test_x = df! { "a" => &[0.05, 5.05], "b" => &[1.0, 1.0] }.unwrap();
        let test_y = vec![0, 1];

        let params = ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        };
        let output = ModelTrainer::train::<RandomForestClassifier>(
            &x,
            &y,
            &params,
            &[EvaluationSet {
                name: "test",
                features: &test_x,
                labels: &test_y,
            }],
        )
        .unwrap();

        assert_eq!(output.model.feature_columns, vec!["a", "b"]);
        assert_eq!(
            output.report.get(Outcome::Conversion, "test", "recall").unwrap(),
            Some(1.0)
        );
        assert_eq!(
            output.report.get(Outcome::NoConversion, "train", "support").unwrap(),
            Some(3.0)
        );
        assert_eq!(output.variable_importances.0[0].0, "a");
        assert_eq!(output.variable_importances.get("b"), Some(0.0));
    }

    #[test]
    fn test_importances_are_optional() {
        let (x, y) = train_frame();
        let output = ModelTrainer::train::<Majority>(&x, &y, &(), &[]).unwrap();
        assert!(output.variable_importances.is_empty());
        assert_eq!(output.report.frame.width(), 1 + Outcome::ALL.len());
    }
}
