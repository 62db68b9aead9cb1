use crate::error::Result;
use crate::types::Outcome;
use polars::prelude::*;

pub const REPORT_METRICS: [&str; 4] = ["precision", "recall", "f-score", "support"];

/// Per-label classification metrics
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LabelMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f_score: f64,
    pub support: f64,
}

impl LabelMetrics {
    fn values(&self) -> [f64; 4] {
        [self.precision, self.recall, self.f_score, self.support]
    }
}

/// Precision, recall, F1 and support per class; undefined ratios are 0.0
pub fn classification_metrics(actual: &[usize], predicted: &[usize], n_classes: usize) -> Vec<LabelMetrics> {
    (0..n_classes)
        .map(|class| {
            let true_positive = actual
                .iter()
                .zip(predicted)
                .filter(|(a, p)| **a == class && **p == class)
                .count() as f64;
            let predicted_positive = predicted.iter().filter(|&&p| p == class).count() as f64;
            let support = actual.iter().filter(|&&a| a == class).count() as f64;

            let precision = ratio(true_positive, predicted_positive);
            let recall = ratio(true_positive, support);
            let f_score = ratio(2.0 * precision * recall, precision + recall);

            LabelMetrics {
                precision,
                recall,
                f_score,
                support,
            }
        })
        .collect()
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Metrics table: one row per metric, one `{label}_{set}` column per label and set
#[derive(Debug, Clone)]
pub struct OutcomeReport {
    pub frame: DataFrame,
}

impl OutcomeReport {
    /// Sets are laid out in the order given; labels follow label-encoder order
    pub fn from_sets(sets: &[(String, Vec<LabelMetrics>)]) -> Result<Self> {
        let mut columns = vec![Column::new("metric".into(), REPORT_METRICS.to_vec())];
        for (set_name, metrics) in sets {
            for (outcome, label_metrics) in Outcome::ALL.iter().zip(metrics) {
                columns.push(Column::new(
                    format!("{}_{}", outcome.as_str(), set_name).into(),
                    label_metrics.values().to_vec(),
                ));
            }
        }
        Ok(Self {
            frame: DataFrame::new(columns)?,
        })
    }

    pub fn get(&self, outcome: Outcome, set_name: &str, metric: &str) -> Result<Option<f64>> {
        let Some(row) = REPORT_METRICS.iter().position(|m| *m == metric) else {
            return Ok(None);
        };
        let column = format!("{}_{}", outcome.as_str(), set_name);
        let Ok(values) = self.frame.column(&column) else {
            return Ok(None);
        };
        Ok(values.f64()?.get(row))
    }
}

impl std::fmt::Display for OutcomeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.frame)
    }
}
