use crate::error::{PipelineError, Result};

/// Anything that can be fitted on a row-major feature matrix and produce
/// class probabilities. Class ids are label-encoder indices.
pub trait Classifier {
    type Params;

    fn from_params(params: &Self::Params) -> Self
    where
        Self: Sized;

    fn fit(&mut self, features: &[Vec<f64>], labels: &[usize], n_classes: usize) -> Result<()>;

    /// One probability per class for every row
    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>>;

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<usize>> {
        Ok(self.predict_proba(features)?.iter().map(|p| argmax(p)).collect())
    }

    /// Importance per feature column, when the algorithm has the concept
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }
}

pub fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_value), (i, &v)| {
            if v > best_value {
                (i, v)
            } else {
                (best, best_value)
            }
        })
        .0
}

pub(crate) fn check_shapes(features: &[Vec<f64>], labels: &[usize], n_classes: usize) -> Result<()> {
    if features.len() != labels.len() {
        return Err(PipelineError::Model(format!(
            "Feature rows ({}) and labels ({}) differ in length",
            features.len(),
            labels.len()
        )));
    }
    if features.is_empty() {
        return Err(PipelineError::Model("Cannot fit on an empty training set".to_string()));
    }
    if let Some(label) = labels.iter().find(|&&l| l >= n_classes) {
        return Err(PipelineError::Model(format!(
            "Label {} outside of {} classes",
            label, n_classes
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.2, 0.5, 0.3]), 1);
        assert_eq!(argmax(&[0.5, 0.5]), 0);
    }

    #[test]
    fn test_shape_checks() {
        assert!(check_shapes(&[vec![1.0]], &[0], 3).is_ok());
        assert!(check_shapes(&[vec![1.0]], &[0, 1], 3).is_err());
        assert!(check_shapes(&[vec![1.0]], &[3], 3).is_err());
        assert!(check_shapes(&[], &[], 3).is_err());
    }
}
