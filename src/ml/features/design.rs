use super::encoder::{CategoryEncoder, CategoryListDict};
use super::registry::FeatureColumns;
use super::scaler::MinMaxScaler;
use crate::data::frame::select_columns;
use crate::error::{PipelineError, Result};
use crate::types::Outcome;
use polars::prelude::*;

/// Model input columns in positional order: scaled window numerics, unscaled
/// numerics, boolean flags, then dummies per categorical column
pub fn feature_columns(columns: &FeatureColumns, category_lists: &CategoryListDict) -> Result<Vec<String>> {
    let mut names = columns.numeric_columns_with_window_variants.clone();
    names.extend(columns.unscaled_numeric_columns());
    names.extend(columns.bool_columns.iter().cloned());
    for categorical in &columns.categorical_columns {
        names.extend(category_lists.dummy_columns(categorical)?);
    }
    Ok(names)
}

/// Scales, encodes and dummifies a feature frame into a numeric design matrix
pub fn design_matrix(
    df: &DataFrame,
    columns: &FeatureColumns,
    category_lists: &CategoryListDict,
    scaler: &MinMaxScaler,
) -> Result<DataFrame> {
    let encoder = CategoryEncoder::new(&columns.categorical_columns);
    let scaled = scaler.transform(df)?;
    let encoded = encoder.encode_unknown(&scaled, category_lists)?;
    let (dummified, _) = encoder.replace_with_dummies(&encoded, category_lists)?;
    select_columns(&dummified, &feature_columns(columns, category_lists)?)
}

/// Label-encoder indices of the given outcomes; every row must be labelled
pub fn encode_labels(outcomes: &[Option<Outcome>]) -> Result<Vec<usize>> {
    outcomes
        .iter()
        .enumerate()
        .map(|(row, outcome)| {
            outcome
                .map(|o| o.index())
                .ok_or_else(|| PipelineError::Validation(format!("Row {} has no outcome label", row)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::{column_names, f64_values};
    use crate::ml::features::encoder::UNKNOWN_CATEGORY;

    #[test]
    fn test_feature_columns_end_with_dummies() {
        let columns = FeatureColumns::default();
        let mut lists = CategoryListDict::default();
        for categorical in &columns.categorical_columns {
            lists.insert(categorical, vec!["A".to_string(), UNKNOWN_CATEGORY.to_string()]);
        }

        let names = feature_columns(&columns, &lists).unwrap();
        assert_eq!(names.first(), columns.numeric_columns_with_window_variants.first());
        assert_eq!(names.last().map(|s| s.as_str()), Some("day_of_week_A"));
        assert!(names.contains(&"is_mobile".to_string()));
        assert!(!names.iter().any(|n| n.ends_with("_Unknown")));
    }

    fn frame(devices: &[&str]) -> DataFrame {
        let columns = FeatureColumns::default();
        let values: Vec<f64> = (0..devices.len()).map(|i| (2 * i + 1) as f64).collect();
        let mut data = DataFrame::new(vec![Column::new("device".into(), devices)]).unwrap();
        for name in columns
            .numeric_columns_with_window_variants
            .iter()
            .chain(columns.unscaled_numeric_columns().iter())
            .chain(columns.bool_columns.iter())
        {
            data.with_column(Series::new(name.as_str().into(), values.clone())).unwrap();
        }
        for name in ["browser", "os", "day_of_week"] {
            data.with_column(Series::new(name.into(), vec!["x"; devices.len()])).unwrap();
        }
        data
    }

    #[test]
    fn test_design_matrix_uses_frozen_lists() {
        let columns = FeatureColumns::default();
        let data = frame(&["Mobile", "Watch"]);

        let encoder = CategoryEncoder::new(&columns.categorical_columns);
        let lists = encoder.fit(&data.slice(0, 1), Default::default()).unwrap();
        let scaler = MinMaxScaler::fit(&data, &columns.numeric_columns_with_window_variants).unwrap();

        let matrix = design_matrix(&data, &columns, &lists, &scaler).unwrap();
        assert_eq!(column_names(&matrix), feature_columns(&columns, &lists).unwrap());
        assert_eq!(f64_values(&matrix, "device_Mobile").unwrap(), vec![1.0, 0.0]);
        assert_eq!(f64_values(&matrix, "pageview_count").unwrap(), vec![0.0, 1.0]);
        assert_eq!(f64_values(&matrix, "clv").unwrap(), vec![1.0, 3.0]);
    }

    #[test]
    fn test_value_rare_at_training_scores_as_other() {
        let columns = FeatureColumns::default();
        let mut devices = vec!["Desktop"; 25];
        devices.extend(vec!["Mobile"; 25]);
        devices.push("Console");
        let train = frame(&devices);

        let encoder = CategoryEncoder::new(&columns.categorical_columns);
        let (recoded, collapsed) = encoder.recode_rare(&train).unwrap();
        let lists = encoder.fit(&recoded, collapsed).unwrap();
        let scaler = MinMaxScaler::fit(&recoded, &columns.numeric_columns_with_window_variants).unwrap();

        let x_train = design_matrix(&recoded, &columns, &lists, &scaler).unwrap();
        assert_eq!(f64_values(&x_train, "device_Other").unwrap()[50], 1.0);

        let x_score = design_matrix(&frame(&["Console", "Smartwatch"]), &columns, &lists, &scaler).unwrap();
        assert_eq!(f64_values(&x_score, "device_Other").unwrap(), vec![1.0, 0.0]);
        assert_eq!(f64_values(&x_score, "device_Desktop").unwrap(), vec![0.0, 0.0]);
        assert_eq!(f64_values(&x_score, "device_Mobile").unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_unlabelled_rows_are_rejected() {
        assert_eq!(
            encode_labels(&[Some(Outcome::SharedAccountLogin), Some(Outcome::Conversion)]).unwrap(),
            vec![2, 0]
        );
        assert!(encode_labels(&[None]).is_err());
    }
}
