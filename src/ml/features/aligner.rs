use crate::data::frame::{column_names, has_column, select_columns};
use crate::error::Result;
use log::debug;
use polars::prelude::*;

/// Reconciles a scoring frame with the columns the model was trained on.
///
/// Extra columns are dropped, missing ones zero-filled and the result is
/// ordered exactly like `trained_columns`. Classifiers read features by
/// position, so every prediction goes through here first.
pub fn align(df: &DataFrame, trained_columns: &[String]) -> Result<DataFrame> {
    let mut out = df.clone();
    let height = df.height();

    let extra: Vec<String> = column_names(df)
        .into_iter()
        .filter(|c| !trained_columns.contains(c))
        .collect();
    let mut missing = 0;
    for column in trained_columns {
        if !has_column(&out, column) {
            out.with_column(Series::new(column.as_str().into(), vec![0.0f64; height]))?;
            missing += 1;
        }
    }
    debug!(
        "Aligning scoring frame: dropping {} extra columns, zero-filling {} missing",
        extra.len(),
        missing
    );

    select_columns(&out, trained_columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::f64_values;
    use polars::df;

    fn trained() -> Vec<String> {
        vec!["c".to_string(), "a".to_string(), "b".to_string()]
    }

    #[test]
    fn test_superset_is_trimmed_and_reordered() {
        let df = df! {
            "a" => &[1.0],
            "b" => &[2.0],
            "c" => &[3.0],
            "extra" => &[9.0],
        }
        .unwrap();
        let aligned = align(&df, &trained()).unwrap();
        assert_eq!(column_names(&aligned), trained());
        assert_eq!(f64_values(&aligned, "c").unwrap(), vec![3.0]);
    }

    #[test]
    fn test_subset_is_zero_filled() {
        let df = df! { "a" => &[1.0, 2.0] }.unwrap();
        let aligned = align(&df, &trained()).unwrap();
        assert_eq!(column_names(&aligned), trained());
        assert_eq!(f64_values(&aligned, "b").unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_partially_overlapping_frame() {
        let df = df! { "b" => &[4.0], "z" => &[1.0] }.unwrap();
        let aligned = align(&df, &trained()).unwrap();
        assert_eq!(column_names(&aligned), trained());
        assert_eq!(f64_values(&aligned, "b").unwrap(), vec![4.0]);
        assert_eq!(f64_values(&aligned, "a").unwrap(), vec![0.0]);
    }
}
