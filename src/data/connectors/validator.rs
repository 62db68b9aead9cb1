use super::types::SourceFile;
use crate::data::frame::has_column;
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::collections::HashMap;

pub struct DataValidator;

impl DataValidator {
    /// Validate that the frame carries every column the file kind needs
    pub fn validate_columns(df: &DataFrame, file: SourceFile) -> Result<()> {
        let missing: Vec<&str> = file
            .required_columns()
            .iter()
            .copied()
            .filter(|c| !has_column(df, c))
            .collect();

        if !missing.is_empty() {
            return Err(PipelineError::Source(format!(
                "{} is missing required columns: {:?}",
                file.file_name(),
                missing
            )));
        }
        Ok(())
    }

    /// Check for null values in required columns
    pub fn check_nulls(df: &DataFrame, file: SourceFile) -> Result<HashMap<String, usize>> {
        let mut null_counts = HashMap::new();
        for name in file.required_columns() {
            let count = df.column(name)?.null_count();
            if count > 0 {
                null_counts.insert(name.to_string(), count);
            }
        }
        Ok(null_counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn test_missing_columns_are_named() {
        let df = df! { "date" => &["2024-01-01"], "sum_paid" => &[1.0] }.unwrap();
        let err = DataValidator::validate_columns(&df, SourceFile::GlobalContext).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("article_pageviews_count"));
        assert!(message.contains("payment_count"));
        assert!(!message.contains("sum_paid\""));
    }

    #[test]
    fn test_null_report() {
        let df = df! {
            "date" => &[Some("2024-01-01"), None],
            "browser_id" => &["a", "b"],
        }
        .unwrap();
        let nulls = DataValidator::check_nulls(&df, SourceFile::Profiles).unwrap();
        assert_eq!(nulls.get("date"), Some(&1));
        assert!(!nulls.contains_key("browser_id"));
    }
}
