use crate::data::frame::{f64_values, set_f64};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Range of one fitted column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRange {
    pub column: String,
    pub min: f64,
    pub max: f64,
}

/// Column-wise min-max scaler; constant columns scale to 0
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    ranges: Vec<ColumnRange>,
}

impl MinMaxScaler {
    pub fn fit(df: &DataFrame, columns: &[String]) -> Result<Self> {
        let ranges = columns
            .iter()
            .map(|column| {
                let values = f64_values(df, column)?;
                let (min, max) = if values.is_empty() {
                    (0.0, 0.0)
                } else {
                    values
                        .iter()
                        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
                };
                Ok(ColumnRange {
                    column: column.clone(),
                    min,
                    max,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { ranges })
    }

    pub fn columns(&self) -> Vec<String> {
        self.ranges.iter().map(|r| r.column.clone()).collect()
    }

    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if self.ranges.is_empty() {
            return Err(PipelineError::Model("Scaler has not been fitted".to_string()));
        }

        let mut out = df.clone();
        for range in &self.ranges {
            let span = range.max - range.min;
            let scaled = f64_values(df, &range.column)?
                .into_iter()
                .map(|v| if span > 0.0 { (v - range.min) / span } else { 0.0 })
                .collect();
            set_f64(&mut out, &range.column, scaled)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn test_scales_by_training_range() {
        let train = df! {
            "x" => &[2.0, 4.0, 6.0],
            "flat" => &[3.0, 3.0, 3.0],
        }
        .unwrap();
        let columns = vec!["x".to_string(), "flat".to_string()];
        let scaler = MinMaxScaler::fit(&train, &columns).unwrap();

        let scoring = df! {
            "x" => &[4.0, 8.0],
            "flat" => &[3.0, 9.0],
        }
        .unwrap();
        let out = scaler.transform(&scoring).unwrap();
        assert_eq!(f64_values(&out, "x").unwrap(), vec![0.5, 1.5]);
        assert_eq!(f64_values(&out, "flat").unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_serialized_state_preserves_column_order() {
        let train = df! { "b" => &[1.0, 2.0], "a" => &[0.0, 10.0] }.unwrap();
        let scaler = MinMaxScaler::fit(&train, &["b".to_string(), "a".to_string()]).unwrap();
        let json = serde_json::to_string(&scaler).unwrap();
        let restored: MinMaxScaler = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.columns(), vec!["b", "a"]);
        assert_eq!(restored, scaler);
    }
}
