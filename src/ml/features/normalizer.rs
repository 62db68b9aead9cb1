use super::registry::{ColumnGroup, FeatureColumns, NORMALIZED_SUFFIX};
use crate::data::frame::{f64_values, set_f64};
use crate::error::Result;
use log::info;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// How row-wise normalized values enter the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NormalizationPolicy {
    /// Normalized values overwrite the raw columns
    #[default]
    Replace,
    /// Normalized values are appended as `{column}_normalized`
    Add,
    Ignore,
}

/// Scales each row of each group to [0, 1] relative to the row's own values
/// within that group. Rows whose group values are all equal yield 0.0.
pub fn normalize(
    df: &DataFrame,
    columns: &mut FeatureColumns,
    groups: &[ColumnGroup],
    policy: NormalizationPolicy,
) -> Result<DataFrame> {
    if policy == NormalizationPolicy::Ignore {
        return Ok(df.clone());
    }

    let mut out = df.clone();
    for group in groups {
        if group.columns.is_empty() {
            continue;
        }
        let normalized = normalize_rows(df, &group.columns)?;
        for (column, values) in group.columns.iter().zip(normalized) {
            let target = match policy {
                NormalizationPolicy::Add => format!("{}{}", column, NORMALIZED_SUFFIX),
                _ => column.clone(),
            };
            set_f64(&mut out, &target, values)?;
        }
        if policy == NormalizationPolicy::Add {
            columns.register_normalized(&group.columns);
        }
    }

    info!("  * Normalized {} column groups ({:?})", groups.len(), policy);
    Ok(out)
}

/// Column-major normalized values for one group
fn normalize_rows(df: &DataFrame, group: &[String]) -> Result<Vec<Vec<f64>>> {
    let values = group
        .iter()
        .map(|c| f64_values(df, c))
        .collect::<Result<Vec<_>>>()?;
    let mut normalized = vec![vec![0.0; df.height()]; group.len()];

    for row in 0..df.height() {
        let (min, max) = values
            .iter()
            .map(|col| col[row])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        for (col, out) in values.iter().zip(normalized.iter_mut()) {
            let scaled = (col[row] - min) / (max - min);
            out[row] = if scaled.is_finite() { scaled } else { 0.0 };
        }
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::column_names;
    use polars::df;

    fn group() -> ColumnGroup {
        ColumnGroup::new("halves", vec!["a".to_string(), "b".to_string(), "c".to_string()])
    }

    fn frame() -> DataFrame {
        df! {
            "a" => &[1.0, 0.0],
            "b" => &[3.0, 0.0],
            "c" => &[5.0, 0.0],
        }
        .unwrap()
    }

    #[test]
    fn test_replace_is_row_wise_and_zeroes_flat_rows() {
        let mut columns = FeatureColumns::default();
        let out = normalize(&frame(), &mut columns, &[group()], NormalizationPolicy::Replace).unwrap();

        assert_eq!(f64_values(&out, "a").unwrap(), vec![0.0, 0.0]);
        assert_eq!(f64_values(&out, "b").unwrap(), vec![0.5, 0.0]);
        assert_eq!(f64_values(&out, "c").unwrap(), vec![1.0, 0.0]);
        assert!(columns.normalized_columns.is_empty());
    }

    #[test]
    fn test_add_keeps_raw_and_registers_suffix() {
        let mut columns = FeatureColumns::default();
        let out = normalize(&frame(), &mut columns, &[group()], NormalizationPolicy::Add).unwrap();

        assert_eq!(f64_values(&out, "b").unwrap(), vec![3.0, 0.0]);
        assert_eq!(f64_values(&out, "b_normalized").unwrap(), vec![0.5, 0.0]);
        assert_eq!(columns.normalized_columns, vec!["a_normalized", "b_normalized", "c_normalized"]);
    }

    #[test]
    fn test_ignore_leaves_frame_untouched() {
        let mut columns = FeatureColumns::default();
        let out = normalize(&frame(), &mut columns, &[group()], NormalizationPolicy::Ignore).unwrap();
        assert_eq!(column_names(&out), vec!["a", "b", "c"]);
        assert_eq!(f64_values(&out, "c").unwrap(), vec![5.0, 0.0]);
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let parsed: std::result::Result<NormalizationPolicy, _> = serde_json::from_str("\"SQUASH\"");
        assert!(parsed.is_err());
        let parsed: NormalizationPolicy = serde_json::from_str("\"ADD\"").unwrap();
        assert_eq!(parsed, NormalizationPolicy::Add);
        assert_eq!(NormalizationPolicy::default(), NormalizationPolicy::Replace);
    }
}
