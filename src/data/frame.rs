use crate::error::{PipelineError, Result};
use polars::prelude::*;

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|col| col.as_str() == name)
}

fn require<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| PipelineError::MissingColumn(name.to_string()))
}

/// Numeric values of a column; nulls and NaN read as 0.0
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let casted = require(df, name)?.cast(&DataType::Float64)?;
    let values = casted.f64()?;
    Ok(values
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()).unwrap_or(0.0))
        .collect())
}

/// Numeric values of a column, keeping nulls
pub fn opt_f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let casted = require(df, name)?.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect())
}

pub fn str_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let casted = require(df, name)?.cast(&DataType::String)?;
    let values = casted.str()?;
    Ok(values.into_iter().map(|v| v.map(|s| s.to_string())).collect())
}

/// Flag column as 0/1: `t`, `true`, `y`, `yes` and non-zero numbers are true
pub fn bool_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    Ok(str_values(df, name)?
        .into_iter()
        .map(|value| match value {
            Some(v) => {
                let v = v.trim().to_ascii_lowercase();
                let truthy = matches!(v.as_str(), "t" | "true" | "y" | "yes")
                    || v.parse::<f64>().map(|n| n != 0.0).unwrap_or(false);
                if truthy {
                    1.0
                } else {
                    0.0
                }
            }
            None => 0.0,
        })
        .collect())
}

pub fn set_f64(df: &mut DataFrame, name: &str, values: Vec<f64>) -> Result<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

pub fn set_str(df: &mut DataFrame, name: &str, values: Vec<Option<String>>) -> Result<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

pub fn fill_f64(df: &mut DataFrame, name: &str, value: f64) -> Result<()> {
    let height = df.height();
    set_f64(df, name, vec![value; height])
}

pub fn drop_columns(df: &mut DataFrame, names: &[String]) -> Result<()> {
    for name in names {
        if has_column(df, name) {
            df.drop_in_place(name)?;
        }
    }
    Ok(())
}

pub fn select_columns(df: &DataFrame, names: &[String]) -> Result<DataFrame> {
    for name in names {
        if !has_column(df, name) {
            return Err(PipelineError::MissingColumn(name.clone()));
        }
    }
    Ok(df.select(names.iter().map(|s| s.as_str()))?)
}

pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}

pub fn filter_rows(df: &DataFrame, keep: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("mask".into(), keep);
    Ok(df.filter(&mask)?)
}

/// Row-major matrix of the given columns, in the given order
pub fn row_matrix(df: &DataFrame, names: &[String]) -> Result<Vec<Vec<f64>>> {
    let columns = names
        .iter()
        .map(|name| f64_values(df, name))
        .collect::<Result<Vec<_>>>()?;

    Ok((0..df.height())
        .map(|row| columns.iter().map(|col| col[row]).collect())
        .collect())
}

pub fn frame_from_series(series: Vec<Series>) -> Result<DataFrame> {
    let columns: Vec<Column> = series.into_iter().map(Column::from).collect();
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn test_values_treat_nulls_as_zero() {
        let df = df! {
            "a" => &[Some(1.5), None, Some(f64::NAN)],
        }
        .unwrap();

        assert_eq!(f64_values(&df, "a").unwrap(), vec![1.5, 0.0, 0.0]);
        assert!(matches!(
            f64_values(&df, "missing"),
            Err(PipelineError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_bool_values_accept_mixed_encodings() {
        let df = df! {
            "flag" => &["t", "f", "true", "0", "1"],
        }
        .unwrap();

        assert_eq!(
            bool_values(&df, "flag").unwrap(),
            vec![1.0, 0.0, 1.0, 0.0, 1.0]
        );
    }

    #[test]
    fn test_take_and_filter_rows() {
        let df = df! {
            "a" => &[1.0, 2.0, 3.0],
        }
        .unwrap();

        let taken = take_rows(&df, &[2, 0]).unwrap();
        assert_eq!(f64_values(&taken, "a").unwrap(), vec![3.0, 1.0]);

        let filtered = filter_rows(&df, &[false, true, true]).unwrap();
        assert_eq!(f64_values(&filtered, "a").unwrap(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_row_matrix_follows_requested_order() {
        let df = df! {
            "a" => &[1.0, 2.0],
            "b" => &[10.0, 20.0],
        }
        .unwrap();

        let matrix = row_matrix(&df, &["b".to_string(), "a".to_string()]).unwrap();
        assert_eq!(matrix, vec![vec![10.0, 1.0], vec![20.0, 2.0]]);
    }
}
