use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PipelineError, Result};

pub const CURRENT_MODEL_VERSION: &str = "1.0";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// What happened to a browser within the week following a profile day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Conversion,
    NoConversion,
    SharedAccountLogin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Negative,
    Positive,
}

impl Outcome {
    /// Label encoder order (alphabetical by label)
    pub const ALL: [Outcome; 3] = [
        Outcome::Conversion,
        Outcome::NoConversion,
        Outcome::SharedAccountLogin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversion => "conversion",
            Self::NoConversion => "no_conversion",
            Self::SharedAccountLogin => "shared_account_login",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "conversion" => Some(Self::Conversion),
            "no_conversion" => Some(Self::NoConversion),
            "shared_account_login" => Some(Self::SharedAccountLogin),
            _ => None,
        }
    }

    pub fn polarity(&self) -> Polarity {
        match self {
            Self::NoConversion => Polarity::Negative,
            Self::Conversion | Self::SharedAccountLogin => Polarity::Positive,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Conversion => 0,
            Self::NoConversion => 1,
            Self::SharedAccountLogin => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the feature source should attach historical labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataRetrievalMode {
    ModelTrainData,
    PredictData,
}

/// Aggregation applied by the feature source over the rolling window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFunction {
    Count,
    Avg,
    Min,
    Max,
}

impl AggregationFunction {
    pub fn alias(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

/// One output row of the prediction table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub date: NaiveDate,
    pub browser_id: String,
    pub user_ids: Option<Vec<String>>,
    pub conversion_probability: f64,
    pub no_conversion_probability: f64,
    pub shared_account_login_probability: f64,
    pub predicted_outcome: Outcome,
    pub model_version: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionJobLog {
    pub date: NaiveDate,
    pub model_version: String,
    pub created_at: DateTime<Utc>,
    pub rows_predicted: usize,
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT)
        .map_err(|e| PipelineError::Validation(format!("Invalid date '{}': {}", value, e)))
}

/// RFC 3339, or `YYYY-MM-DD HH:MM:SS[.f]` read as UTC
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| PipelineError::Validation(format!("Invalid timestamp '{}': {}", value, e)))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses `{a,b}`, `[a, b]`, `["a","b"]` or `a,b` into a de-duplicated id list
pub fn parse_user_ids(raw: &str) -> Vec<String> {
    let inner = raw
        .trim()
        .trim_start_matches(['{', '['])
        .trim_end_matches(['}', ']']);

    let mut ids: Vec<String> = Vec::new();
    for part in inner.split(',') {
        let id = part.trim().trim_matches(['"', '\'']).trim();
        if !id.is_empty() && !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

pub fn join_user_ids(ids: &[String]) -> String {
    ids.join(",")
}

/// First run of digits in the first id of the list.
///
/// Only the first id takes part in payment-history matching; the remaining
/// ids of a multi-user browser are ignored.
pub fn first_numeric_user_id(ids: &[String]) -> Option<String> {
    let first = ids.first()?;
    let digits: String = first
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u64>().ok().map(|id| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_encoder_order_is_alphabetical() {
        let labels: Vec<&str> = Outcome::ALL.iter().map(|o| o.as_str()).collect();
        let mut sorted = labels.clone();
        sorted.sort();
        assert_eq!(labels, sorted);
        for outcome in Outcome::ALL {
            assert_eq!(Outcome::from_index(outcome.index()), Some(outcome));
        }
    }

    #[test]
    fn test_polarity_mapping() {
        assert_eq!(Outcome::NoConversion.polarity(), Polarity::Negative);
        assert_eq!(Outcome::Conversion.polarity(), Polarity::Positive);
        assert_eq!(Outcome::SharedAccountLogin.polarity(), Polarity::Positive);
    }

    #[test]
    fn test_parse_user_ids_formats() {
        assert_eq!(parse_user_ids("{12,34,12}"), vec!["12", "34"]);
        assert_eq!(parse_user_ids("[\"7\", \"8\"]"), vec!["7", "8"]);
        assert!(parse_user_ids("").is_empty());
        assert!(parse_user_ids("{}").is_empty());
    }

    #[test]
    fn test_first_numeric_user_id() {
        let ids = vec!["user-0042x".to_string(), "99".to_string()];
        assert_eq!(first_numeric_user_id(&ids), Some("42".to_string()));
        assert_eq!(first_numeric_user_id(&["abc".to_string()]), None);
        assert_eq!(first_numeric_user_id(&[]), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2024-03-05T13:00:00+01:00").unwrap();
        let plain = parse_timestamp("2024-03-05 12:00:00").unwrap();
        assert_eq!(rfc, plain);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_parse_date_accepts_timestamps() {
        let date = parse_date("2024-03-05 13:00:00").unwrap();
        assert_eq!(format_date(date), "2024-03-05");
        assert!(parse_date("05/03/2024").is_err());
    }
}
