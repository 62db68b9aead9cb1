use super::{types::SourceFile, validator::DataValidator};
use crate::data::frame::{bool_values, f64_values, filter_rows, opt_f64_values, str_values};
use crate::data::sources::{
    CommerceEvent, ContextSource, FeatureSource, GlobalContextRecord, PageviewEvent, PageviewSource,
    PaymentHistoryRecord, PaymentHistorySource, TransactionSource,
};
use crate::error::{PipelineError, Result};
use crate::types::{parse_date, parse_timestamp, AggregationFunction, DataRetrievalMode};
use chrono::NaiveDate;
use log::{debug, warn};
use polars::prelude::*;
use std::path::{Path, PathBuf};

pub struct CsvConnector;

impl CsvConnector {
    /// Load CSV file into DataFrame
    pub fn load<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.as_ref().to_path_buf()))?
            .finish()
            .map_err(|e| {
                PipelineError::Source(format!(
                    "Failed to read CSV {}: {}",
                    path.as_ref().display(),
                    e
                ))
            })?;

        Ok(df)
    }

    /// Load a source file and validate its columns
    pub fn load_and_validate<P: AsRef<Path>>(path: P, file: SourceFile) -> Result<DataFrame> {
        let df = Self::load(&path)?;
        DataValidator::validate_columns(&df, file)?;

        // Warn about nulls but don't fail
        let null_report = DataValidator::check_nulls(&df, file)?;
        if !null_report.is_empty() {
            warn!("Null values detected in {}: {:?}", file.file_name(), null_report);
        }

        Ok(df)
    }
}

/// Every collaborator backed by CSV exports in one input directory
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    directory: PathBuf,
}

impl CsvDataSource {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self, file: SourceFile) -> PathBuf {
        self.directory.join(file.file_name())
    }

    pub fn has_file(&self, file: SourceFile) -> bool {
        self.path(file).is_file()
    }

    fn load(&self, file: SourceFile) -> Result<DataFrame> {
        let path = self.path(file);
        debug!("Loading {}", path.display());
        CsvConnector::load_and_validate(path, file)
    }
}

fn within(date: NaiveDate, min_date: NaiveDate, max_date: NaiveDate) -> bool {
    date >= min_date && date <= max_date
}

fn optional_strings(df: &DataFrame, column: &str) -> Result<Vec<Option<String>>> {
    Ok(str_values(df, column)?
        .into_iter()
        .map(|v| v.filter(|s| !s.trim().is_empty()))
        .collect())
}

impl FeatureSource for CsvDataSource {
    fn fetch_feature_frame(
        &self,
        min_date: NaiveDate,
        max_date: NaiveDate,
        window_length: usize,
        _aggregation_functions: &[AggregationFunction],
        _mode: DataRetrievalMode,
    ) -> Result<DataFrame> {
        // Exported profiles are already aggregated over their window
        debug!("Reading pre-aggregated profiles (window length {})", window_length);
        let df = self.load(SourceFile::Profiles)?;
        let keep = str_values(&df, "date")?
            .into_iter()
            .map(|v| match v {
                Some(value) => parse_date(&value).map(|d| within(d, min_date, max_date)),
                None => Ok(false),
            })
            .collect::<Result<Vec<bool>>>()?;
        filter_rows(&df, &keep)
    }
}

impl ContextSource for CsvDataSource {
    fn fetch_global_context(&self, min_date: NaiveDate, max_date: NaiveDate) -> Result<Vec<GlobalContextRecord>> {
        let df = self.load(SourceFile::GlobalContext)?;
        let dates = str_values(&df, "date")?;
        let pageviews = f64_values(&df, "article_pageviews_count")?;
        let sum_paid = f64_values(&df, "sum_paid")?;
        let payment_count = f64_values(&df, "payment_count")?;

        let mut records = Vec::new();
        for (i, date) in dates.into_iter().enumerate() {
            let Some(date) = date else { continue };
            let date = parse_date(&date)?;
            if within(date, min_date, max_date) {
                records.push(GlobalContextRecord {
                    date,
                    article_pageviews_count: pageviews[i],
                    sum_paid: sum_paid[i],
                    payment_count: payment_count[i],
                });
            }
        }
        Ok(records)
    }
}

impl PaymentHistorySource for CsvDataSource {
    fn fetch_payment_history(&self, as_of_date: NaiveDate) -> Result<Vec<PaymentHistoryRecord>> {
        let df = self.load(SourceFile::PaymentHistory)?;
        let user_ids = str_values(&df, "user_id")?;
        let clv = opt_f64_values(&df, "clv")?;
        let days_since = opt_f64_values(&df, "days_since_last_subscription")?;
        let ends = optional_strings(&df, "last_subscription_end")?;

        let mut records = Vec::new();
        for (i, user_id) in user_ids.into_iter().enumerate() {
            let Some(user_id) = user_id else { continue };
            let last_subscription_end = ends[i].as_deref().map(parse_date).transpose()?;
            records.push(PaymentHistoryRecord {
                user_id,
                clv: clv[i],
                days_since_last_subscription: days_since[i],
                last_subscription_end,
            });
        }
        debug!("Loaded {} payment history rows as of {}", records.len(), as_of_date);
        Ok(records)
    }
}

impl TransactionSource for CsvDataSource {
    fn fetch_commerce_events(&self, min_date: NaiveDate, max_date: NaiveDate) -> Result<Vec<CommerceEvent>> {
        let df = self.load(SourceFile::Commerce)?;
        let browsers = optional_strings(&df, "browser_id")?;
        let users = optional_strings(&df, "user_id")?;
        let times = str_values(&df, "time")?;
        let steps = str_values(&df, "step")?;

        let mut events = Vec::new();
        for i in 0..df.height() {
            let (Some(time), Some(step)) = (&times[i], &steps[i]) else { continue };
            let time = parse_timestamp(time)?;
            if within(time.date_naive(), min_date, max_date) {
                events.push(CommerceEvent {
                    browser_id: browsers[i].clone(),
                    user_id: users[i].clone(),
                    time,
                    step: step.clone(),
                });
            }
        }
        Ok(events)
    }
}

impl PageviewSource for CsvDataSource {
    fn fetch_pageviews(&self, min_date: NaiveDate, max_date: NaiveDate) -> Result<Vec<PageviewEvent>> {
        let df = self.load(SourceFile::Pageviews)?;
        let browsers = str_values(&df, "browser_id")?;
        let users = optional_strings(&df, "user_id")?;
        let times = str_values(&df, "time")?;
        let subscribers = bool_values(&df, "subscriber")?;

        let mut pageviews = Vec::new();
        for i in 0..df.height() {
            let (Some(browser_id), Some(time)) = (&browsers[i], &times[i]) else { continue };
            let time = parse_timestamp(time)?;
            if within(time.date_naive(), min_date, max_date) {
                pageviews.push(PageviewEvent {
                    browser_id: browser_id.clone(),
                    user_id: users[i].clone(),
                    time,
                    subscriber: subscribers[i] > 0.0,
                });
            }
        }
        Ok(pageviews)
    }
}
