use super::registry::{
    dow_column, dow_hours_column, hours_column, ColumnGroupKind, FeatureColumns, JsonProfileField,
    BROWSER_ID_COLUMN, CLV_COLUMN, DATE_COLUMN, DAYS_SINCE_SUBSCRIPTION_COLUMN, HOUR_INTERVALS,
    OUTCOME_COLUMN, USER_IDS_COLUMN,
};
use super::encoder::UNKNOWN_CATEGORY;
use crate::data::frame::{
    bool_values, f64_values, fill_f64, filter_rows, has_column, select_columns, set_f64, set_str,
    str_values, take_rows,
};
use crate::data::sources::{
    CommerceEvent, ContextSource, FeatureSource, GlobalContextRecord, PaymentHistoryRecord,
    PaymentHistorySource, TransactionSource,
};
use crate::error::{PipelineError, Result};
use crate::types::{
    first_numeric_user_id, format_date, join_user_ids, parse_date, parse_user_ids, AggregationFunction,
    DataRetrievalMode, Outcome,
};
use chrono::{Duration, NaiveDate};
use log::{debug, info, warn};
use polars::prelude::*;
use std::collections::{BTreeMap, HashMap};

/// Days summed by the context and transactional rolling windows
pub const ROLLING_CONTEXT_DAYS: i64 = 7;

/// Sentinel for "no subscription history"
pub const NO_SUBSCRIPTION_HISTORY_DAYS: f64 = 1000.0;

/// A built per-browser-per-day frame together with the registry describing it
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    pub data: DataFrame,
    pub columns: FeatureColumns,
}

impl FeatureFrame {
    pub fn height(&self) -> usize {
        self.data.height()
    }

    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        dates_of(&self.data)
    }

    pub fn browser_ids(&self) -> Result<Vec<String>> {
        Ok(str_values(&self.data, BROWSER_ID_COLUMN)?
            .into_iter()
            .map(|v| v.unwrap_or_default())
            .collect())
    }

    pub fn outcomes(&self) -> Result<Vec<Option<Outcome>>> {
        Ok(str_values(&self.data, OUTCOME_COLUMN)?
            .into_iter()
            .map(|v| v.and_then(|s| Outcome::parse(&s)))
            .collect())
    }

    pub fn max_date(&self) -> Result<Option<NaiveDate>> {
        Ok(self.dates()?.into_iter().max())
    }

    /// Rows at the given positions, same registry
    pub fn subset(&self, indices: &[usize]) -> Result<FeatureFrame> {
        Ok(FeatureFrame {
            data: take_rows(&self.data, indices)?,
            columns: self.columns.clone(),
        })
    }
}

pub fn dates_of(df: &DataFrame) -> Result<Vec<NaiveDate>> {
    str_values(df, DATE_COLUMN)?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| PipelineError::Validation("Null date in feature frame".to_string()))
                .and_then(|s| parse_date(&s))
        })
        .collect()
}

pub struct FeatureFrameBuilder {
    features: Box<dyn FeatureSource>,
    context: Box<dyn ContextSource>,
    payment_history: Box<dyn PaymentHistorySource>,
    transactions: Option<Box<dyn TransactionSource>>,
}

impl FeatureFrameBuilder {
    pub fn new(
        features: Box<dyn FeatureSource>,
        context: Box<dyn ContextSource>,
        payment_history: Box<dyn PaymentHistorySource>,
    ) -> Self {
        Self {
            features,
            context,
            payment_history,
            transactions: None,
        }
    }

    /// Enables the transactional-count join (checkout / payment steps)
    pub fn with_transactions(mut self, transactions: Box<dyn TransactionSource>) -> Self {
        self.transactions = Some(transactions);
        self
    }

    pub fn build(
        &self,
        min_date: NaiveDate,
        max_date: NaiveDate,
        window_length: usize,
        aggregation_functions: &[AggregationFunction],
        mode: DataRetrievalMode,
    ) -> Result<FeatureFrame> {
        if min_date > max_date {
            return Err(PipelineError::Configuration(format!(
                "Max date {} is sooner than the min date {}",
                max_date, min_date
            )));
        }

        let columns = FeatureColumns::new(aggregation_functions, self.transactions.is_some());

        info!("  * Fetching user profiles {} - {}", min_date, max_date);
        let raw = self.features.fetch_feature_frame(
            min_date,
            max_date,
            window_length,
            &columns.aggregation_functions,
            mode,
        )?;
        let mut data = sanitize_profiles(&raw, &columns, mode)?;
        info!("  * Retrieved initial user profiles frame ({} rows)", data.height());

        let dates = dates_of(&data)?;

        match self.context_features(&dates, window_length, min_date, max_date) {
            Ok(values) => {
                for (name, column) in columns.context_columns.iter().zip(values) {
                    set_f64(&mut data, name, column)?;
                }
                info!("Successfully added global context features");
            }
            Err(e) => {
                warn!(
                    "Failed adding global context features with exception: {}; proceeding with remaining features",
                    e
                );
                for name in &columns.context_columns {
                    fill_f64(&mut data, name, 0.0)?;
                }
            }
        }

        match self.payment_history_features(&data, &dates, max_date) {
            Ok((clv, days_since)) => {
                set_f64(&mut data, CLV_COLUMN, clv)?;
                set_f64(&mut data, DAYS_SINCE_SUBSCRIPTION_COLUMN, days_since)?;
                info!("Successfully added user payment history features");
            }
            Err(e) => {
                warn!(
                    "Failed adding payment history features with exception: {}; proceeding with remaining features",
                    e
                );
                fill_f64(&mut data, CLV_COLUMN, 0.0)?;
                fill_f64(&mut data, DAYS_SINCE_SUBSCRIPTION_COLUMN, NO_SUBSCRIPTION_HISTORY_DAYS)?;
            }
        }

        if let Some(transactions) = &self.transactions {
            let commerce_columns = columns.group(ColumnGroupKind::Commerce);
            match transactional_counts(transactions.as_ref(), &data, &dates, &commerce_columns, min_date, max_date) {
                Ok(values) => {
                    for (name, column) in commerce_columns.iter().zip(values) {
                        set_f64(&mut data, name, column)?;
                    }
                    info!("Successfully added commerce flow features");
                }
                Err(e) => {
                    warn!(
                        "Failed adding commerce flow features with exception: {}; proceeding with remaining features",
                        e
                    );
                    for name in &commerce_columns {
                        fill_f64(&mut data, name, 0.0)?;
                    }
                }
            }
        }

        fill_outcomes(&mut data)?;

        let activity = f64_values(&data, &columns.activity_column())?;
        let keep: Vec<bool> = activity.iter().map(|&days| days >= 1.0).collect();
        let data = filter_rows(&data, &keep)?;
        info!("  * Kept {} rows with at least one active day", data.height());

        let data = select_columns(&data, &columns.frame_columns())?;
        Ok(FeatureFrame { data, columns })
    }

    fn context_features(
        &self,
        dates: &[NaiveDate],
        window_length: usize,
        min_date: NaiveDate,
        max_date: NaiveDate,
    ) -> Result<Vec<Vec<f64>>> {
        let lookback = (window_length as i64).max(ROLLING_CONTEXT_DAYS) - 1;
        let records = self
            .context
            .fetch_global_context(min_date - Duration::days(lookback), max_date)?;
        Ok(rolling_context(&records, dates))
    }

    fn payment_history_features(
        &self,
        data: &DataFrame,
        dates: &[NaiveDate],
        max_date: NaiveDate,
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        let records = self.payment_history.fetch_payment_history(max_date)?;
        let user_ids: Vec<String> = str_values(data, USER_IDS_COLUMN)?
            .into_iter()
            .map(|v| v.unwrap_or_default())
            .collect();
        Ok(join_payment_history(&records, &user_ids, dates))
    }
}

/// Sorts by (browser_id, date), unpacks JSON profile fields and fills every
/// registry column the source left out
fn sanitize_profiles(raw: &DataFrame, columns: &FeatureColumns, mode: DataRetrievalMode) -> Result<DataFrame> {
    for required in [DATE_COLUMN, BROWSER_ID_COLUMN] {
        if !has_column(raw, required) {
            return Err(PipelineError::MissingColumn(required.to_string()));
        }
    }

    let dates = dates_of(raw)?;
    let browsers: Vec<String> = str_values(raw, BROWSER_ID_COLUMN)?
        .into_iter()
        .map(|v| v.ok_or_else(|| PipelineError::Validation("Null browser_id in feature frame".to_string())))
        .collect::<Result<_>>()?;

    let mut order: Vec<usize> = (0..raw.height()).collect();
    order.sort_by(|&a, &b| browsers[a].cmp(&browsers[b]).then(dates[a].cmp(&dates[b])));
    let raw = take_rows(raw, &order)?;

    let mut data = DataFrame::new(vec![Column::new(
        DATE_COLUMN.into(),
        order.iter().map(|&i| format_date(dates[i])).collect::<Vec<String>>(),
    )])?;
    set_str(
        &mut data,
        BROWSER_ID_COLUMN,
        order.iter().map(|&i| Some(browsers[i].clone())).collect(),
    )?;

    let user_ids = if has_column(&raw, USER_IDS_COLUMN) {
        str_values(&raw, USER_IDS_COLUMN)?
            .into_iter()
            .map(|v| Some(join_user_ids(&parse_user_ids(&v.unwrap_or_default()))))
            .collect()
    } else {
        vec![Some(String::new()); raw.height()]
    };
    set_str(&mut data, USER_IDS_COLUMN, user_ids)?;

    let outcomes = if has_column(&raw, OUTCOME_COLUMN) {
        str_values(&raw, OUTCOME_COLUMN)?
            .into_iter()
            .map(|v| match v {
                Some(label) if !label.trim().is_empty() => Outcome::parse(&label)
                    .map(|o| Some(o.as_str().to_string()))
                    .ok_or_else(|| PipelineError::Validation(format!("Unknown outcome label '{}'", label))),
                _ => Ok(None),
            })
            .collect::<Result<Vec<_>>>()?
    } else if mode == DataRetrievalMode::ModelTrainData {
        return Err(PipelineError::MissingColumn(OUTCOME_COLUMN.to_string()));
    } else {
        vec![None; raw.height()]
    };
    set_str(&mut data, OUTCOME_COLUMN, outcomes)?;

    for name in &columns.categorical_columns {
        let values = if has_column(&raw, name) {
            str_values(&raw, name)?
                .into_iter()
                .map(|v| Some(v.unwrap_or_else(|| UNKNOWN_CATEGORY.to_string())))
                .collect()
        } else {
            vec![Some(UNKNOWN_CATEGORY.to_string()); raw.height()]
        };
        set_str(&mut data, name, values)?;
    }

    let mut numeric: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for field in JsonProfileField::all() {
        let unpacked_present = field
            .groups()
            .iter()
            .flat_map(|g| g.columns.clone())
            .any(|c| has_column(&raw, &c));
        if has_column(&raw, field.source_column()) && !unpacked_present {
            debug!("Unpacking JSON profile field {}", field.source_column());
            numeric.extend(unpack_json_field(&raw, field)?);
        }
    }

    for (ratio, numerator, denominator) in columns.derived_metric_sources() {
        if !has_column(&raw, &ratio) && has_column(&raw, &numerator) && has_column(&raw, &denominator) {
            let num = f64_values(&raw, &numerator)?;
            let den = f64_values(&raw, &denominator)?;
            let values = num
                .iter()
                .zip(den.iter())
                .map(|(n, d)| if *d == 0.0 { 0.0 } else { n / d })
                .collect();
            numeric.insert(ratio, values);
        }
    }

    for name in columns.zero_fill_columns() {
        let values = if let Some(values) = numeric.remove(&name) {
            values
        } else if has_column(&raw, &name) {
            f64_values(&raw, &name)?
        } else {
            vec![0.0; raw.height()]
        };
        set_f64(&mut data, &name, values)?;
    }

    for name in &columns.bool_columns {
        let values = if has_column(&raw, name) {
            bool_values(&raw, name)?
        } else {
            vec![0.0; raw.height()]
        };
        set_f64(&mut data, name, values)?;
    }

    Ok(data)
}

fn unpack_json_field(raw: &DataFrame, field: JsonProfileField) -> Result<BTreeMap<String, Vec<f64>>> {
    let height = raw.height();
    let mut unpacked: BTreeMap<String, Vec<f64>> = field
        .groups()
        .iter()
        .flat_map(|g| g.columns.clone())
        .map(|c| (c, vec![0.0; height]))
        .collect();

    for (row, value) in str_values(raw, field.source_column())?.into_iter().enumerate() {
        let Some(value) = value else { continue };
        if value.trim().is_empty() {
            continue;
        }
        let counts: HashMap<String, serde_json::Value> = serde_json::from_str(&value)?;
        for (key, count) in counts {
            let count = count
                .as_f64()
                .or_else(|| count.as_str().and_then(|s| s.parse().ok()))
                .unwrap_or(0.0);
            let targets = match field {
                JsonProfileField::RefererMedium => vec![format!("referer_medium_pageviews_{}_count", key)],
                JsonProfileField::ArticleCategory => vec![format!("article_category_pageviews_{}_count", key)],
                JsonProfileField::HourInterval => match key.split_once('_') {
                    Some((dow, hours)) if HOUR_INTERVALS.contains(&hours) => match dow.parse::<usize>() {
                        Ok(dow) if dow < 7 => vec![dow_hours_column(dow, hours), dow_column(dow), hours_column(hours)],
                        _ => Vec::new(),
                    },
                    _ => Vec::new(),
                },
            };
            for target in targets {
                if let Some(column) = unpacked.get_mut(&target) {
                    column[row] += count;
                }
            }
        }
    }

    Ok(unpacked)
}

/// Per-row rolling sums (date-7, date] of the daily context, plus average price
fn rolling_context(records: &[GlobalContextRecord], dates: &[NaiveDate]) -> Vec<Vec<f64>> {
    let mut daily: BTreeMap<NaiveDate, [f64; 3]> = BTreeMap::new();
    for record in records {
        let entry = daily.entry(record.date).or_insert([0.0; 3]);
        entry[0] += record.article_pageviews_count;
        entry[1] += record.sum_paid;
        entry[2] += record.payment_count;
    }

    let mut article_pageviews = Vec::with_capacity(dates.len());
    let mut sum_paid = Vec::with_capacity(dates.len());
    let mut payment_count = Vec::with_capacity(dates.len());
    let mut avg_price = Vec::with_capacity(dates.len());

    for &date in dates {
        let start = date - Duration::days(ROLLING_CONTEXT_DAYS - 1);
        let window = daily
            .range(start..=date)
            .fold([0.0; 3], |acc, (_, v)| [acc[0] + v[0], acc[1] + v[1], acc[2] + v[2]]);
        article_pageviews.push(window[0]);
        sum_paid.push(window[1]);
        payment_count.push(window[2]);
        avg_price.push(if window[2] > 0.0 { window[1] / window[2] } else { 0.0 });
    }

    vec![article_pageviews, sum_paid, payment_count, avg_price]
}

/// Lifetime value and days since last subscription per row.
///
/// Matching uses only the first numeric id of a row's id list. A subscription
/// ending on or after the row's date would leak the future, so it reads as
/// missing.
pub fn join_payment_history(
    records: &[PaymentHistoryRecord],
    user_ids: &[String],
    dates: &[NaiveDate],
) -> (Vec<f64>, Vec<f64>) {
    let by_user: HashMap<String, &PaymentHistoryRecord> = records
        .iter()
        .filter_map(|r| first_numeric_user_id(&[r.user_id.clone()]).map(|id| (id, r)))
        .collect();

    user_ids
        .iter()
        .zip(dates.iter())
        .map(|(ids, &date)| {
            let matched = first_numeric_user_id(&parse_user_ids(ids)).and_then(|id| by_user.get(&id).copied());
            match matched {
                Some(record) if record.last_subscription_end.map_or(true, |end| end < date) => (
                    record.clv.unwrap_or(0.0),
                    record
                        .days_since_last_subscription
                        .unwrap_or(NO_SUBSCRIPTION_HISTORY_DAYS),
                ),
                _ => (0.0, NO_SUBSCRIPTION_HISTORY_DAYS),
            }
        })
        .unzip()
}

fn transactional_counts(
    source: &dyn TransactionSource,
    data: &DataFrame,
    dates: &[NaiveDate],
    steps: &[String],
    min_date: NaiveDate,
    max_date: NaiveDate,
) -> Result<Vec<Vec<f64>>> {
    let events: Vec<CommerceEvent> =
        source.fetch_commerce_events(min_date - Duration::days(ROLLING_CONTEXT_DAYS - 1), max_date)?;

    let mut daily: HashMap<(String, String), BTreeMap<NaiveDate, f64>> = HashMap::new();
    for event in &events {
        let Some(browser_id) = &event.browser_id else { continue };
        if !steps.contains(&event.step) {
            continue;
        }
        *daily
            .entry((browser_id.clone(), event.step.clone()))
            .or_default()
            .entry(event.time.date_naive())
            .or_insert(0.0) += 1.0;
    }

    let browsers: Vec<String> = str_values(data, BROWSER_ID_COLUMN)?
        .into_iter()
        .map(|v| v.unwrap_or_default())
        .collect();

    Ok(steps
        .iter()
        .map(|step| {
            browsers
                .iter()
                .zip(dates.iter())
                .map(|(browser, &date)| {
                    daily
                        .get(&(browser.clone(), step.clone()))
                        .map(|days| {
                            days.range(date - Duration::days(ROLLING_CONTEXT_DAYS - 1)..=date)
                                .map(|(_, count)| count)
                                .sum()
                        })
                        .unwrap_or(0.0)
                })
                .collect()
        })
        .collect())
}

/// Back-fills, then forward-fills missing outcomes within each browser's
/// date-ordered rows
fn fill_outcomes(data: &mut DataFrame) -> Result<()> {
    let browsers = str_values(data, BROWSER_ID_COLUMN)?;
    let mut outcomes = str_values(data, OUTCOME_COLUMN)?;

    let mut start = 0;
    while start < browsers.len() {
        let mut end = start + 1;
        while end < browsers.len() && browsers[end] == browsers[start] {
            end += 1;
        }

        let mut next: Option<String> = None;
        for i in (start..end).rev() {
            match &outcomes[i] {
                Some(value) => next = Some(value.clone()),
                None => outcomes[i] = next.clone(),
            }
        }
        let mut previous: Option<String> = None;
        for outcome in outcomes.iter_mut().take(end).skip(start) {
            match outcome {
                Some(value) => previous = Some(value.clone()),
                None => *outcome = previous.clone(),
            }
        }

        start = end;
    }

    set_str(data, OUTCOME_COLUMN, outcomes)
}
