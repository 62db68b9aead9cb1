use crate::error::Result;
use crate::types::{AggregationFunction, DataRetrievalMode};
use chrono::{DateTime, NaiveDate, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Daily site-wide signals, before the rolling window is applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalContextRecord {
    pub date: NaiveDate,
    pub article_pageviews_count: f64,
    pub sum_paid: f64,
    pub payment_count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentHistoryRecord {
    pub user_id: String,
    pub clv: Option<f64>,
    pub days_since_last_subscription: Option<f64>,
    pub last_subscription_end: Option<NaiveDate>,
}

/// A single step of the commerce funnel (checkout, payment, purchase, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommerceEvent {
    pub browser_id: Option<String>,
    pub user_id: Option<String>,
    pub time: DateTime<Utc>,
    pub step: String,
}

/// One pageview with the login state of the browser at that moment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageviewEvent {
    pub browser_id: String,
    pub user_id: Option<String>,
    pub time: DateTime<Utc>,
    pub subscriber: bool,
}

/// Rolling-window browser profiles keyed by (browser_id, date)
pub trait FeatureSource {
    fn fetch_feature_frame(
        &self,
        min_date: NaiveDate,
        max_date: NaiveDate,
        window_length: usize,
        aggregation_functions: &[AggregationFunction],
        mode: DataRetrievalMode,
    ) -> Result<DataFrame>;
}

pub trait ContextSource {
    fn fetch_global_context(
        &self,
        min_date: NaiveDate,
        max_date: NaiveDate,
    ) -> Result<Vec<GlobalContextRecord>>;
}

pub trait PaymentHistorySource {
    fn fetch_payment_history(&self, as_of_date: NaiveDate) -> Result<Vec<PaymentHistoryRecord>>;
}

pub trait TransactionSource {
    fn fetch_commerce_events(
        &self,
        min_date: NaiveDate,
        max_date: NaiveDate,
    ) -> Result<Vec<CommerceEvent>>;
}

pub trait PageviewSource {
    fn fetch_pageviews(&self, min_date: NaiveDate, max_date: NaiveDate) -> Result<Vec<PageviewEvent>>;
}

/// Append-only analytics warehouse
pub trait WarehouseSink {
    fn append_rows(&self, table_name: &str, rows: &[serde_json::Value]) -> Result<()>;
}
