use crate::data::frame::{filter_rows, has_column, set_str, str_values};
use crate::data::sources::{CommerceEvent, FeatureSource, PageviewEvent, PageviewSource, TransactionSource};
use crate::error::Result;
use crate::ml::features::builder::dates_of;
use crate::ml::features::registry::{BROWSER_ID_COLUMN, OUTCOME_COLUMN};
use crate::types::{AggregationFunction, DataRetrievalMode, Outcome};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::info;
use polars::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Longest gap between a payment and the purchase confirming it
pub const PAYMENT_PURCHASE_GAP_MINUTES: i64 = 5;

/// Days before an event whose outcome the event determines
pub const OUTCOME_HORIZON_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledEvent {
    pub browser_id: String,
    pub time: DateTime<Utc>,
    pub outcome: Outcome,
}

impl LabeledEvent {
    pub fn date(&self) -> NaiveDate {
        self.time.date_naive()
    }
}

/// A purchase following the same user's last payment within five minutes is a
/// conversion of the browser that made the payment
pub fn detect_conversions(events: &[CommerceEvent]) -> Vec<LabeledEvent> {
    let mut sorted: Vec<&CommerceEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.time);

    let mut last_payment: HashMap<&str, (DateTime<Utc>, &str)> = HashMap::new();
    let mut conversions = Vec::new();

    for event in sorted {
        let Some(user_id) = event.user_id.as_deref().filter(|u| !u.is_empty()) else {
            continue;
        };
        match event.step.as_str() {
            "payment" => {
                if let Some(browser_id) = event.browser_id.as_deref().filter(|b| !b.is_empty()) {
                    last_payment.insert(user_id, (event.time, browser_id));
                }
            }
            "purchase" => {
                if let Some((paid_at, browser_id)) = last_payment.get(user_id) {
                    if event.time - Duration::minutes(PAYMENT_PURCHASE_GAP_MINUTES) <= *paid_at {
                        conversions.push(LabeledEvent {
                            browser_id: browser_id.to_string(),
                            time: event.time,
                            outcome: Outcome::Conversion,
                        });
                    }
                }
            }
            _ => {}
        }
    }

    conversions
}

/// A browser seen anonymous and later logged in as a subscriber on the same
/// day shares someone else's account. At most one event per browser and day.
pub fn detect_shared_logins(pageviews: &[PageviewEvent]) -> Vec<LabeledEvent> {
    let mut by_day: BTreeMap<NaiveDate, Vec<&PageviewEvent>> = BTreeMap::new();
    for pageview in pageviews {
        by_day.entry(pageview.time.date_naive()).or_default().push(pageview);
    }

    let mut logins = Vec::new();
    for (_, mut day) in by_day {
        day.sort_by_key(|p| p.time);
        let mut anonymous: HashSet<&str> = HashSet::new();
        let mut logged_in: BTreeMap<&str, DateTime<Utc>> = BTreeMap::new();

        for pageview in day {
            let has_user = pageview.user_id.as_deref().is_some_and(|u| !u.is_empty());
            if !pageview.subscriber && !has_user {
                anonymous.insert(pageview.browser_id.as_str());
            } else if pageview.subscriber && has_user && anonymous.contains(pageview.browser_id.as_str()) {
                logged_in.insert(pageview.browser_id.as_str(), pageview.time);
            }
        }

        logins.extend(logged_in.into_iter().map(|(browser_id, time)| LabeledEvent {
            browser_id: browser_id.to_string(),
            time,
            outcome: Outcome::SharedAccountLogin,
        }));
    }

    logins
}

/// Labels profile rows from events.
///
/// For an event of browser B on day N, rows of B on days N-7..N-1 still
/// labelled `no_conversion` take the event's outcome and the (B, N) row is
/// removed. Events are applied in time order, so the first subsequent event
/// decides a row's label. Rows without a label default to `no_conversion`.
pub fn apply_events(profiles: &DataFrame, events: &[LabeledEvent]) -> Result<DataFrame> {
    let dates = dates_of(profiles)?;
    let browsers: Vec<String> = str_values(profiles, BROWSER_ID_COLUMN)?
        .into_iter()
        .map(|v| v.unwrap_or_default())
        .collect();
    let mut outcomes: Vec<Option<String>> = if has_column(profiles, OUTCOME_COLUMN) {
        str_values(profiles, OUTCOME_COLUMN)?
    } else {
        vec![None; profiles.height()]
    };
    for outcome in outcomes.iter_mut().filter(|o| o.is_none()) {
        *outcome = Some(Outcome::NoConversion.as_str().to_string());
    }

    let mut rows_by_key: HashMap<(&str, NaiveDate), Vec<usize>> = HashMap::new();
    for (row, (browser, date)) in browsers.iter().zip(dates.iter()).enumerate() {
        rows_by_key.entry((browser.as_str(), *date)).or_default().push(row);
    }

    let mut sorted: Vec<&LabeledEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.time);

    let mut keep = vec![true; profiles.height()];
    for event in sorted {
        let event_day = event.date();
        for offset in 1..=OUTCOME_HORIZON_DAYS {
            let day = event_day - Duration::days(offset);
            for &row in rows_by_key.get(&(event.browser_id.as_str(), day)).into_iter().flatten() {
                if outcomes[row].as_deref() == Some(Outcome::NoConversion.as_str()) {
                    outcomes[row] = Some(event.outcome.as_str().to_string());
                }
            }
        }
        for &row in rows_by_key
            .get(&(event.browser_id.as_str(), event_day))
            .into_iter()
            .flatten()
        {
            keep[row] = false;
        }
    }

    let mut labeled = profiles.clone();
    set_str(&mut labeled, OUTCOME_COLUMN, outcomes)?;
    filter_rows(&labeled, &keep)
}

/// Feature source whose training rows are labelled from commerce and
/// pageview events
pub struct LabeledFeatureSource {
    inner: Box<dyn FeatureSource>,
    transactions: Box<dyn TransactionSource>,
    pageviews: Box<dyn PageviewSource>,
}

impl LabeledFeatureSource {
    pub fn new(
        inner: Box<dyn FeatureSource>,
        transactions: Box<dyn TransactionSource>,
        pageviews: Box<dyn PageviewSource>,
    ) -> Self {
        Self {
            inner,
            transactions,
            pageviews,
        }
    }
}

impl FeatureSource for LabeledFeatureSource {
    fn fetch_feature_frame(
        &self,
        min_date: NaiveDate,
        max_date: NaiveDate,
        window_length: usize,
        aggregation_functions: &[AggregationFunction],
        mode: DataRetrievalMode,
    ) -> Result<DataFrame> {
        let profiles =
            self.inner
                .fetch_feature_frame(min_date, max_date, window_length, aggregation_functions, mode)?;
        if mode == DataRetrievalMode::PredictData {
            return Ok(profiles);
        }

        let horizon = max_date + Duration::days(OUTCOME_HORIZON_DAYS);
        let mut events = detect_conversions(&self.transactions.fetch_commerce_events(min_date, horizon)?);
        events.extend(detect_shared_logins(&self.pageviews.fetch_pageviews(min_date, horizon)?));
        info!("  * Labelling profiles from {} conversion events", events.len());

        apply_events(&profiles, &events)
    }
}
