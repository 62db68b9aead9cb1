use crate::types::AggregationFunction;
use serde::{Deserialize, Serialize};

pub const CATEGORICAL_COLUMNS: [&str; 4] = ["device", "browser", "os", "day_of_week"];

pub const RAW_METRICS: [&str; 5] = ["pageview", "visit", "direct_visit", "days_active", "timespent"];

/// (ratio, numerator metric, denominator metric)
pub const DERIVED_METRICS: [(&str, &str, &str); 5] = [
    ("pageviews_per_visit", "pageview", "visit"),
    ("visits_per_day_active", "visit", "days_active"),
    ("direct_visits_share", "direct_visit", "visit"),
    ("timespent_per_visit", "timespent", "visit"),
    ("timespent_per_pageview", "timespent", "pageview"),
];

pub const DAYS_SINCE_LAST_ACTIVE: &str = "days_since_last_active";

/// (prefix, suffix) of the first-half, last-half and relative-change variants
pub const WINDOW_VARIANTS: [(&str, &str); 3] = [
    ("", "_first_window_half"),
    ("", "_last_window_half"),
    ("relative_", "_change_first_and_second_half"),
];

pub const BOOL_COLUMNS: [&str; 4] = ["is_desktop", "is_mobile", "is_tablet", "is_active_on_date"];

pub const DATE_COLUMN: &str = "date";
pub const BROWSER_ID_COLUMN: &str = "browser_id";
pub const USER_IDS_COLUMN: &str = "user_ids";
pub const OUTCOME_COLUMN: &str = "outcome";
pub const CONFIG_COLUMNS: [&str; 3] = [DATE_COLUMN, BROWSER_ID_COLUMN, USER_IDS_COLUMN];

pub const CONTEXT_COLUMNS: [&str; 4] = ["article_pageviews_count", "sum_paid", "payment_count", "avg_price"];

pub const CLV_COLUMN: &str = "clv";
pub const DAYS_SINCE_SUBSCRIPTION_COLUMN: &str = "days_since_last_subscription";
pub const PAYMENT_HISTORY_COLUMNS: [&str; 2] = [CLV_COLUMN, DAYS_SINCE_SUBSCRIPTION_COLUMN];

pub const COMMERCE_STEPS: [&str; 2] = ["checkout", "payment"];

pub const NORMALIZED_SUFFIX: &str = "_normalized";

pub const HOUR_INTERVALS: [&str; 6] = [
    "00:00-00:59_03:00-03:59",
    "04:00-04:59_07:00-07:59",
    "08:00-08:59_11:00-11:59",
    "12:00-12:59_15:00-15:59",
    "16:00-16:59_19:00-19:59",
    "20:00-20:59_23:00-23:59",
];

pub const REFERER_MEDIUMS: [&str; 6] = ["direct", "email", "external", "internal", "search", "social"];

pub const ARTICLE_CATEGORIES: [&str; 15] = [
    "",
    "blog",
    "ekonomika",
    "hlavna",
    "karikatury",
    "komentare",
    "kultura",
    "nezaradene",
    "pageview",
    "rodina-a-vztahy",
    "slovensko",
    "sport",
    "svet",
    "veda",
    "zdravie",
];

/// JSON-shaped profile aggregates delivered by the feature source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonProfileField {
    RefererMedium,
    ArticleCategory,
    HourInterval,
}

impl JsonProfileField {
    pub fn all() -> [Self; 3] {
        [Self::RefererMedium, Self::ArticleCategory, Self::HourInterval]
    }

    pub fn source_column(&self) -> &'static str {
        match self {
            Self::RefererMedium => "referer_medium_pageviews",
            Self::ArticleCategory => "article_category_pageviews",
            Self::HourInterval => "hour_interval_pageviews",
        }
    }

    /// Column groups unpacked from this field; each group is normalized on its own
    pub fn groups(&self) -> Vec<ColumnGroup> {
        match self {
            Self::RefererMedium => vec![ColumnGroup::new(
                "referer_medium",
                REFERER_MEDIUMS
                    .iter()
                    .map(|m| format!("referer_medium_pageviews_{}_count", m))
                    .collect(),
            )],
            Self::ArticleCategory => vec![ColumnGroup::new(
                "article_category",
                ARTICLE_CATEGORIES
                    .iter()
                    .map(|c| format!("article_category_pageviews_{}_count", c))
                    .collect(),
            )],
            Self::HourInterval => vec![
                ColumnGroup::new(
                    "dow_hours",
                    (0..7)
                        .flat_map(|dow| {
                            HOUR_INTERVALS
                                .iter()
                                .map(move |hours| dow_hours_column(dow, hours))
                        })
                        .collect(),
                ),
                ColumnGroup::new("dow", (0..7).map(dow_column).collect()),
                ColumnGroup::new(
                    "hours",
                    HOUR_INTERVALS.iter().map(|h| hours_column(h)).collect(),
                ),
            ],
        }
    }
}

pub fn dow_hours_column(dow: usize, hours: &str) -> String {
    format!("dow_{}_hours_{}_count", dow, hours)
}

pub fn dow_column(dow: usize) -> String {
    format!("dow_{}_count", dow)
}

pub fn hours_column(hours: &str) -> String {
    format!("hours_{}_count", hours)
}

pub fn window_variants(column: &str) -> Vec<String> {
    WINDOW_VARIANTS
        .iter()
        .map(|(prefix, suffix)| format!("{}{}{}", prefix, column, suffix))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnGroup {
    pub name: String,
    pub columns: Vec<String>,
}

impl ColumnGroup {
    pub fn new(name: &str, columns: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            columns,
        }
    }
}

/// Named column groups of the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnGroupKind {
    Config,
    Categorical,
    NumericWithWindowVariants,
    ProfileCounts,
    Boolean,
    Context,
    PaymentHistory,
    Commerce,
    Normalized,
}

/// Catalogue of every column a feature frame carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumns {
    pub aggregation_functions: Vec<AggregationFunction>,
    pub categorical_columns: Vec<String>,
    pub base_numeric_columns: Vec<String>,
    pub numeric_columns_with_window_variants: Vec<String>,
    pub profile_groups: Vec<ColumnGroup>,
    pub time_window_groups: Vec<ColumnGroup>,
    pub bool_columns: Vec<String>,
    pub config_columns: Vec<String>,
    pub context_columns: Vec<String>,
    pub payment_history_columns: Vec<String>,
    pub commerce_columns: Vec<String>,
    pub normalized_columns: Vec<String>,
}

impl FeatureColumns {
    pub fn new(aggregation_functions: &[AggregationFunction], commerce_features: bool) -> Self {
        let aggregation_functions = if aggregation_functions.is_empty() {
            vec![AggregationFunction::Count]
        } else {
            aggregation_functions.to_vec()
        };

        let mut base_numeric_columns = Vec::new();
        for function in &aggregation_functions {
            let alias = function.alias();
            base_numeric_columns.extend(RAW_METRICS.iter().map(|m| format!("{}_{}", m, alias)));
            base_numeric_columns.extend(DERIVED_METRICS.iter().map(|(r, _, _)| format!("{}_{}", r, alias)));
        }
        base_numeric_columns.push(DAYS_SINCE_LAST_ACTIVE.to_string());

        let windowed: Vec<&String> = base_numeric_columns
            .iter()
            .filter(|c| c.as_str() != DAYS_SINCE_LAST_ACTIVE)
            .collect();

        let mut numeric_columns_with_window_variants: Vec<String> =
            windowed.iter().flat_map(|c| window_variants(c)).collect();
        numeric_columns_with_window_variants.extend(base_numeric_columns.iter().cloned());

        let time_window_groups = windowed
            .iter()
            .map(|c| {
                let variants = window_variants(c);
                ColumnGroup::new(c, variants[..2].to_vec())
            })
            .collect();

        let profile_groups = JsonProfileField::all()
            .iter()
            .flat_map(|field| field.groups())
            .collect();

        Self {
            aggregation_functions,
            categorical_columns: to_strings(&CATEGORICAL_COLUMNS),
            base_numeric_columns,
            numeric_columns_with_window_variants,
            profile_groups,
            time_window_groups,
            bool_columns: to_strings(&BOOL_COLUMNS),
            config_columns: to_strings(&CONFIG_COLUMNS),
            context_columns: to_strings(&CONTEXT_COLUMNS),
            payment_history_columns: to_strings(&PAYMENT_HISTORY_COLUMNS),
            commerce_columns: if commerce_features {
                to_strings(&COMMERCE_STEPS)
            } else {
                Vec::new()
            },
            normalized_columns: Vec::new(),
        }
    }

    pub fn group(&self, kind: ColumnGroupKind) -> Vec<String> {
        match kind {
            ColumnGroupKind::Config => self.config_columns.clone(),
            ColumnGroupKind::Categorical => self.categorical_columns.clone(),
            ColumnGroupKind::NumericWithWindowVariants => self.numeric_columns_with_window_variants.clone(),
            ColumnGroupKind::ProfileCounts => self.profile_count_columns(),
            ColumnGroupKind::Boolean => self.bool_columns.clone(),
            ColumnGroupKind::Context => self.context_columns.clone(),
            ColumnGroupKind::PaymentHistory => self.payment_history_columns.clone(),
            ColumnGroupKind::Commerce => self.commerce_columns.clone(),
            ColumnGroupKind::Normalized => self.normalized_columns.clone(),
        }
    }

    pub fn profile_count_columns(&self) -> Vec<String> {
        self.profile_groups
            .iter()
            .flat_map(|g| g.columns.iter().cloned())
            .collect()
    }

    /// Groups normalized row-wise: profile sections first, then window halves
    pub fn normalization_groups(&self) -> Vec<ColumnGroup> {
        self.profile_groups
            .iter()
            .chain(self.time_window_groups.iter())
            .cloned()
            .collect()
    }

    /// Numeric columns fed to the model without min-max scaling
    pub fn unscaled_numeric_columns(&self) -> Vec<String> {
        let mut columns = self.profile_count_columns();
        columns.extend(self.context_columns.iter().cloned());
        columns.extend(self.payment_history_columns.iter().cloned());
        columns.extend(self.commerce_columns.iter().cloned());
        columns.extend(self.normalized_columns.iter().cloned());
        columns
    }

    /// Every numeric column the frame must carry, zero-filled when absent
    pub fn zero_fill_columns(&self) -> Vec<String> {
        let mut columns = self.numeric_columns_with_window_variants.clone();
        columns.extend(self.profile_count_columns());
        columns
    }

    /// The exact, ordered column list of a built feature frame
    pub fn frame_columns(&self) -> Vec<String> {
        let mut columns = self.config_columns.clone();
        columns.push(OUTCOME_COLUMN.to_string());
        columns.extend(self.categorical_columns.iter().cloned());
        columns.extend(self.numeric_columns_with_window_variants.iter().cloned());
        columns.extend(self.bool_columns.iter().cloned());
        columns.extend(self.unscaled_numeric_columns());
        columns
    }

    pub fn register_normalized(&mut self, columns: &[String]) {
        for column in columns {
            let normalized = format!("{}{}", column, NORMALIZED_SUFFIX);
            if !self.normalized_columns.contains(&normalized) {
                self.normalized_columns.push(normalized);
            }
        }
    }

    /// Column whose value must be >= 1 for a row to be kept
    pub fn activity_column(&self) -> String {
        let alias = self
            .aggregation_functions
            .first()
            .map(|f| f.alias())
            .unwrap_or(AggregationFunction::Count.alias());
        format!("days_active_{}", alias)
    }

    /// (ratio column, numerator column, denominator column) per aggregation alias
    pub fn derived_metric_sources(&self) -> Vec<(String, String, String)> {
        self.aggregation_functions
            .iter()
            .flat_map(|function| {
                let alias = function.alias();
                DERIVED_METRICS.iter().map(move |(ratio, num, den)| {
                    (
                        format!("{}_{}", ratio, alias),
                        format!("{}_{}", num, alias),
                        format!("{}_{}", den, alias),
                    )
                })
            })
            .collect()
    }
}

impl Default for FeatureColumns {
    fn default() -> Self {
        Self::new(&[AggregationFunction::Count], false)
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_window_variants_skip_days_since_last_active() {
        let columns = FeatureColumns::default();
        assert!(columns
            .numeric_columns_with_window_variants
            .contains(&"pageview_count_first_window_half".to_string()));
        assert!(columns
            .numeric_columns_with_window_variants
            .contains(&"relative_visit_count_change_first_and_second_half".to_string()));
        assert!(!columns
            .numeric_columns_with_window_variants
            .iter()
            .any(|c| c.starts_with("days_since_last_active_")));
        assert!(columns
            .numeric_columns_with_window_variants
            .contains(&DAYS_SINCE_LAST_ACTIVE.to_string()));
    }

    #[test]
    fn test_frame_columns_are_unique() {
        let columns = FeatureColumns::new(&[AggregationFunction::Count, AggregationFunction::Avg], true);
        let frame_columns = columns.frame_columns();
        let unique: HashSet<&String> = frame_columns.iter().collect();
        assert_eq!(unique.len(), frame_columns.len());
        assert!(frame_columns.contains(&"checkout".to_string()));
        assert!(frame_columns.contains(&"pageviews_per_visit_avg".to_string()));
    }

    #[test]
    fn test_hour_interval_groups() {
        let groups = JsonProfileField::HourInterval.groups();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].columns.len(), 42);
        assert_eq!(groups[1].columns[0], "dow_0_count");
        assert_eq!(groups[2].columns.len(), HOUR_INTERVALS.len());
    }

    #[test]
    fn test_register_normalized_is_idempotent() {
        let mut columns = FeatureColumns::default();
        let group = vec!["a".to_string(), "b".to_string()];
        columns.register_normalized(&group);
        columns.register_normalized(&group);
        assert_eq!(columns.normalized_columns, vec!["a_normalized", "b_normalized"]);
        assert!(columns.frame_columns().contains(&"b_normalized".to_string()));
    }

    #[test]
    fn test_commerce_columns_follow_flag() {
        assert!(FeatureColumns::default().group(ColumnGroupKind::Commerce).is_empty());
        assert_eq!(
            FeatureColumns::new(&[], true).group(ColumnGroupKind::Commerce),
            vec!["checkout", "payment"]
        );
        assert_eq!(FeatureColumns::new(&[], false).activity_column(), "days_active_count");
    }
}
