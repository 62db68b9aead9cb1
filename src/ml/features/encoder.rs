use crate::data::frame::{drop_columns, has_column, set_str, str_values};
use crate::error::{PipelineError, Result};
use log::debug;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const UNKNOWN_CATEGORY: &str = "Unknown";
pub const OTHER_CATEGORY: &str = "Other";

/// Values seen in fewer than this share of rows collapse to [`OTHER_CATEGORY`]
pub const RARE_CATEGORY_THRESHOLD: f64 = 0.05;

/// Values folded into [`OTHER_CATEGORY`] per categorical column
pub type CollapsedValues = BTreeMap<String, Vec<String>>;

/// Allowed values per categorical column, frozen at training time, together
/// with the rare values that were folded into "Other" while fitting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryListDict {
    categories: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    collapsed: CollapsedValues,
}

impl CategoryListDict {
    pub fn get(&self, column: &str) -> Option<&Vec<String>> {
        self.categories.get(column)
    }

    pub fn insert(&mut self, column: &str, categories: Vec<String>) {
        self.categories.insert(column.to_string(), categories);
    }

    /// Raw values of `column` that encode as "Other"
    pub fn collapsed(&self, column: &str) -> &[String] {
        self.collapsed.get(column).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `{column}_{category}` for every category but Unknown
    pub fn dummy_columns(&self, column: &str) -> Result<Vec<String>> {
        let categories = self.require(column)?;
        Ok(categories
            .iter()
            .filter(|c| c.as_str() != UNKNOWN_CATEGORY)
            .map(|c| format!("{}_{}", column, c))
            .collect())
    }

    fn require(&self, column: &str) -> Result<&Vec<String>> {
        self.categories
            .get(column)
            .ok_or_else(|| PipelineError::UnknownCategoricalColumn(column.to_string()))
    }
}

/// Missing values read as "Unknown"; a device reported as `"0"` is a desktop browser
fn canonical_value(column: &str, value: Option<String>) -> String {
    match value {
        None => UNKNOWN_CATEGORY.to_string(),
        Some(v) if column == "device" && v == "0" => "Desktop".to_string(),
        Some(v) => v,
    }
}

#[derive(Debug, Clone)]
pub struct CategoryEncoder {
    columns: Vec<String>,
}

impl CategoryEncoder {
    pub fn new(columns: &[String]) -> Self {
        Self {
            columns: columns.to_vec(),
        }
    }

    /// Collapses values below the frequency threshold to "Other" and returns
    /// the recoded frame with the collapsed values of every column.
    ///
    /// Values are canonicalized before frequencies are counted.
    pub fn recode_rare(&self, df: &DataFrame) -> Result<(DataFrame, CollapsedValues)> {
        let mut out = df.clone();
        let mut collapsed = CollapsedValues::new();
        let height = df.height();
        if height == 0 {
            return Ok((out, collapsed));
        }

        for column in &self.columns {
            let values: Vec<String> = str_values(df, column)?
                .into_iter()
                .map(|v| canonical_value(column, v))
                .collect();

            let mut counts: HashMap<&str, usize> = HashMap::new();
            for value in &values {
                *counts.entry(value.as_str()).or_insert(0) += 1;
            }
            let mut rare: Vec<String> = counts
                .iter()
                .filter(|(_, &count)| (count as f64) / (height as f64) < RARE_CATEGORY_THRESHOLD)
                .map(|(value, _)| value.to_string())
                .collect();
            rare.sort_unstable();

            let recoded = values
                .into_iter()
                .map(|v| Some(if rare.contains(&v) { OTHER_CATEGORY.to_string() } else { v }))
                .collect();
            set_str(&mut out, column, recoded)?;

            if !rare.is_empty() {
                debug!("Collapsing {} rare values of {} to {}", rare.len(), column, OTHER_CATEGORY);
                collapsed.insert(column.clone(), rare);
            }
        }

        Ok((out, collapsed))
    }

    /// Unique values of a recoded frame in order of first appearance, plus
    /// "Unknown"
    pub fn fit(&self, df: &DataFrame, collapsed: CollapsedValues) -> Result<CategoryListDict> {
        let mut dict = CategoryListDict {
            collapsed,
            ..CategoryListDict::default()
        };
        for column in &self.columns {
            let mut categories: Vec<String> = Vec::new();
            for value in str_values(df, column)?.into_iter().flatten() {
                if !categories.contains(&value) {
                    categories.push(value);
                }
            }
            if !categories.iter().any(|c| c == UNKNOWN_CATEGORY) {
                categories.push(UNKNOWN_CATEGORY.to_string());
            }
            dict.insert(column, categories);
        }
        Ok(dict)
    }

    /// Rewrites raw values against the frozen lists: values collapsed at
    /// training become "Other", values never seen become "Unknown"
    pub fn encode_unknown(&self, df: &DataFrame, category_lists: &CategoryListDict) -> Result<DataFrame> {
        let mut out = df.clone();
        for column in &self.columns {
            let allowed = category_lists.require(column)?;
            let collapsed = category_lists.collapsed(column);
            let values = str_values(df, column)?
                .into_iter()
                .map(|v| {
                    let value = canonical_value(column, v);
                    Some(if collapsed.contains(&value) {
                        OTHER_CATEGORY.to_string()
                    } else if allowed.contains(&value) {
                        value
                    } else {
                        UNKNOWN_CATEGORY.to_string()
                    })
                })
                .collect();
            set_str(&mut out, column, values)?;
        }
        Ok(out)
    }

    /// Indicator columns for one categorical column, in category-list order
    pub fn dummy_encode(&self, df: &DataFrame, column: &str, category_lists: &CategoryListDict) -> Result<Vec<Series>> {
        let categories = category_lists.require(column)?;
        let values = str_values(df, column)?;

        Ok(categories
            .iter()
            .filter(|c| c.as_str() != UNKNOWN_CATEGORY)
            .map(|category| {
                let indicator: Vec<f64> = values
                    .iter()
                    .map(|v| if v.as_deref() == Some(category.as_str()) { 1.0 } else { 0.0 })
                    .collect();
                Series::new(format!("{}_{}", column, category).into(), indicator)
            })
            .collect())
    }

    /// Replaces every categorical column with its dummies; returns the frame and
    /// the dummy column names in order
    pub fn replace_with_dummies(
        &self,
        df: &DataFrame,
        category_lists: &CategoryListDict,
    ) -> Result<(DataFrame, Vec<String>)> {
        let mut out = df.clone();
        let mut dummy_columns = Vec::new();

        for column in &self.columns {
            if !has_column(df, column) {
                return Err(PipelineError::MissingColumn(column.clone()));
            }
            for dummy in self.dummy_encode(df, column, category_lists)? {
                dummy_columns.push(dummy.name().to_string());
                out.with_column(dummy)?;
            }
        }
        drop_columns(&mut out, &self.columns)?;

        Ok((out, dummy_columns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::{column_names, f64_values};
    use polars::df;

    fn encoder() -> CategoryEncoder {
        CategoryEncoder::new(&["device".to_string()])
    }

    fn devices(values: &[&str]) -> DataFrame {
        df! { "device" => values }.unwrap()
    }

    #[test]
    fn test_fit_keeps_first_appearance_order() {
        let df = devices(&["Mobile", "Desktop", "Mobile", "Tablet"]);
        let dict = encoder().fit(&df, CollapsedValues::new()).unwrap();
        assert_eq!(
            dict.get("device").unwrap(),
            &vec!["Mobile", "Desktop", "Tablet", "Unknown"]
        );
    }

    #[test]
    fn test_rare_values_never_get_their_own_dummy() {
        let mut values = vec!["Desktop"; 30];
        values.extend(vec!["Mobile"; 19]);
        values.push("Console");
        values.push("0");
        let df = devices(&values);

        let (recoded, collapsed) = encoder().recode_rare(&df).unwrap();
        assert_eq!(collapsed.get("device").unwrap(), &vec!["Console"]);
        let dict = encoder().fit(&recoded, collapsed).unwrap();
        assert_eq!(dict.get("device").unwrap(), &vec!["Desktop", "Mobile", "Other", "Unknown"]);

        let (encoded, dummies) = encoder().replace_with_dummies(&recoded, &dict).unwrap();
        assert_eq!(dummies, vec!["device_Desktop", "device_Mobile", "device_Other"]);
        assert!(!column_names(&encoded).contains(&"device".to_string()));
        assert!(!dummies.contains(&"device_Console".to_string()));
        assert_eq!(f64_values(&encoded, "device_Desktop").unwrap()[50], 1.0);
    }

    #[test]
    fn test_unknown_encoding_is_idempotent() {
        let train = devices(&["Desktop", "Mobile"]);
        let dict = encoder().fit(&train, CollapsedValues::new()).unwrap();

        let scoring = devices(&["Desktop", "Smartwatch"]);
        let once = encoder().encode_unknown(&scoring, &dict).unwrap();
        let twice = encoder().encode_unknown(&once, &dict).unwrap();
        assert!(once.equals(&twice));

        let (encoded, _) = encoder().replace_with_dummies(&twice, &dict).unwrap();
        assert_eq!(f64_values(&encoded, "device_Desktop").unwrap(), vec![1.0, 0.0]);
        assert_eq!(f64_values(&encoded, "device_Mobile").unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_scoring_maps_collapsed_and_zero_devices_like_training() {
        let mut values = vec!["Desktop"; 25];
        values.extend(vec!["Mobile"; 25]);
        values.push("Console");
        let (recoded, collapsed) = encoder().recode_rare(&devices(&values)).unwrap();
        let dict = encoder().fit(&recoded, collapsed).unwrap();

        let scoring = devices(&["Console", "0", "Smartwatch"]);
        let encoded = encoder().encode_unknown(&scoring, &dict).unwrap();
        let encoded: Vec<Option<String>> = str_values(&encoded, "device").unwrap();
        assert_eq!(
            encoded,
            vec![
                Some("Other".to_string()),
                Some("Desktop".to_string()),
                Some("Unknown".to_string())
            ]
        );
    }

    #[test]
    fn test_collapsed_values_survive_serialization() {
        let mut values = vec!["Desktop"; 20];
        values.push("Console");
        let (recoded, collapsed) = encoder().recode_rare(&devices(&values)).unwrap();
        let dict = encoder().fit(&recoded, collapsed).unwrap();
        let parsed: CategoryListDict = serde_json::from_str(&serde_json::to_string(&dict).unwrap()).unwrap();
        assert_eq!(parsed.collapsed("device"), &["Console".to_string()]);
        assert_eq!(parsed, dict);
    }

    #[test]
    fn test_dummies_independent_of_row_order() {
        let dict = encoder()
            .fit(&devices(&["Desktop", "Mobile", "Tablet"]), CollapsedValues::new())
            .unwrap();
        let a = encoder().dummy_encode(&devices(&["Tablet", "Desktop"]), "device", &dict).unwrap();
        let b = encoder().dummy_encode(&devices(&["Desktop", "Tablet"]), "device", &dict).unwrap();
        let names_a: Vec<String> = a.iter().map(|s| s.name().to_string()).collect();
        let names_b: Vec<String> = b.iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names_a, names_b);
    }

    #[test]
    fn test_encoding_column_missing_from_dict_fails() {
        let dict = CategoryListDict::default();
        let result = encoder().dummy_encode(&devices(&["Desktop"]), "device", &dict);
        assert!(matches!(result, Err(PipelineError::UnknownCategoricalColumn(_))));
    }
}
