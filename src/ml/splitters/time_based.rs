use super::base::DataSplitter;
use super::types::{SplitConfig, SplitIndices, SplitKind};
use crate::error::{PipelineError, Result};
use crate::ml::features::FeatureFrame;
use chrono::{Duration, NaiveDate};
use log::info;

/// Date-ordered split over the calendar days of the requested range: the
/// earliest `ratio` share of those days is train, whether or not any rows
/// fall on them
pub struct TimeBasedSplitter {
    config: SplitConfig,
    min_date: NaiveDate,
    max_date: NaiveDate,
}

impl TimeBasedSplitter {
    pub fn new(ratio: f64, min_date: NaiveDate, max_date: NaiveDate) -> Self {
        Self {
            config: SplitConfig {
                kind: SplitKind::TimeBased,
                ratio,
                ..SplitConfig::default()
            },
            min_date,
            max_date,
        }
    }

    /// Last train day; the day count rounds half to even
    pub fn cutoff(&self) -> Result<NaiveDate> {
        if self.min_date > self.max_date {
            return Err(PipelineError::Validation(format!(
                "Split range starts {} after it ends {}",
                self.min_date, self.max_date
            )));
        }
        let days = (self.max_date - self.min_date).num_days() + 1;
        let train_days = ((days as f64 * self.config.ratio).round_ties_even() as i64).clamp(1, days);
        Ok(self.min_date + Duration::days(train_days - 1))
    }
}

impl DataSplitter for TimeBasedSplitter {
    fn split(&self, frame: &FeatureFrame) -> Result<SplitIndices> {
        super::validate_ratio(self.config.ratio)?;
        if frame.height() == 0 {
            return Err(PipelineError::Validation(
                "Cannot split an empty feature frame".to_string(),
            ));
        }

        let cutoff = self.cutoff()?;
        info!("  * Time based split cutoff date: {}", cutoff);

        let dates = frame.dates()?;
        let (train, test): (Vec<usize>, Vec<usize>) = (0..dates.len()).partition(|&row| dates[row] <= cutoff);
        Ok(SplitIndices { train, test })
    }

    fn config(&self) -> &SplitConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::features::FeatureColumns;
    use crate::types::parse_date;
    use polars::prelude::*;

    fn frame(dates: &[&str]) -> FeatureFrame {
        FeatureFrame {
            data: DataFrame::new(vec![Column::new("date".into(), dates)]).unwrap(),
            columns: FeatureColumns::default(),
        }
    }

    fn splitter(ratio: f64, min: &str, max: &str) -> TimeBasedSplitter {
        TimeBasedSplitter::new(ratio, parse_date(min).unwrap(), parse_date(max).unwrap())
    }

    #[test]
    fn test_train_dates_never_follow_test_dates() {
        let frame = frame(&[
            "2024-01-03", "2024-01-01", "2024-01-05", "2024-01-02", "2024-01-04", "2024-01-01",
        ]);
        let split = splitter(0.6, "2024-01-01", "2024-01-05").split(&frame).unwrap();
        let dates = frame.dates().unwrap();

        let latest_train = split.train.iter().map(|&i| dates[i]).max().unwrap();
        let earliest_test = split.test.iter().map(|&i| dates[i]).min().unwrap();
        assert!(latest_train < earliest_test);
        assert_eq!(split.train, vec![0, 1, 3, 5]);
        assert_eq!(split.test, vec![2, 4]);
    }

    #[test]
    fn test_cutoff_counts_calendar_days_not_rows() {
        let frame = frame(&["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-10"]);
        let splitter = splitter(0.6, "2024-01-01", "2024-01-10");
        assert_eq!(splitter.cutoff().unwrap(), parse_date("2024-01-06").unwrap());

        let split = splitter.split(&frame).unwrap();
        assert_eq!(split.train, vec![0, 1, 2]);
        assert_eq!(split.test, vec![3]);
    }

    #[test]
    fn test_half_day_rounds_to_even() {
        // 5 days * 0.5 = 2.5 days of training
        let cutoff = splitter(0.5, "2024-01-01", "2024-01-05").cutoff().unwrap();
        assert_eq!(cutoff, parse_date("2024-01-02").unwrap());
        // 7 days * 0.5 = 3.5 days of training
        let cutoff = splitter(0.5, "2024-01-01", "2024-01-07").cutoff().unwrap();
        assert_eq!(cutoff, parse_date("2024-01-04").unwrap());
    }

    #[test]
    fn test_full_ratio_leaves_empty_test_set() {
        let split = splitter(1.0, "2024-01-01", "2024-01-02")
            .split(&frame(&["2024-01-01", "2024-01-02"]))
            .unwrap();
        assert_eq!(split.train.len(), 2);
        assert!(split.test.is_empty());
    }

    #[test]
    fn test_invalid_ratio_is_configuration_error() {
        let result = splitter(0.0, "2024-01-01", "2024-01-01").split(&frame(&["2024-01-01"]));
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }
}
