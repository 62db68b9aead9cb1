use crate::data::frame::{f64_values, str_values};
use crate::error::{PipelineError, Result};
use crate::ml::features::{CategoryListDict, MinMaxScaler};
use crate::ml::models::{TrainedModel, VariableImportances};
use crate::types::{format_date, parse_date};
use chrono::NaiveDate;
use log::{info, warn};
use polars::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// The four files of one model generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    CategoryLists,
    Scaler,
    Model,
    VariableImportances,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::CategoryLists,
        ArtifactKind::Scaler,
        ArtifactKind::Model,
        ArtifactKind::VariableImportances,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::CategoryLists => "category_lists",
            Self::Scaler => "scaler",
            Self::Model => "model",
            Self::VariableImportances => "variable_importances",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::VariableImportances => "csv",
            _ => "json",
        }
    }

    pub fn file_name(&self, date: NaiveDate) -> String {
        format!("{}_{}.{}", self.prefix(), format_date(date), self.extension())
    }

    /// Date embedded in a file name of this kind
    fn parse_file_name(&self, file_name: &str) -> Option<NaiveDate> {
        let stem = file_name
            .strip_prefix(self.prefix())?
            .strip_prefix('_')?
            .strip_suffix(self.extension())?
            .strip_suffix('.')?;
        if stem.len() != 10 {
            return None;
        }
        parse_date(stem).ok()
    }
}

/// Everything needed to score with one trained model
#[derive(Debug, Clone)]
pub struct ModelArtifactBundle<C> {
    pub model_date: NaiveDate,
    pub category_lists: CategoryListDict,
    pub scaler: MinMaxScaler,
    pub model: TrainedModel<C>,
    pub variable_importances: VariableImportances,
}

/// Sole reader and writer of model generations in one directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    directory: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self, kind: ArtifactKind, date: NaiveDate) -> PathBuf {
        self.directory.join(kind.file_name(date))
    }

    /// Kinds already stored for `date`
    pub fn existing_kinds(&self, date: NaiveDate) -> Vec<ArtifactKind> {
        ArtifactKind::ALL
            .into_iter()
            .filter(|kind| self.path(*kind, date).is_file())
            .collect()
    }

    /// Fails when a generation for `date` exists and may not be replaced
    pub fn ensure_writable(&self, date: NaiveDate, overwrite: bool) -> Result<()> {
        let existing = self.existing_kinds(date);
        if overwrite || existing.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = existing.iter().map(|kind| kind.prefix()).collect();
        Err(PipelineError::Configuration(format!(
            "Model files dated {} already exist in {} ({}) and overwrite_files is off",
            date,
            self.directory.display(),
            names.join(", ")
        )))
    }

    /// Writes all four files of a generation. An existing generation for the
    /// same date is replaced only when `overwrite` is set.
    pub fn save<C: Serialize>(&self, bundle: &ModelArtifactBundle<C>, overwrite: bool) -> Result<()> {
        let date = bundle.model_date;
        self.ensure_writable(date, overwrite)?;
        self.remove_generation(date)?;
        fs::create_dir_all(&self.directory)?;

        serde_json::to_writer(
            File::create(self.path(ArtifactKind::CategoryLists, date))?,
            &bundle.category_lists,
        )?;
        serde_json::to_writer(File::create(self.path(ArtifactKind::Scaler, date))?, &bundle.scaler)?;
        serde_json::to_writer(File::create(self.path(ArtifactKind::Model, date))?, &bundle.model)?;
        self.write_importances(&bundle.variable_importances, date)?;

        info!("  * Saved model artifacts for {} to {}", date, self.directory.display());
        Ok(())
    }

    fn write_importances(&self, importances: &VariableImportances, date: NaiveDate) -> Result<()> {
        let (columns, values): (Vec<String>, Vec<f64>) = importances.0.iter().cloned().unzip();
        let mut df = DataFrame::new(vec![
            Column::new("column".into(), columns),
            Column::new("importance".into(), values),
        ])?;
        let mut file = File::create(self.path(ArtifactKind::VariableImportances, date))?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        Ok(())
    }

    fn read_importances(&self, date: NaiveDate) -> Result<VariableImportances> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(self.path(ArtifactKind::VariableImportances, date)))?
            .finish()?;
        if df.height() == 0 {
            return Ok(VariableImportances::default());
        }

        let columns = str_values(&df, "column")?;
        let values = f64_values(&df, "importance")?;
        Ok(VariableImportances(
            columns
                .into_iter()
                .zip(values)
                .filter_map(|(c, v)| c.map(|c| (c, v)))
                .collect(),
        ))
    }

    /// Dates of every stored file of one kind, ascending
    pub fn available_dates(&self, kind: ArtifactKind) -> Result<Vec<NaiveDate>> {
        if !self.directory.is_dir() {
            return Ok(Vec::new());
        }
        let mut dates = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if let Some(date) = entry.file_name().to_str().and_then(|n| kind.parse_file_name(n)) {
                dates.push(date);
            }
        }
        dates.sort_unstable();
        Ok(dates)
    }

    /// Stored date of `kind` closest to `as_of`; equal distances resolve to the earlier date
    pub fn resolve(&self, kind: ArtifactKind, as_of: NaiveDate) -> Result<NaiveDate> {
        self.available_dates(kind)?
            .into_iter()
            .min_by_key(|date| (date.signed_duration_since(as_of).num_days().abs(), *date))
            .ok_or_else(|| PipelineError::ArtifactMissing {
                kind: kind.prefix().to_string(),
                directory: self.directory.display().to_string(),
            })
    }

    /// Loads the generation closest to `as_of`. All four kinds must resolve to
    /// the same date.
    pub fn load<C: DeserializeOwned>(&self, as_of: NaiveDate) -> Result<ModelArtifactBundle<C>> {
        let category_lists_date = self.resolve(ArtifactKind::CategoryLists, as_of)?;
        let scaler_date = self.resolve(ArtifactKind::Scaler, as_of)?;
        let model_date = self.resolve(ArtifactKind::Model, as_of)?;
        let importances_date = self.resolve(ArtifactKind::VariableImportances, as_of)?;

        if [scaler_date, model_date, importances_date]
            .iter()
            .any(|d| *d != category_lists_date)
        {
            return Err(PipelineError::BundleMismatch {
                category_lists: format_date(category_lists_date),
                scaler: format_date(scaler_date),
                model: format_date(model_date),
                variable_importances: format_date(importances_date),
            });
        }

        let bundle = ModelArtifactBundle {
            model_date,
            category_lists: read_json(&self.path(ArtifactKind::CategoryLists, model_date))?,
            scaler: read_json(&self.path(ArtifactKind::Scaler, model_date))?,
            model: read_json(&self.path(ArtifactKind::Model, model_date))?,
            variable_importances: self.read_importances(model_date)?,
        };
        info!("  * Loaded model artifacts dated {} (requested {})", model_date, as_of);
        Ok(bundle)
    }

    /// Deletes every artifact of one generation; returns how many files went
    pub fn remove_generation(&self, date: NaiveDate) -> Result<usize> {
        let mut removed = 0;
        for kind in ArtifactKind::ALL {
            let path = self.path(kind, date);
            if path.is_file() {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        if removed > 0 {
            warn!("Removed {} existing artifacts dated {}", removed, date);
        }
        Ok(removed)
    }

    /// Writes an intermediate frame as `{name}.csv` in the store directory
    pub fn dump_frame(&self, name: &str, df: &DataFrame) -> Result<PathBuf> {
        fs::create_dir_all(&self.directory)?;
        let path = self.directory.join(format!("{}.csv", name));
        let mut file = File::create(&path)?;
        let mut df = df.clone();
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        Ok(path)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::models::{Classifier, ForestParams, RandomForestClassifier};
    use crate::types::Outcome;
    use polars::df;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn bundle(model_date: NaiveDate) -> ModelArtifactBundle<RandomForestClassifier> {
        let mut classifier = RandomForestClassifier::from_params(&ForestParams {
            n_estimators: 3,
            ..ForestParams::default()
        });
        classifier
            .fit(&[vec![0.0], vec![1.0], vec![2.0]], &[0, 1, 2], 3)
            .unwrap();

        let train = df! { "x" => &[0.0, 2.0] }.unwrap();
        let mut category_lists = CategoryListDict::default();
        category_lists.insert("device", vec!["Desktop".to_string(), "Unknown".to_string()]);

        ModelArtifactBundle {
            model_date,
            category_lists,
            scaler: MinMaxScaler::fit(&train, &["x".to_string()]).unwrap(),
            model: TrainedModel {
                classifier,
                feature_columns: vec!["x".to_string()],
                labels: Outcome::ALL.to_vec(),
            },
            variable_importances: VariableImportances(vec![("x".to_string(), 1.0)]),
        }
    }

    #[test]
    fn test_save_then_load_closest_generation() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&bundle(date("2024-01-10")), true).unwrap();
        store.save(&bundle(date("2024-02-10")), true).unwrap();

        let loaded: ModelArtifactBundle<RandomForestClassifier> = store.load(date("2024-01-20")).unwrap();
        assert_eq!(loaded.model_date, date("2024-01-10"));
        assert_eq!(loaded.model.feature_columns, vec!["x"]);
        assert_eq!(loaded.variable_importances.get("x"), Some(1.0));
        assert_eq!(loaded.category_lists.get("device").unwrap().len(), 2);
    }

    #[test]
    fn test_equal_distance_resolves_to_earlier_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&bundle(date("2024-01-01")), true).unwrap();
        store.save(&bundle(date("2024-01-05")), true).unwrap();
        assert_eq!(
            store.resolve(ArtifactKind::Model, date("2024-01-03")).unwrap(),
            date("2024-01-01")
        );
    }

    #[test]
    fn test_mismatched_generation_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&bundle(date("2024-01-10")), true).unwrap();
        fs::rename(
            store.path(ArtifactKind::Scaler, date("2024-01-10")),
            store.path(ArtifactKind::Scaler, date("2024-01-11")),
        )
        .unwrap();

        let result = store.load::<RandomForestClassifier>(date("2024-01-11"));
        match result {
            Err(PipelineError::BundleMismatch { scaler, model, .. }) => {
                assert_eq!(scaler, "2024-01-11");
                assert_eq!(model, "2024-01-10");
            }
            other => panic!("expected bundle mismatch, got {:?}", other.map(|b| b.model_date)),
        }
    }

    #[test]
    fn test_missing_kind_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&bundle(date("2024-01-10")), true).unwrap();
        fs::remove_file(store.path(ArtifactKind::VariableImportances, date("2024-01-10"))).unwrap();

        let result = store.load::<RandomForestClassifier>(date("2024-01-10"));
        assert!(matches!(result, Err(PipelineError::ArtifactMissing { .. })));
    }

    #[test]
    fn test_remove_generation() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&bundle(date("2024-01-10")), true).unwrap();
        assert_eq!(store.remove_generation(date("2024-01-10")).unwrap(), 4);
        assert!(store.available_dates(ArtifactKind::Model).unwrap().is_empty());
    }

    #[test]
    fn test_existing_generation_needs_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let model_date = date("2024-01-10");
        store.save(&bundle(model_date), false).unwrap();

        let mut retrained = bundle(model_date);
        retrained.variable_importances = VariableImportances(vec![("x".to_string(), 0.5)]);

        let refused = store.save(&retrained, false);
        assert!(matches!(refused, Err(PipelineError::Configuration(_))));
        let kept: ModelArtifactBundle<RandomForestClassifier> = store.load(model_date).unwrap();
        assert_eq!(kept.variable_importances.get("x"), Some(1.0));

        store.save(&retrained, true).unwrap();
        let replaced: ModelArtifactBundle<RandomForestClassifier> = store.load(model_date).unwrap();
        assert_eq!(replaced.variable_importances.get("x"), Some(0.5));
        assert_eq!(store.available_dates(ArtifactKind::Model).unwrap(), vec![model_date]);
    }
}
