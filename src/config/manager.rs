use super::{
    artifacts::ArtifactsConfig, data::DataConfig, features::FeaturesConfig,
    prediction::PredictionConfig, training::TrainingConfig, traits::ConfigSection,
};
use crate::error::{PipelineError, Result};
use config::{Config, ConfigBuilder, Environment, File};
use config::builder::DefaultState;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Prefix of environment overrides, e.g. `CONVERSION__DATA__MIN_DATE`
pub const ENV_PREFIX: &str = "CONVERSION";
/// Overrides `artifacts.model_dir`
pub const MODEL_DIR_ENV: &str = "PATH_TO_MODEL_FILES";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub features: FeaturesConfig,
    pub training: TrainingConfig,
    pub artifacts: ArtifactsConfig,
    pub prediction: PredictionConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        validate_section(&self.data)?;
        validate_section(&self.features)?;
        validate_section(&self.training)?;
        validate_section(&self.artifacts)?;
        validate_section(&self.prediction)?;
        Ok(())
    }
}

fn validate_section<S: ConfigSection>(section: &S) -> Result<()> {
    section.validate().map_err(|e| match e {
        PipelineError::Configuration(message) => {
            PipelineError::Configuration(format!("[{}] {}", S::section_name(), message))
        }
        other => other,
    })
}

fn layered(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig> {
    let config: AppConfig = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("artifacts.model_dir", std::env::var(MODEL_DIR_ENV).ok())?
        .build()?
        .try_deserialize()?;
    config.validate()?;
    Ok(config)
}

fn poisoned<T>(_: T) -> PipelineError {
    PipelineError::Configuration("Configuration lock poisoned".to_string())
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Defaults overlaid with a TOML or JSON file, then the environment
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PipelineError::Configuration(format!(
                "Config file {} does not exist",
                path.display()
            )));
        }
        let config = layered(Config::builder().add_source(File::from(path)))?;
        info!("Loaded configuration from {}", path.display());
        *self.config.write().map_err(poisoned)? = config;
        Ok(())
    }

    /// Defaults overlaid with the environment only
    pub fn load_from_env(&self) -> Result<()> {
        let config = layered(Config::builder())?;
        debug!("Loaded configuration from environment");
        *self.config.write().map_err(poisoned)? = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config = self.config.read().map_err(poisoned)?;
        let toml_str = toml::to_string_pretty(&*config)
            .map_err(|e| PipelineError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn get(&self) -> Result<AppConfig> {
        Ok(self.config.read().map_err(poisoned)?.clone())
    }

    /// Applies `f` and keeps the result only if it still validates
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.config.write().map_err(poisoned)?;
        let mut updated = config.clone();
        f(&mut updated);
        updated.validate()?;
        *config = updated;
        Ok(())
    }
}
