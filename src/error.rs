use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Column '{0}' has no category list; generate the category lists before dummy encoding")]
    UnknownCategoricalColumn(String),

    #[error("No '{kind}' artifact found in {directory}")]
    ArtifactMissing { kind: String, directory: String },

    #[error(
        "Unaligned model file dates: category_lists {category_lists}, scaler {scaler}, model {model}, variable_importances {variable_importances}"
    )]
    BundleMismatch {
        category_lists: String,
        scaler: String,
        model: String,
        variable_importances: String,
    },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
