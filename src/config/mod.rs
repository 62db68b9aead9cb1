pub mod artifacts;
pub mod data;
pub mod features;
pub mod manager;
pub mod prediction;
pub mod training;
pub mod traits;

pub use artifacts::ArtifactsConfig;
pub use data::DataConfig;
pub use features::FeaturesConfig;
pub use manager::{AppConfig, ConfigManager};
pub use prediction::PredictionConfig;
pub use training::TrainingConfig;
pub use traits::ConfigSection;
