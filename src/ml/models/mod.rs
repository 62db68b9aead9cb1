pub mod classifier;
pub mod forest;
pub mod report;
pub mod trainer;

pub use classifier::Classifier;
pub use forest::{ForestParams, MaxFeatures, RandomForestClassifier};
pub use report::{classification_metrics, LabelMetrics, OutcomeReport};
pub use trainer::{EvaluationSet, ModelTrainer, TrainedModel, TrainingOutput, VariableImportances};
