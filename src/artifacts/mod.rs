pub mod retention;
pub mod store;

pub use retention::{PipelineArtifact, RetentionCollection, RetentionMode, RetentionPolicy};
pub use store::{ArtifactKind, ArtifactStore, ModelArtifactBundle};
