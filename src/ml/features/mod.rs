pub mod aligner;
pub mod builder;
pub mod design;
pub mod encoder;
pub mod normalizer;
pub mod registry;
pub mod scaler;

pub use aligner::align;
pub use builder::{FeatureFrame, FeatureFrameBuilder};
pub use design::{design_matrix, encode_labels, feature_columns};
pub use encoder::{CategoryEncoder, CategoryListDict};
pub use normalizer::{normalize, NormalizationPolicy};
pub use registry::{ColumnGroup, ColumnGroupKind, FeatureColumns};
pub use scaler::MinMaxScaler;
