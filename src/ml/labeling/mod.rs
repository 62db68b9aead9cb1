pub mod events;

pub use events::{apply_events, detect_conversions, detect_shared_logins, LabeledEvent, LabeledFeatureSource};
