use super::traits::ConfigSection;
use crate::error::Result;
use crate::ml::features::NormalizationPolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub normalization: NormalizationPolicy,
    /// Join rolling checkout / payment step counts from `commerce.csv`
    pub commerce_features: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            normalization: NormalizationPolicy::default(),
            commerce_features: false,
        }
    }
}

impl ConfigSection for FeaturesConfig {
    fn section_name() -> &'static str {
        "features"
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_replaces_raw_columns() {
        let config: FeaturesConfig = toml::from_str("commerce_features = true").unwrap();
        assert_eq!(config.normalization, NormalizationPolicy::Replace);
        assert_eq!(config.normalization, FeaturesConfig::default().normalization);
        assert!(config.commerce_features);
    }
}
