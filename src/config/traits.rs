use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// One named table of the application configuration
pub trait ConfigSection: Serialize + DeserializeOwned + Default + Clone {
    fn section_name() -> &'static str;
    fn validate(&self) -> Result<()>;
}
