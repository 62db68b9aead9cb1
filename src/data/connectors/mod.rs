mod csv;
mod ndjson;
mod types;
mod validator;

pub use csv::{CsvConnector, CsvDataSource};
pub use ndjson::NdjsonSink;
pub use types::SourceFile;
pub use validator::DataValidator;
