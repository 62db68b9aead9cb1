pub mod connectors;
pub mod frame;
pub mod sources;

pub use connectors::{CsvConnector, CsvDataSource, NdjsonSink, SourceFile};
pub use sources::{
    CommerceEvent, ContextSource, FeatureSource, GlobalContextRecord, PageviewEvent, PageviewSource,
    PaymentHistoryRecord, PaymentHistorySource, TransactionSource, WarehouseSink,
};
