pub mod config;
pub mod cookies;
pub mod dispatcher;
pub mod ingest;
pub mod schemas;

pub use config::{CrawlConfig, LiveConfig};
pub use cookies::write_cookies;
pub use dispatcher::{
    chunk_ranges, BackendKind, DispatchConfig, DispatchSummary, Dispatcher, ItemError,
    SinkSettings, WorkerReport,
};
pub use ingest::{IngestClient, SinkError};
pub use schemas::{RegistryError, Schema};
