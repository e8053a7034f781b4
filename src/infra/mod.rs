//! Infrastructure layer implementations.

pub mod database;
pub mod observability;
pub mod storage;

pub use database::{PostgresClient, PostgresConfig};
pub use observability::{init_metrics, init_tracing};
pub use storage::LocalBlobStorage;
