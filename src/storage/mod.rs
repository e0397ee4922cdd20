//! Sublog Storage
//!
//! Persistence for ingested log events:
//!
//! - **types**: `LogRecord` (stored/wire form) and `NewLogRecord`
//! - **store**: `LogStore`, a SQLite table of records
//! - **error**: Error types
//!
//! The store never talks to the broadcast hub; handlers persist first and
//! hand the stored record to the hub afterwards.
//!
//! # Example
//!
//! ```rust,no_run
//! use sublog::storage::{LogStore, NewLogRecord};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = LogStore::open("./data/sublog.db")?;
//!
//!     let record = store
//!         .insert(NewLogRecord::new().level("info").message("service started"))
//!         .await?;
//!     println!("stored record {}", record.id);
//!
//!     let recent = store.recent(100).await?;
//!     println!("{} records", recent.len());
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod store;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use store::LogStore;
pub use types::{LogRecord, NewLogRecord, CLEARED_RECORD_ID, EMPTY_METADATA};
