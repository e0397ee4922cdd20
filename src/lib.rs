//! # Sublog
//!
//! Structured log ingestion over HTTP with real-time fan-out to connected
//! viewers.
//!
//! ## Features
//!
//! - **Ingestion**: Winston-style JSON events, one at a time or in batches
//! - **Storage**: SQLite table of records, newest-first reads
//! - **Live stream**: every stored record pushed over WebSocket
//! - **Backpressure**: a viewer that falls behind is disconnected, never waited on
//!
//! ## Modules
//!
//! - [`storage`]: Log store and record types
//! - [`websocket`]: Broadcast hub and subscriber connections
//! - [`api`]: HTTP server with Axum
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sublog::storage::{LogStore, NewLogRecord};
//! use sublog::websocket::{Hub, HubConfig, Subscriber};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = LogStore::open_in_memory()?;
//!     let (hub, _hub_task) = Hub::spawn(HubConfig::default());
//!
//!     // A viewer joins
//!     let (subscriber, mut queue) = Subscriber::new(None, hub.queue_capacity());
//!     hub.register(subscriber).await?;
//!
//!     // Persist first, then fan out
//!     let record = store.insert(NewLogRecord::new().level("info").message("hello")).await?;
//!     hub.broadcast(record).await?;
//!
//!     let pushed = queue.next().await.expect("record delivered");
//!     println!("viewer got record {}", pushed.id);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod logging;
pub mod storage;
pub mod websocket;

pub use storage::{LogRecord, LogStore, NewLogRecord, StorageError, StorageResult};

pub use api::{build_router, serve, ApiError, AppState};

pub use websocket::{
    websocket_handler, Hub, HubConfig, HubError, OutboundQueue, Subscriber, SubscriberId,
};

pub use config::{Config, ConfigError, ConfigOrigin, LoggingConfig, ServerConfig};
