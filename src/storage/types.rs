//! Core data types for the Sublog log store
//!
//! - `LogRecord`: a persisted log event, also the wire format pushed to viewers
//! - `NewLogRecord`: a log event that has been validated but not yet stored

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved record id announcing that all stored history was erased
pub const CLEARED_RECORD_ID: i64 = -1;

/// Metadata text stored when an event carries no metadata
pub const EMPTY_METADATA: &str = "{}";

/// A persisted log event
///
/// Immutable once constructed. Serialized as-is for the recent-records
/// endpoint and for every live stream frame; optional fields serialize
/// as `null` rather than being omitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    /// Store-assigned id, or [`CLEARED_RECORD_ID`] for the clear sentinel
    pub id: i64,
    /// When the event happened (UTC)
    pub timestamp: DateTime<Utc>,
    /// Severity as sent by the producer (`info`, `warn`, ...)
    pub level: Option<String>,
    /// Human readable message
    pub message: Option<String>,
    /// Producer metadata, kept as JSON text
    pub metadata: Option<String>,
}

impl LogRecord {
    /// The sentinel pushed to viewers after the store has been cleared
    pub fn cleared() -> Self {
        Self {
            id: CLEARED_RECORD_ID,
            timestamp: Utc::now(),
            level: None,
            message: None,
            metadata: None,
        }
    }

    /// True for the clear sentinel
    pub fn is_cleared(&self) -> bool {
        self.id == CLEARED_RECORD_ID
    }
}

/// A log event ready to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewLogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Option<String>,
    pub message: Option<String>,
    /// JSON text, [`EMPTY_METADATA`] when the producer sent none
    pub metadata: String,
}

impl NewLogRecord {
    /// Create an empty event stamped with the current time
    pub fn new() -> Self {
        Self::with_timestamp(Utc::now())
    }

    /// Create an empty event with a specific timestamp
    pub fn with_timestamp(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            level: None,
            message: None,
            metadata: EMPTY_METADATA.to_string(),
        }
    }

    /// Builder method: set the level
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Builder method: set the message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Builder method: set the metadata JSON text
    pub fn metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Attach the store-assigned id
    pub fn into_record(self, id: i64) -> LogRecord {
        LogRecord {
            id,
            timestamp: self.timestamp,
            level: self.level,
            message: self.message,
            metadata: Some(self.metadata),
        }
    }
}

impl Default for NewLogRecord {
    fn default() -> Self {
        Self::new()
    }
}
