//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::{NewLogRecord, StorageResult, EMPTY_METADATA};

// ============================================
// INGEST DTOs
// ============================================

/// One log event as sent by a producer (Winston HTTP transport shape)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomingLog {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Arbitrary structured metadata
    #[serde(default)]
    pub meta: Option<Map<String, Value>>,
    /// RFC 3339 timestamp; missing or unparseable means "now"
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl IncomingLog {
    /// Normalize into a record ready for the store
    pub fn into_new_record(self) -> StorageResult<NewLogRecord> {
        let metadata = match self.meta {
            Some(meta) if !meta.is_empty() => serde_json::to_string(&meta)?,
            _ => EMPTY_METADATA.to_string(),
        };

        let mut record =
            NewLogRecord::with_timestamp(parse_timestamp(self.timestamp.as_deref())).metadata(metadata);
        record.level = self.level;
        record.message = self.message;
        Ok(record)
    }
}

/// Parse a producer timestamp, falling back to the current time
pub fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    match raw {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                tracing::warn!(timestamp = %raw, error = %e, "Could not parse timestamp, using current time");
                Utc::now()
            }
        },
        None => Utc::now(),
    }
}

/// Ingest response
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub message: String,
    /// Events found in the payload
    pub received_count: usize,
    /// Events stored and handed to the live stream
    pub processed_count: usize,
}

// ============================================
// READ DTOs
// ============================================

/// Query string of the recent-records endpoint
#[derive(Debug, Default, Deserialize)]
pub struct RecentQuery {
    /// Kept as text so that a bad value maps to a validation error
    pub limit: Option<String>,
}

/// Total record count
#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

/// Clear confirmation
#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health status
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// "ok" or "error"
    pub storage: String,
    /// Live stream subscribers currently registered
    pub subscribers: usize,
    pub uptime_seconds: u64,
    pub version: String,
}
