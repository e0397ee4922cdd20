//! Log Routes
//!
//! - POST /logs - Ingest one event or an array of events
//! - GET /logs/recent - Most recent records, newest first
//! - GET /logs/count - Total stored records
//! - DELETE /logs/all - Erase history and notify live viewers

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{ClearResponse, CountResponse, IncomingLog, IngestResponse, RecentQuery};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::storage::LogRecord;

/// Records returned when no limit is given
pub const DEFAULT_RECENT_LIMIT: u32 = 100;

/// Largest accepted `limit`
pub const MAX_RECENT_LIMIT: u32 = 1000;

/// POST /logs
///
/// Accepts a single JSON object or an array of objects. Each event is
/// stored and then handed to the hub; an event the store rejects is
/// logged and skipped without failing the rest of the batch.
pub async fn ingest_logs(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    let logs = parse_payload(&body)?;
    let received_count = logs.len();
    let mut processed_count = 0;

    for log in logs {
        let record = match log.into_new_record() {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping log entry");
                continue;
            }
        };

        let stored = match state.store.insert(record).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(error = %e, "Error adding log entry");
                continue;
            }
        };

        if let Err(e) = state.hub.broadcast(stored).await {
            tracing::warn!(error = %e, "Stored log entry was not broadcast");
        }
        processed_count += 1;
    }

    tracing::debug!(received_count, processed_count, "Logs ingested");

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            message: "Logs received".to_string(),
            received_count,
            processed_count,
        }),
    ))
}

/// GET /logs/recent?limit=N
pub async fn recent_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentQuery>,
) -> ApiResult<Json<Vec<LogRecord>>> {
    let limit = parse_limit(query.limit.as_deref())?;
    let records = state.store.recent(limit).await?;
    Ok(Json(records))
}

/// GET /logs/count
pub async fn log_count(State(state): State<Arc<AppState>>) -> ApiResult<Json<CountResponse>> {
    let count = state.store.count().await?;
    Ok(Json(CountResponse { count }))
}

/// DELETE /logs/all
///
/// Viewers receive the clear sentinel (id -1) once the store is empty.
pub async fn clear_logs(State(state): State<Arc<AppState>>) -> ApiResult<Json<ClearResponse>> {
    let removed = state.store.clear().await?;
    tracing::info!(removed, "All logs deleted");

    if let Err(e) = state.hub.broadcast(LogRecord::cleared()).await {
        tracing::warn!(error = %e, "Clear notification was not broadcast");
    }

    Ok(Json(ClearResponse {
        success: true,
        message: "All logs deleted".to_string(),
    }))
}

/// Decode an ingest body into events
///
/// The first non-whitespace byte decides the shape: `[` for a batch,
/// `{` for a single event. An empty batch is rejected.
fn parse_payload(body: &[u8]) -> ApiResult<Vec<IncomingLog>> {
    let first = body
        .iter()
        .copied()
        .find(|b| !b.is_ascii_whitespace())
        .ok_or_else(|| ApiError::Validation("Empty request body".to_string()))?;

    let logs = match first {
        b'[' => serde_json::from_slice::<Vec<IncomingLog>>(body)
            .map_err(|e| ApiError::Validation(format!("Invalid JSON array format: {}", e)))?,
        b'{' => {
            let log = serde_json::from_slice::<IncomingLog>(body)
                .map_err(|e| ApiError::Validation(format!("Invalid JSON object format: {}", e)))?;
            vec![log]
        }
        other => {
            return Err(ApiError::Validation(format!(
                "Invalid JSON format, expected object or array but got '{}'",
                char::from(other)
            )))
        }
    };

    if logs.is_empty() {
        return Err(ApiError::Validation("No logs found in request".to_string()));
    }

    Ok(logs)
}

/// Validate the `limit` query parameter
fn parse_limit(raw: Option<&str>) -> ApiResult<u32> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(DEFAULT_RECENT_LIMIT),
        Some(raw) => raw,
    };

    let value: i64 = raw
        .parse()
        .map_err(|_| ApiError::Validation(format!("Invalid limit parameter: {}", raw)))?;

    if !(1..=MAX_RECENT_LIMIT as i64).contains(&value) {
        return Err(ApiError::Validation(format!(
            "Limit must be between 1 and {}, got {}",
            MAX_RECENT_LIMIT, value
        )));
    }

    Ok(value as u32)
}
