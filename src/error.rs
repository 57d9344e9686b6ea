//! Error taxonomy shared by the ingest and retrieval paths.

use thiserror::Error;

use crate::storage::StorageError;

/// Sentinel reported when a duplicate is detected but the existing record
/// can no longer be read back.
pub const UNKNOWN_RECORD_ID: &str = "unknown";

#[derive(Debug, Error)]
pub enum TrackingError {
    /// Client-fixable input problems, all of them at once.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("duplicate location update, existing record {existing_record_id}")]
    Duplicate { existing_record_id: String },

    #[error("bad request: {0}")]
    BadRequest(String),

    /// The path segment could not be read as a shipment id.
    #[error("invalid shipment id: {0}")]
    InvalidShipmentId(String),

    #[error("no locations found for shipment {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type TrackingResult<T> = Result<T, TrackingError>;
