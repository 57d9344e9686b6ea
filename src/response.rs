//! Maps component results onto HTTP status codes and JSON bodies.
//!
//! CORS headers are not set here; the per-route layers in
//! [`crate::server::with_route_middleware`] add them to every response.

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::error;

use crate::error::TrackingError;
use crate::models::{IngestReceipt, ShipmentView};

/// The two public surfaces of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Ingest,
    Retrieve,
}

impl Endpoint {
    pub fn methods(self) -> [Method; 2] {
        match self {
            Endpoint::Ingest => [Method::POST, Method::OPTIONS],
            Endpoint::Retrieve => [Method::GET, Method::OPTIONS],
        }
    }

    /// `Access-Control-Allow-Methods` value advertised on every response.
    pub fn allow_methods(self) -> &'static str {
        match self {
            Endpoint::Ingest => "POST, OPTIONS",
            Endpoint::Retrieve => "GET, OPTIONS",
        }
    }

    fn storage_failure(self) -> &'static str {
        match self {
            Endpoint::Ingest => "Database failed",
            Endpoint::Retrieve => "Database operation failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    pub fn created(receipt: &IngestReceipt) -> Self {
        Self::new(
            StatusCode::CREATED,
            json!({
                "message": "Location added successfully",
                "recordId": receipt.record_id,
                "isNewShipment": receipt.is_first_location,
            }),
        )
    }

    pub fn shipment(view: &ShipmentView) -> Self {
        match serde_json::to_value(view) {
            Ok(body) => Self::new(StatusCode::OK, body),
            Err(e) => Self::internal(e.to_string()),
        }
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "Internal server error", "details": details.into() }),
        )
    }

    pub fn from_error(err: &TrackingError, endpoint: Endpoint) -> Self {
        let (status, body) = match err {
            TrackingError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Validation failed", "details": details }),
            ),
            TrackingError::Duplicate { existing_record_id } => (
                StatusCode::CONFLICT,
                json!({
                    "error": "Duplicate location update",
                    "message": "Location already exists for this shipment and timestamp",
                    "existingRecordId": existing_record_id,
                }),
            ),
            TrackingError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Missing shipmentId", "message": message }),
            ),
            TrackingError::InvalidShipmentId(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid shipmentId", "message": message }),
            ),
            TrackingError::NotFound(shipment_id) => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": "Shipment not found",
                    "message": format!("No locations found for shipmentId: {shipment_id}"),
                }),
            ),
            TrackingError::Storage(e) => {
                error!(error = %e, "Storage operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": endpoint.storage_failure(), "details": e.to_string() }),
                )
            }
            TrackingError::MalformedInput(details) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid JSON", "details": details }),
            ),
            TrackingError::Internal(details) => {
                error!(details = %details, "Unclassified failure");
                return Self::internal(details.clone());
            }
        };

        Self::new(status, body)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
