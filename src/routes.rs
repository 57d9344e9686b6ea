//! HTTP handlers for the ingest and retrieval paths.
//!
//! ## Endpoints
//!
//! - POST /locations - Record one location observation
//! - GET /shipments/:shipment_id - Most recent locations, oldest first
//! - OPTIONS on both paths - CORS preflight, answered by the CORS layer

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, PathRejection},
        Path, State,
    },
    routing::{get, post},
    Router,
};

use crate::error::TrackingError;
use crate::ingest::LocationIngest;
use crate::response::{ApiResponse, Endpoint};
use crate::retrieval::ShipmentRetrieval;
use crate::server::with_route_middleware;
use crate::storage::LocationStore;
use crate::validation::Observation;

/// Handler state: both components, sharing one store handle.
#[derive(Clone)]
pub struct AppState {
    pub ingest: LocationIngest,
    pub retrieval: ShipmentRetrieval,
}

impl AppState {
    pub fn new(store: Arc<dyn LocationStore>, max_locations: i64) -> Self {
        Self {
            ingest: LocationIngest::new(Arc::clone(&store)),
            retrieval: ShipmentRetrieval::new(store, max_locations),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let ingest = Router::new().route("/locations", post(insert_location));
    let retrieve = Router::new()
        .route("/shipments", get(missing_shipment_id))
        .route("/shipments/", get(missing_shipment_id))
        .route("/shipments/:shipment_id", get(get_shipment));

    with_route_middleware(ingest, Endpoint::Ingest)
        .merge(with_route_middleware(retrieve, Endpoint::Retrieve))
        .with_state(state)
}

/// Extracts an observation from a raw request body.
pub fn parse_body(body: &[u8]) -> Result<Observation, TrackingError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(TrackingError::MalformedInput("No body provided".to_string()));
    }
    serde_json::from_slice(body).map_err(|e| TrackingError::MalformedInput(e.to_string()))
}

pub async fn insert_location(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResponse {
    let observation = body
        .map_err(|rejection| TrackingError::MalformedInput(rejection.body_text()))
        .and_then(|body| parse_body(&body));
    let observation = match observation {
        Ok(observation) => observation,
        Err(e) => return ApiResponse::from_error(&e, Endpoint::Ingest),
    };

    match state.ingest.ingest(&observation).await {
        Ok(receipt) => ApiResponse::created(&receipt),
        Err(e) => ApiResponse::from_error(&e, Endpoint::Ingest),
    }
}

pub async fn get_shipment(
    State(state): State<AppState>,
    shipment_id: Result<Path<String>, PathRejection>,
) -> ApiResponse {
    let Path(shipment_id) = match shipment_id {
        Ok(path) => path,
        Err(rejection) => {
            let err = TrackingError::InvalidShipmentId(rejection.body_text());
            return ApiResponse::from_error(&err, Endpoint::Retrieve);
        }
    };

    match state.retrieval.retrieve(&shipment_id).await {
        Ok(view) => ApiResponse::shipment(&view),
        Err(e) => ApiResponse::from_error(&e, Endpoint::Retrieve),
    }
}

pub async fn missing_shipment_id(State(state): State<AppState>) -> ApiResponse {
    get_shipment(State(state), Ok(Path(String::new()))).await
}
