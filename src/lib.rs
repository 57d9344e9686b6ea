//! GPS location ingest and retrieval for shipments in transit.
//!
//! Two independent components share one [`storage::LocationStore`]:
//! [`ingest::LocationIngest`] appends observations with insert-once semantics
//! per `(shipment_id, timestamp)`, and [`retrieval::ShipmentRetrieval`]
//! returns a shipment's most recent window of locations in chronological
//! order.

pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod response;
pub mod retrieval;
pub mod routes;
pub mod server;
pub mod storage;
pub mod validation;
