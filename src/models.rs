use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::validation::ValidObservation;

/// One GPS observation for one shipment at one instant, as persisted.
///
/// `(shipment_id, timestamp)` is unique across the store. A record is written
/// once and never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub shipment_id: String,
    /// Observation time in UTC epoch milliseconds; the sort key.
    pub timestamp: i64,
    pub record_id: String,
    pub order_id: String,
    pub logistic_id: String,
    pub plate_number: String,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: f64,
    pub heading: f64,
    /// Server time of the insert, distinct from `timestamp`.
    pub created_at: DateTime<Utc>,
    pub is_first_location: bool,
}

impl LocationRecord {
    /// Builds a record for insertion with a fresh `record_id`.
    ///
    /// `is_first_location` starts out `true`; a record that reaches the store
    /// is by construction the first at its key.
    pub fn new(observation: ValidObservation) -> Self {
        Self {
            shipment_id: observation.shipment_id,
            timestamp: observation.timestamp,
            record_id: Uuid::new_v4().to_string(),
            order_id: observation.order_id,
            logistic_id: observation.logistic_id,
            plate_number: observation.plate_number,
            latitude: observation.latitude,
            longitude: observation.longitude,
            speed_kmh: observation.speed_kmh,
            heading: observation.heading,
            created_at: Utc::now(),
            is_first_location: true,
        }
    }
}

/// A column value as it sits in the store, before any coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Null,
}

/// The subset of a record read back by the window query.
///
/// `record_id`, `created_at` and `is_first_location` are never loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationProjection {
    pub order_id: Option<String>,
    pub logistic_id: Option<String>,
    pub plate_number: Option<String>,
    pub timestamp: StoredValue,
    pub latitude: StoredValue,
    pub longitude: StoredValue,
    pub speed_kmh: StoredValue,
    pub heading: StoredValue,
}

/// A record read back by its key.
///
/// Decoded column by column without assuming this service wrote the row, so a
/// single malformed column never hides the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub shipment_id: String,
    pub record_id: Option<String>,
    pub created_at: Option<String>,
    pub is_first_location: StoredValue,
    pub location: LocationProjection,
}

/// A numeric response field. Values that cannot be read as a number are
/// passed through as their raw text instead of failing the read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NumericField {
    Integer(i64),
    Number(f64),
    Raw(String),
}

impl NumericField {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NumericField::Integer(i) => Some(*i as f64),
            NumericField::Number(n) => Some(*n),
            NumericField::Raw(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NumericField::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPoint {
    pub timestamp: NumericField,
    pub latitude: NumericField,
    pub longitude: NumericField,
    pub speed_kmh: NumericField,
    pub heading: NumericField,
}

/// Retrieval response: shipment metadata plus its most recent locations,
/// oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentView {
    pub order_id: String,
    pub logistic_id: String,
    pub shipment_id: String,
    pub plate_number: String,
    pub locations: Vec<LocationPoint>,
}

/// Outcome of a successful ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReceipt {
    pub record_id: String,
    pub is_first_location: bool,
}
