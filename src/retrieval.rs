use std::sync::Arc;

use tracing::debug;

use crate::config::clamp_max_locations;
use crate::error::{TrackingError, TrackingResult};
use crate::models::{LocationPoint, NumericField, ShipmentView, StoredValue};
use crate::storage::LocationStore;

/// Reads the most recent window of a shipment's locations.
#[derive(Clone)]
pub struct ShipmentRetrieval {
    store: Arc<dyn LocationStore>,
    max_locations: u32,
}

impl ShipmentRetrieval {
    /// `max_locations` is clamped to the supported window of 1..=500.
    pub fn new(store: Arc<dyn LocationStore>, max_locations: i64) -> Self {
        Self {
            store,
            max_locations: clamp_max_locations(max_locations),
        }
    }

    pub fn max_locations(&self) -> u32 {
        self.max_locations
    }

    /// Retrieves the shipment using the configured window size.
    pub async fn retrieve(&self, shipment_id: &str) -> TrackingResult<ShipmentView> {
        self.retrieve_window(shipment_id, i64::from(self.max_locations))
            .await
    }

    /// Returns up to `max_records` of the shipment's newest locations in
    /// ascending timestamp order.
    ///
    /// Order, logistic and plate identifiers come from the oldest record inside
    /// the returned window, which is not the shipment's first record when the
    /// history is longer than the window.
    pub async fn retrieve_window(
        &self,
        shipment_id: &str,
        max_records: i64,
    ) -> TrackingResult<ShipmentView> {
        let shipment_id = shipment_id.trim();
        if shipment_id.is_empty() {
            return Err(TrackingError::BadRequest(
                "shipmentId is required in the URL path".to_string(),
            ));
        }

        let limit = clamp_max_locations(max_records);
        let mut rows = self.store.query_descending(shipment_id, limit).await?;
        if rows.is_empty() {
            return Err(TrackingError::NotFound(shipment_id.to_string()));
        }

        rows.reverse();
        debug!(shipment_id, count = rows.len(), limit, "Loaded location window");

        let oldest = &rows[0];
        let order_id = oldest.order_id.clone().unwrap_or_default();
        let logistic_id = oldest.logistic_id.clone().unwrap_or_default();
        let plate_number = oldest.plate_number.clone().unwrap_or_default();

        let locations = rows
            .into_iter()
            .map(|row| LocationPoint {
                timestamp: coerce_timestamp(row.timestamp),
                latitude: coerce(row.latitude),
                longitude: coerce(row.longitude),
                speed_kmh: coerce(row.speed_kmh),
                heading: coerce(row.heading),
            })
            .collect();

        Ok(ShipmentView {
            order_id,
            logistic_id,
            shipment_id: shipment_id.to_string(),
            plate_number,
            locations,
        })
    }
}

/// Keeps integral timestamps as integers and otherwise coerces like any other
/// numeric field.
fn coerce_timestamp(value: StoredValue) -> NumericField {
    match value {
        StoredValue::Integer(i) => NumericField::Integer(i),
        StoredValue::Real(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            NumericField::Integer(f as i64)
        }
        StoredValue::Text(s) => match s.trim().parse::<i64>() {
            Ok(i) => NumericField::Integer(i),
            Err(_) => coerce(StoredValue::Text(s)),
        },
        StoredValue::Null => NumericField::Integer(0),
        other => coerce(other),
    }
}

/// Turns a stored value into a plain float where possible. Anything that does
/// not read as a finite number is handed back as text; a missing value is 0.
fn coerce(value: StoredValue) -> NumericField {
    match value {
        StoredValue::Integer(i) => NumericField::Number(i as f64),
        StoredValue::Real(f) if f.is_finite() => NumericField::Number(f),
        StoredValue::Real(f) => NumericField::Raw(f.to_string()),
        StoredValue::Text(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => NumericField::Number(f),
            _ => NumericField::Raw(s),
        },
        StoredValue::Null => NumericField::Number(0.0),
    }
}
