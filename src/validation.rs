//! Parsing and validation of incoming location observations.
//!
//! Validation never stops at the first problem: every violated rule adds a
//! message so a caller can fix the whole payload in one round trip.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

const REQUIRED_FIELDS: [&str; 5] = [
    "orderId",
    "logisticId",
    "shipmentId",
    "plateNumber",
    "location",
];
const INVALID_TIMESTAMP: &str =
    "Invalid location value: timestamp must be epoch milliseconds or an ISO-8601 date-time";
const LOCATION_FIELDS: [&str; 5] = ["latitude", "longitude", "timestamp", "speedKmh", "heading"];

/// An observation exactly as the caller sent it. Any JSON object deserializes
/// into this shape; nothing is checked until [`Observation::validate`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub order_id: Option<Value>,
    pub logistic_id: Option<Value>,
    pub shipment_id: Option<Value>,
    pub plate_number: Option<Value>,
    pub location: Option<Value>,
}

/// An observation that passed every rule, with the timestamp normalised to
/// UTC epoch milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidObservation {
    pub order_id: String,
    pub logistic_id: String,
    pub shipment_id: String,
    pub plate_number: String,
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: f64,
    pub heading: f64,
}

impl Observation {
    pub fn validate(&self) -> Result<ValidObservation, Vec<String>> {
        let mut errors = Vec::new();

        let top_level = [
            &self.order_id,
            &self.logistic_id,
            &self.shipment_id,
            &self.plate_number,
            &self.location,
        ];
        for (field, value) in REQUIRED_FIELDS.iter().zip(top_level) {
            if is_blank(value.as_ref()) {
                errors.push(format!("Missing required field: {field}"));
            }
        }

        let order_id = identifier("orderId", self.order_id.as_ref(), &mut errors);
        let logistic_id = identifier("logisticId", self.logistic_id.as_ref(), &mut errors);
        let shipment_id = identifier("shipmentId", self.shipment_id.as_ref(), &mut errors);
        let plate_number = identifier("plateNumber", self.plate_number.as_ref(), &mut errors);

        let location = match &self.location {
            Some(Value::Object(map)) if !map.is_empty() => {
                Some(validate_location(map, &mut errors))
            }
            Some(value) if !is_blank(Some(value)) => {
                errors.push("Location must be an object".to_string());
                None
            }
            _ => {
                errors.push("Missing location object".to_string());
                None
            }
        };

        // Every `None` below has already pushed its message.
        match (order_id, logistic_id, shipment_id, plate_number, location) {
            (
                Some(order_id),
                Some(logistic_id),
                Some(shipment_id),
                Some(plate_number),
                Some(Some(loc)),
            ) if errors.is_empty() => Ok(ValidObservation {
                order_id,
                logistic_id,
                shipment_id,
                plate_number,
                timestamp: loc.timestamp,
                latitude: loc.latitude,
                longitude: loc.longitude,
                speed_kmh: loc.speed_kmh,
                heading: loc.heading,
            }),
            _ => Err(errors),
        }
    }
}

struct ValidLocation {
    timestamp: i64,
    latitude: f64,
    longitude: f64,
    speed_kmh: f64,
    heading: f64,
}

fn validate_location(
    loc: &Map<String, Value>,
    errors: &mut Vec<String>,
) -> Option<ValidLocation> {
    let present = |field: &str| loc.get(field).filter(|v| !v.is_null());

    for field in LOCATION_FIELDS {
        if present(field).is_none() {
            errors.push(format!("Missing location field: {field}"));
        }
    }

    let latitude = ranged(
        present("latitude"),
        "latitude",
        errors,
        |v| (-90.0..=90.0).contains(&v),
        "Latitude must be -90 to 90",
    );
    let longitude = ranged(
        present("longitude"),
        "longitude",
        errors,
        |v| (-180.0..=180.0).contains(&v),
        "Longitude must be -180 to 180",
    );
    let speed_kmh = ranged(
        present("speedKmh"),
        "speedKmh",
        errors,
        |v| v >= 0.0,
        "Speed cannot be negative",
    );
    let heading = ranged(
        present("heading"),
        "heading",
        errors,
        |v| (0.0..360.0).contains(&v),
        "Heading must be 0 to 359",
    );

    let timestamp = present("timestamp").and_then(|value| {
        let parsed = parse_timestamp(value);
        if parsed.is_none() {
            errors.push(INVALID_TIMESTAMP.to_string());
        }
        parsed
    });

    Some(ValidLocation {
        timestamp: timestamp?,
        latitude: latitude?,
        longitude: longitude?,
        speed_kmh: speed_kmh?,
        heading: heading?,
    })
}

fn ranged(
    value: Option<&Value>,
    field: &str,
    errors: &mut Vec<String>,
    in_range: impl Fn(f64) -> bool,
    message: &str,
) -> Option<f64> {
    let value = value?;
    let Some(number) = parse_number(value) else {
        errors.push(format!("Invalid location value: {field} must be a number"));
        return None;
    };
    if !in_range(number) {
        errors.push(message.to_string());
        return None;
    }
    Some(number)
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

fn identifier(field: &str, value: Option<&Value>, errors: &mut Vec<String>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(value) if !is_blank(Some(value)) => {
            errors.push(format!("Field {field} must be a string"));
            None
        }
        _ => None,
    }
}

/// Reads a finite number from a JSON number or a numeric string.
pub fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Normalises an observation timestamp to UTC epoch milliseconds.
///
/// Integers are taken as epoch milliseconds. Strings must be ISO-8601: RFC 3339
/// with an offset, a naive date-time (read as UTC), or a bare date.
pub fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            let millis = match n.as_i64() {
                Some(i) => i,
                None => {
                    let f = n.as_f64()?;
                    if f.fract() != 0.0 || f < i64::MIN as f64 || f > i64::MAX as f64 {
                        return None;
                    }
                    f as i64
                }
            };
            DateTime::<Utc>::from_timestamp_millis(millis).map(|_| millis)
        }
        Value::String(s) => parse_iso8601(s.trim()),
        _ => None,
    }
}

fn parse_iso8601(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}
