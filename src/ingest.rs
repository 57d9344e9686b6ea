use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::{TrackingError, TrackingResult, UNKNOWN_RECORD_ID};
use crate::models::{IngestReceipt, LocationRecord};
use crate::storage::{LocationStore, WriteError};
use crate::validation::Observation;

/// Appends location observations with insert-once semantics per
/// `(shipment_id, timestamp)`.
#[derive(Clone)]
pub struct LocationIngest {
    store: Arc<dyn LocationStore>,
}

impl LocationIngest {
    pub fn new(store: Arc<dyn LocationStore>) -> Self {
        Self { store }
    }

    /// Validates `observation` and stores it if its key is still free.
    ///
    /// `is_first_location` in the receipt means "nothing existed at this exact
    /// key", so every successful insert reports `true`; earlier timestamps of
    /// the same shipment are not consulted.
    pub async fn ingest(&self, observation: &Observation) -> TrackingResult<IngestReceipt> {
        let valid = observation.validate().map_err(TrackingError::Validation)?;
        let record = LocationRecord::new(valid);

        match self.store.conditional_put(&record).await {
            Ok(()) => {
                info!(
                    shipment_id = %record.shipment_id,
                    timestamp = record.timestamp,
                    record_id = %record.record_id,
                    "Location recorded"
                );
                Ok(IngestReceipt {
                    record_id: record.record_id,
                    is_first_location: record.is_first_location,
                })
            }
            Err(WriteError::AlreadyExists {
                shipment_id,
                timestamp,
            }) => {
                let existing = self.store.get(&shipment_id, timestamp).await?;
                let existing_record_id = existing
                    .and_then(|r| r.record_id)
                    .unwrap_or_else(|| UNKNOWN_RECORD_ID.to_string());

                warn!(
                    shipment_id = %shipment_id,
                    timestamp,
                    existing_record_id = %existing_record_id,
                    "Duplicate location update"
                );
                Err(TrackingError::Duplicate { existing_record_id })
            }
            Err(WriteError::Storage(e)) => {
                error!(shipment_id = %record.shipment_id, error = %e, "Failed to store location");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_pool;
    use crate::models::{LocationProjection, StoredRecord};
    use crate::storage::{SqliteLocationStore, StorageError};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    fn observation(shipment_id: &str, timestamp: Value) -> Observation {
        serde_json::from_value(json!({
            "orderId": "ORD-1",
            "logisticId": "LOG-1",
            "shipmentId": shipment_id,
            "plateNumber": "B 1234 XYZ",
            "location": {
                "latitude": -6.2,
                "longitude": 106.8,
                "timestamp": timestamp,
                "speedKmh": 35.5,
                "heading": 180
            }
        }))
        .unwrap()
    }

    async fn sqlite_store() -> Arc<SqliteLocationStore> {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        Arc::new(SqliteLocationStore::open(pool, "trips").await.unwrap())
    }

    /// Reports every key as taken and never finds the holder.
    struct VanishingStore;

    #[async_trait]
    impl LocationStore for VanishingStore {
        async fn conditional_put(&self, record: &LocationRecord) -> Result<(), WriteError> {
            Err(WriteError::AlreadyExists {
                shipment_id: record.shipment_id.clone(),
                timestamp: record.timestamp,
            })
        }

        async fn get(&self, _: &str, _: i64) -> Result<Option<StoredRecord>, StorageError> {
            Ok(None)
        }

        async fn query_descending(
            &self,
            _: &str,
            _: u32,
        ) -> Result<Vec<LocationProjection>, StorageError> {
            Ok(Vec::new())
        }
    }

    struct UnreachableStore;

    #[async_trait]
    impl LocationStore for UnreachableStore {
        async fn conditional_put(&self, _: &LocationRecord) -> Result<(), WriteError> {
            Err(sqlx::Error::PoolTimedOut.into())
        }

        async fn get(&self, _: &str, _: i64) -> Result<Option<StoredRecord>, StorageError> {
            Err(sqlx::Error::PoolTimedOut.into())
        }

        async fn query_descending(
            &self,
            _: &str,
            _: u32,
        ) -> Result<Vec<LocationProjection>, StorageError> {
            Err(sqlx::Error::PoolTimedOut.into())
        }
    }

    #[tokio::test]
    async fn distinct_keys_are_always_first() {
        let ingest = LocationIngest::new(sqlite_store().await);

        for (shipment, ts) in [("S1", 1000), ("S1", 2000), ("S2", 1000), ("S1", 500)] {
            let receipt = ingest.ingest(&observation(shipment, json!(ts))).await.unwrap();
            assert!(receipt.is_first_location);
        }
    }

    #[tokio::test]
    async fn duplicate_reports_the_original_record_id() {
        let ingest = LocationIngest::new(sqlite_store().await);

        let first = ingest.ingest(&observation("S1", json!(1000))).await.unwrap();
        let second = ingest.ingest(&observation("S1", json!(1000))).await;

        match second {
            Err(TrackingError::Duplicate { existing_record_id }) => {
                assert_eq!(existing_record_id, first.record_id);
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_of_a_malformed_row_still_reports_its_record_id() {
        let store = sqlite_store().await;
        sqlx::query(
            r#"INSERT INTO "trips"
               (shipment_id, timestamp, record_id, latitude, longitude, speed_kmh, heading,
                created_at)
               VALUES ('S1', 1000, 'legacy-id', 'n/a', 106.8, NULL, 'north', 'long ago')"#,
        )
        .execute(store.pool())
        .await
        .unwrap();
        let ingest = LocationIngest::new(store);

        match ingest.ingest(&observation("S1", json!(1000))).await {
            Err(TrackingError::Duplicate { existing_record_id }) => {
                assert_eq!(existing_record_id, "legacy-id");
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn iso_and_epoch_forms_of_one_instant_collide() {
        let ingest = LocationIngest::new(sqlite_store().await);

        ingest
            .ingest(&observation("S1", json!("2024-03-01T10:00:00Z")))
            .await
            .unwrap();
        let again = ingest
            .ingest(&observation("S1", json!(1_709_287_200_000_i64)))
            .await;

        assert!(matches!(again, Err(TrackingError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn concurrent_inserts_of_one_key_have_a_single_winner() {
        let ingest = LocationIngest::new(sqlite_store().await);
        let obs = observation("S1", json!(1000));

        let attempts = (0..16).map(|_| ingest.ingest(&obs));
        let results = futures_util::future::join_all(attempts).await;

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);

        for result in &results {
            if let Err(err) = result {
                match err {
                    TrackingError::Duplicate { existing_record_id } => {
                        assert_eq!(existing_record_id, &winners[0].record_id);
                    }
                    other => panic!("unexpected error {other:?}"),
                }
            }
        }
    }

    #[tokio::test]
    async fn vanished_duplicate_reports_unknown() {
        let ingest = LocationIngest::new(Arc::new(VanishingStore));

        let result = ingest.ingest(&observation("S1", json!(1000))).await;
        match result {
            Err(TrackingError::Duplicate { existing_record_id }) => {
                assert_eq!(existing_record_id, UNKNOWN_RECORD_ID);
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn storage_failures_surface_as_storage_errors() {
        let ingest = LocationIngest::new(Arc::new(UnreachableStore));

        let result = ingest.ingest(&observation("S1", json!(1000))).await;
        assert!(matches!(result, Err(TrackingError::Storage(_))));
    }

    #[tokio::test]
    async fn invalid_observations_never_reach_storage() {
        let ingest = LocationIngest::new(Arc::new(UnreachableStore));
        let mut bad = observation("S1", json!(1000));
        bad.location = Some(json!({
            "latitude": 91,
            "longitude": 0,
            "timestamp": 1000,
            "speedKmh": -1,
            "heading": 400
        }));

        match ingest.ingest(&bad).await {
            Err(TrackingError::Validation(messages)) => assert_eq!(messages.len(), 3),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
