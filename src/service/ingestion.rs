//! Ingestion pipeline: validate an uploaded document, then persist the
//! report and its violations as one unit.

use std::sync::Arc;
use std::time::Duration;

use super::bounded;
use crate::domain::{IngestOutcome, ReportDocument, ReportId, UserId};
use crate::error::ApiError;
use crate::persistence::ReportStore;

/// Write side of the report store.
///
/// Validation happens entirely before the store is touched; store failures
/// are surfaced as-is and never retried, since a retried upload could
/// duplicate data.
#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    store: Arc<dyn ReportStore>,
    timeout: Duration,
}

impl IngestionPipeline {
    /// Creates a pipeline writing to `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ReportStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Decodes, validates and persists one uploaded report.
    ///
    /// # Errors
    ///
    /// - [`ApiError::EmptyPayload`], [`ApiError::MalformedJson`] or
    ///   [`ApiError::SchemaViolation`] for a bad document (nothing is written).
    /// - [`ApiError::Conflict`] or [`ApiError::Store`] when the transaction
    ///   fails (nothing is written).
    /// - [`ApiError::StoreUnavailable`] on timeout.
    pub async fn ingest(&self, raw: &[u8], uploader: UserId) -> Result<IngestOutcome, ApiError> {
        let document = ReportDocument::from_slice(raw).inspect_err(|e| {
            tracing::info!(%uploader, error = %e, "upload rejected");
        })?;
        let violations_count = document.violations.len();
        let report = document.attribute_to(uploader);

        let report_id = bounded(
            self.timeout,
            self.store.create_report_with_violations(&report),
        )
        .await?;

        tracing::info!(
            %report_id,
            %uploader,
            drone_id = %report.drone_id,
            violations = violations_count,
            "report ingested"
        );
        Ok(IngestOutcome {
            report_id,
            violations_count,
        })
    }

    /// Deletes a report and its violations.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if no such report exists.
    pub async fn delete_report(&self, id: ReportId) -> Result<(), ApiError> {
        if bounded(self.timeout, self.store.delete_report(id)).await? {
            tracing::info!(report_id = %id, "report deleted");
            Ok(())
        } else {
            Err(ApiError::NotFound("Report not found".to_string()))
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{KpiScope, NewUser, Role};
    use crate::persistence::{MemoryStore, UserStore};

    const VALID: &str = r#"{
        "drone_id": "D1",
        "date": "2024-01-01",
        "location": "L1",
        "violations": [{
            "id": "v1",
            "type": "speed",
            "timestamp": "10:00:00",
            "latitude": 1.0,
            "longitude": 2.0,
            "image_url": "https://x/y.jpg"
        }]
    }"#;

    async fn setup() -> (Arc<MemoryStore>, IngestionPipeline, UserId) {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .create_user(&NewUser {
                username: "pilot".to_string(),
                email: "pilot@example.com".to_string(),
                password_hash: "hash".to_string(),
                role: Role::User,
            })
            .await;
        let Ok(user) = user else {
            panic!("user creation failed");
        };
        let pipeline = IngestionPipeline::new(
            Arc::clone(&store) as Arc<dyn ReportStore>,
            Duration::from_secs(5),
        );
        (store, pipeline, user.id)
    }

    #[tokio::test]
    async fn round_trip() {
        let (store, pipeline, uploader) = setup().await;
        let Ok(outcome) = pipeline.ingest(VALID.as_bytes(), uploader).await else {
            panic!("valid upload rejected");
        };
        assert_eq!(outcome.violations_count, 1);

        let Ok(Some(report)) = store.find_report_by_id(outcome.report_id).await else {
            panic!("report missing");
        };
        assert_eq!(report.drone_id, "D1");
        assert_eq!(report.date.to_string(), "2024-01-01");
        assert_eq!(report.location, "L1");
        let [violation] = report.violations.as_slice() else {
            panic!("expected exactly one violation");
        };
        assert_eq!(violation.violation_id, "v1");
        assert_eq!(violation.violation_type, "speed");
        assert_eq!(violation.timestamp.to_string(), "10:00:00");
        assert!((violation.latitude - 1.0).abs() < f64::EPSILON);
        assert!((violation.longitude - 2.0).abs() < f64::EPSILON);
        assert_eq!(violation.image_url, "https://x/y.jpg");
    }

    #[tokio::test]
    async fn empty_violation_array_is_accepted() {
        let (store, pipeline, uploader) = setup().await;
        let raw = br#"{"drone_id":"D1","date":"2024-01-01","location":"L1","violations":[]}"#;
        let Ok(outcome) = pipeline.ingest(raw, uploader).await else {
            panic!("empty array rejected");
        };
        assert_eq!(outcome.violations_count, 0);
        let Ok(Some(report)) = store.find_report_by_id(outcome.report_id).await else {
            panic!("report missing");
        };
        assert!(report.violations.is_empty());
    }

    #[tokio::test]
    async fn failing_violation_leaves_no_report() {
        let (store, pipeline, uploader) = setup().await;
        let raw = br#"{
            "drone_id": "D1", "date": "2024-01-01", "location": "L1",
            "violations": [
                {"id":"v1","type":"speed","timestamp":"09:00","latitude":1,"longitude":2,"image_url":"https://x/1.jpg"},
                {"id":"v2","type":"speed","timestamp":"10:00","latitude":123.5,"longitude":2,"image_url":"https://x/2.jpg"}
            ]
        }"#;
        assert!(matches!(
            pipeline.ingest(raw, uploader).await,
            Err(ApiError::Store(_))
        ));
        assert!(matches!(store.find_report_by_id(ReportId::new(1)).await, Ok(None)));
        assert!(matches!(store.count_violations(&KpiScope::default()).await, Ok(0)));
    }

    #[tokio::test]
    async fn bad_documents_never_reach_the_store() {
        let (store, pipeline, uploader) = setup().await;
        assert!(matches!(
            pipeline.ingest(b"", uploader).await,
            Err(ApiError::EmptyPayload)
        ));
        assert!(matches!(
            pipeline.ingest(b"{not json", uploader).await,
            Err(ApiError::MalformedJson(_))
        ));
        assert!(matches!(
            pipeline.ingest(br#"{"drone_id":"D1"}"#, uploader).await,
            Err(ApiError::SchemaViolation(_))
        ));
        assert!(matches!(store.distinct_drone_ids().await, Ok(ids) if ids.is_empty()));
    }

    #[tokio::test]
    async fn delete_missing_report_is_not_found() {
        let (_store, pipeline, uploader) = setup().await;
        let Ok(outcome) = pipeline.ingest(VALID.as_bytes(), uploader).await else {
            panic!("valid upload rejected");
        };
        assert!(pipeline.delete_report(outcome.report_id).await.is_ok());
        assert!(matches!(
            pipeline.delete_report(outcome.report_id).await,
            Err(ApiError::NotFound(_))
        ));
    }
}
