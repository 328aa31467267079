//! Proximity queries over stored reports.

use std::sync::Arc;
use std::time::Duration;

use disaster_reports_database::ReportStore;
use disaster_reports_report_models::Report;
use disaster_reports_validation::{ProximityQueryInput, validate_proximity_query};

use crate::{DEFAULT_STORE_TIMEOUT, QueryError, bounded};

/// Answers "reports near this point" queries. Never rate-limited.
pub struct ProximityQueryService {
    store: Arc<dyn ReportStore>,
    store_timeout: Duration,
}

impl ProximityQueryService {
    #[must_use]
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self {
            store,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Returns reports near the queried point, newest first. An empty result
    /// is a success.
    ///
    /// # Errors
    ///
    /// * [`QueryError::Validation`] if `lat`, `lng` or `radius` is invalid
    /// * [`QueryError::Store`] or [`QueryError::Timeout`] if the read fails
    pub async fn near(&self, input: &ProximityQueryInput) -> Result<Vec<Report>, QueryError> {
        let query = validate_proximity_query(input)?;

        let reports = bounded(
            self.store_timeout,
            self.store.query_near(query.point, query.radius_meters),
        )
        .await??;

        log::debug!(
            "Found {} reports within {}m of ({}, {})",
            reports.len(),
            query.radius_meters,
            query.point.longitude,
            query.point.latitude
        );

        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use disaster_reports_database::NEAR_QUERY_LIMIT;
    use disaster_reports_database::memory::MemoryReportStore;
    use disaster_reports_rate_limit::SlidingWindowLimiter;
    use disaster_reports_report_models::{DisasterType, GeoPoint, NewReport, Severity};
    use disaster_reports_validation::SubmissionInput;

    use super::*;
    use crate::IngestionService;
    use crate::test_stores::{FailingStore, StalledStore};

    const NYC: GeoPoint = GeoPoint::new(-74.0060, 40.7128);

    fn query(lat: &str, lng: &str, radius: Option<&str>) -> ProximityQueryInput {
        ProximityQueryInput {
            lat: Some(lat.to_string()),
            lng: Some(lng.to_string()),
            radius: radius.map(ToString::to_string),
        }
    }

    fn new_report(description: &str, location: GeoPoint) -> NewReport {
        NewReport {
            disaster_type: DisasterType::Storm,
            severity: Severity::Medium,
            description: description.to_string(),
            location,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn submitted_report_is_found_first() {
        let store = Arc::new(MemoryReportStore::new());
        let ingest =
            IngestionService::new(store.clone(), Arc::new(SlidingWindowLimiter::default()));
        let proximity = ProximityQueryService::new(store.clone());

        store.create(new_report("older nearby report", NYC)).await.unwrap();

        let input = SubmissionInput {
            disaster_type: Some("flood".to_string()),
            severity: Some("high".to_string()),
            description: Some("Water level rising fast near the river".to_string()),
            latitude: Some("40.7128".to_string()),
            longitude: Some("-74.0060".to_string()),
        };
        let created = ingest.submit("10.0.0.1", &input, None).await.unwrap();

        let reports = proximity
            .near(&query("40.7128", "-74.0060", Some("1000")))
            .await
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0], created);
    }

    #[tokio::test]
    async fn results_are_newest_first() {
        let store = Arc::new(MemoryReportStore::new());
        let t1 = store.create(new_report("report at t1", NYC)).await.unwrap();
        let t2 = store.create(new_report("report at t2", NYC)).await.unwrap();
        let t3 = store.create(new_report("report at t3", NYC)).await.unwrap();

        let reports = ProximityQueryService::new(store)
            .near(&query("40.7128", "-74.0060", None))
            .await
            .unwrap();

        assert_eq!(reports, vec![t3, t2, t1]);
    }

    #[tokio::test]
    async fn default_radius_is_five_kilometers() {
        let store = Arc::new(MemoryReportStore::new());
        // Roughly 4.4 km and 5.6 km north of the query point.
        store
            .create(new_report("inside default radius", GeoPoint::new(-74.0060, 40.7528)))
            .await
            .unwrap();
        store
            .create(new_report("outside default radius", GeoPoint::new(-74.0060, 40.7628)))
            .await
            .unwrap();

        let reports = ProximityQueryService::new(store)
            .near(&query("40.7128", "-74.0060", None))
            .await
            .unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].description, "inside default radius");
    }

    #[tokio::test]
    async fn results_are_capped() {
        let store = Arc::new(MemoryReportStore::new());
        for i in 0..(NEAR_QUERY_LIMIT + 5) {
            store
                .create(new_report(&format!("report number {i}"), NYC))
                .await
                .unwrap();
        }

        let reports = ProximityQueryService::new(store)
            .near(&query("40.7128", "-74.0060", Some("100")))
            .await
            .unwrap();

        assert_eq!(reports.len(), NEAR_QUERY_LIMIT);
    }

    #[tokio::test]
    async fn empty_result_is_success() {
        let reports = ProximityQueryService::new(Arc::new(MemoryReportStore::new()))
            .near(&query("0", "0", Some("10")))
            .await
            .unwrap();

        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn invalid_parameters_name_their_fields() {
        let svc = ProximityQueryService::new(Arc::new(MemoryReportStore::new()));

        match svc.near(&query("95", "abc", Some("-5"))).await.unwrap_err() {
            QueryError::Validation(errors) => {
                assert!(errors.contains_field("lat"));
                assert!(errors.contains_field("lng"));
                assert!(errors.contains_field("radius"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn store_faults_are_errors() {
        let failing = ProximityQueryService::new(Arc::new(FailingStore));
        assert!(matches!(
            failing.near(&query("0", "0", None)).await,
            Err(QueryError::Store(_))
        ));

        let stalled = ProximityQueryService::new(Arc::new(StalledStore))
            .with_store_timeout(Duration::from_millis(20));
        assert!(matches!(
            stalled.near(&query("0", "0", None)).await,
            Err(QueryError::Timeout(_))
        ));
    }
}
