//! In-process report store backed by an R-tree.
//!
//! Reports and their index entries are written under a single `RwLock`
//! write guard, so a concurrent `query_near` observes either both or
//! neither. Reports are kept in insertion order; the position doubles as a
//! tie-breaker when two reports share a `created_at`.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use disaster_reports_report_models::{GeoPoint, NewReport, Report, ReportId};
use disaster_reports_spatial::PointIndex;

use crate::{NEAR_QUERY_LIMIT, ReportStore, StoreError};

#[derive(Default)]
struct Inner {
    reports: Vec<Report>,
    index: PointIndex<usize>,
}

/// Non-durable [`ReportStore`] for tests and single-node development.
#[derive(Default)]
pub struct MemoryReportStore {
    inner: RwLock<Inner>,
}

impl MemoryReportStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner.read().map_err(|_| StoreError::Unavailable {
            message: "report store lock poisoned".to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner.write().map_err(|_| StoreError::Unavailable {
            message: "report store lock poisoned".to_string(),
        })
    }

    fn insert(&self, new: NewReport) -> Result<Report, StoreError> {
        let mut inner = self.write()?;

        // Timestamped under the lock so insertion order matches time order.
        let id = ReportId::new(uuid::Uuid::new_v4().to_string());
        let report = Report::from_new(new, id, Utc::now());

        let position = inner.reports.len();
        inner.index.insert(report.location, position);
        inner.reports.push(report.clone());

        Ok(report)
    }

    fn near(&self, center: GeoPoint, radius_meters: f64) -> Result<Vec<Report>, StoreError> {
        let inner = self.read()?;

        let mut hits: Vec<usize> = inner
            .index
            .within_radius(center, radius_meters)
            .into_iter()
            .copied()
            .collect();

        hits.sort_unstable_by(|a, b| {
            let (ra, rb) = (&inner.reports[*a], &inner.reports[*b]);
            rb.created_at.cmp(&ra.created_at).then(b.cmp(a))
        });
        hits.truncate(NEAR_QUERY_LIMIT);

        Ok(hits
            .into_iter()
            .map(|position| inner.reports[position].clone())
            .collect())
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn create(&self, report: NewReport) -> Result<Report, StoreError> {
        self.insert(report)
    }

    async fn query_near(
        &self,
        center: GeoPoint,
        radius_meters: f64,
    ) -> Result<Vec<Report>, StoreError> {
        self.near(center, radius_meters)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.reports.len() as u64)
    }
}
