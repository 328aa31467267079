//! `PostGIS`-backed report store.
//!
//! Locations live in a `geography(Point, 4326)` column with a GIST index, so
//! `ST_DWithin` radius filters use the index. Distances are measured on the
//! sphere (`use_spheroid = false`) so radius boundaries agree with the
//! in-memory store. Points are always built as
//! `ST_MakePoint(longitude, latitude)`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use disaster_reports_report_models::{
    DisasterType, GeoPoint, NewReport, Report, ReportId, Severity,
};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};

use crate::{NEAR_QUERY_LIMIT, ReportStore, StoreError};

const SELECT_NEAR: &str = "SELECT id, disaster_type, severity, description,
        image_url, verified, created_at,
        ST_X(location::geometry) AS longitude,
        ST_Y(location::geometry) AS latitude
    FROM reports
    WHERE ST_DWithin(
        location, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $3, false)
    ORDER BY created_at DESC, id DESC
    LIMIT $4";

/// [`ReportStore`] over a `PostGIS` `reports` table.
pub struct PostgisReportStore {
    db: Arc<dyn Database>,
}

impl PostgisReportStore {
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReportStore for PostgisReportStore {
    /// Inserts the report in a single statement, so it is either fully
    /// visible or absent.
    async fn create(&self, report: NewReport) -> Result<Report, StoreError> {
        let id = ReportId::new(uuid::Uuid::new_v4().to_string());
        // `TIMESTAMP` keeps microseconds; truncate up front so the returned
        // entity matches what a later query reads back.
        let created_at = truncate_to_micros(Utc::now());

        self.db
            .exec_raw_params(
                "INSERT INTO reports (
                    id, disaster_type, severity, description, location,
                    image_url, verified, created_at
                ) VALUES (
                    $1, $2, $3, $4,
                    ST_SetSRID(ST_MakePoint($5, $6), 4326)::geography,
                    $7, FALSE, $8
                )",
                &[
                    DatabaseValue::String(id.to_string()),
                    DatabaseValue::String(report.disaster_type.to_string()),
                    DatabaseValue::String(report.severity.to_string()),
                    DatabaseValue::String(report.description.clone()),
                    DatabaseValue::Real64(report.location.longitude),
                    DatabaseValue::Real64(report.location.latitude),
                    report
                        .image_url
                        .as_ref()
                        .map_or(DatabaseValue::Null, |u| DatabaseValue::String(u.clone())),
                    DatabaseValue::DateTime(created_at.naive_utc()),
                ],
            )
            .await?;

        log::debug!("Inserted report {id}");

        Ok(Report::from_new(report, id, created_at))
    }

    async fn query_near(
        &self,
        center: GeoPoint,
        radius_meters: f64,
    ) -> Result<Vec<Report>, StoreError> {
        let rows = self
            .db
            .query_raw_params(
                SELECT_NEAR,
                &[
                    DatabaseValue::Real64(center.longitude),
                    DatabaseValue::Real64(center.latitude),
                    DatabaseValue::Real64(radius_meters),
                    DatabaseValue::Int64(i64::try_from(NEAR_QUERY_LIMIT).unwrap_or(i64::MAX)),
                ],
            )
            .await?;

        let mut reports = Vec::with_capacity(rows.len());

        for row in &rows {
            let id: String = row.to_value("id").map_err(|e| conversion("id", &e))?;

            let disaster_type_name: String = row
                .to_value("disaster_type")
                .map_err(|e| conversion("disaster_type", &e))?;
            let disaster_type = disaster_type_name
                .parse::<DisasterType>()
                .map_err(|e| conversion("disaster_type", &e))?;

            let severity_name: String = row
                .to_value("severity")
                .map_err(|e| conversion("severity", &e))?;
            let severity = severity_name
                .parse::<Severity>()
                .map_err(|e| conversion("severity", &e))?;

            let created_at_naive: NaiveDateTime = row
                .to_value("created_at")
                .map_err(|e| conversion("created_at", &e))?;

            reports.push(Report {
                id: ReportId::new(id),
                disaster_type,
                severity,
                description: row
                    .to_value("description")
                    .map_err(|e| conversion("description", &e))?,
                location: GeoPoint::new(
                    row.to_value("longitude")
                        .map_err(|e| conversion("longitude", &e))?,
                    row.to_value("latitude")
                        .map_err(|e| conversion("latitude", &e))?,
                ),
                image_url: row.to_value("image_url").unwrap_or(None),
                verified: row.to_value("verified").unwrap_or(false),
                created_at: DateTime::<Utc>::from_naive_utc_and_offset(created_at_naive, Utc),
            });
        }

        Ok(reports)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let rows = self
            .db
            .query_raw_params("SELECT COUNT(*) AS count FROM reports", &[])
            .await?;

        let Some(row) = rows.first() else {
            return Ok(0);
        };

        let count: i64 = row.to_value("count").map_err(|e| conversion("count", &e))?;
        u64::try_from(count).map_err(|e| conversion("count", &e))
    }
}

fn conversion(column: &str, error: &dyn std::fmt::Display) -> StoreError {
    StoreError::Conversion {
        message: format!("Failed to read column {column}: {error}"),
    }
}

fn truncate_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(ts.timestamp_micros()).unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Timelike as _};

    use super::*;

    #[test]
    fn near_query_binds_longitude_before_latitude() {
        let make_point = SELECT_NEAR
            .find("ST_MakePoint($1, $2)")
            .expect("point built from first two params");
        assert!(make_point > 0);
        assert!(SELECT_NEAR.contains("::geography, $3, false)"));
        assert!(SELECT_NEAR.contains("ORDER BY created_at DESC"));
        assert!(SELECT_NEAR.contains("LIMIT $4"));
    }

    #[test]
    fn timestamps_truncate_to_microseconds() {
        let ts = Utc
            .with_ymd_and_hms(2026, 10, 16, 12, 0, 0)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        assert_eq!(truncate_to_micros(ts).nanosecond(), 123_456_000);
    }
}
