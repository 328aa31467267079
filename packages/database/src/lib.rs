#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Report storage for the disaster reports service.
//!
//! [`ReportStore`] is the storage seam used by the ingestion and proximity
//! query services. Two implementations are provided:
//!
//! - [`memory::MemoryReportStore`]: an in-process store backed by an R-tree,
//!   used for tests and single-node development.
//! - [`postgis::PostgisReportStore`]: a `PostGIS` table with a GIST index on a
//!   `geography` column, accessed through `switchy_database`.
//!
//! Schema changes are embedded SQL migrations applied with `switchy_schema`.

pub mod db;
pub mod memory;
pub mod postgis;

use async_trait::async_trait;
use disaster_reports_report_models::{GeoPoint, NewReport, Report};
use include_dir::{Dir, include_dir};
use switchy_database::Database;
use switchy_schema::discovery::embedded::EmbeddedMigrationSource;
use switchy_schema::runner::MigrationRunner;

/// Embedded SQL migrations from the `migrations/` directory.
static MIGRATIONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/../../migrations");

/// Maximum number of reports returned by a proximity query.
pub const NEAR_QUERY_LIMIT: usize = 50;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] switchy_schema::MigrationError),

    /// The backend cannot serve requests.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description of what went wrong.
        message: String,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Durable collection of reports with a spatial index over their locations.
///
/// Implementations must make `create` atomic with respect to `query_near`:
/// a reader sees either the whole report or nothing.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persists a report, assigning its `id` and `created_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend is unreachable or rejects the
    /// write. Nothing is persisted in that case.
    async fn create(&self, report: NewReport) -> Result<Report, StoreError>;

    /// Returns reports within `radius_meters` (great-circle distance) of
    /// `center`, newest first, at most [`NEAR_QUERY_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend query fails.
    async fn query_near(
        &self,
        center: GeoPoint,
        radius_meters: f64,
    ) -> Result<Vec<Report>, StoreError>;

    /// Total number of stored reports.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend query fails.
    async fn count(&self) -> Result<u64, StoreError>;
}

/// Runs all pending database migrations.
///
/// # Errors
///
/// Returns [`StoreError`] if any migration fails to apply.
pub async fn run_migrations(db: &dyn Database) -> Result<(), StoreError> {
    let source = EmbeddedMigrationSource::new(&MIGRATIONS_DIR);
    let runner = MigrationRunner::new(Box::new(source));
    runner.run(db).await?;
    log::info!("Database migrations completed successfully");
    Ok(())
}
