#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Orchestration of report submissions and proximity queries.
//!
//! [`IngestionService`] runs a submission through validation, sanitization,
//! admission control and storage, in that order, stopping at the first
//! failing step. [`ProximityQueryService`] validates a query and reads from
//! the store. Neither service retries; store calls are bounded by a
//! timeout and surfaced as errors when it elapses.

pub mod proximity;
pub mod submission;

use std::future::Future;
use std::time::Duration;

use disaster_reports_database::StoreError;
use disaster_reports_validation::ValidationErrors;

pub use proximity::ProximityQueryService;
pub use submission::{AdmittedSubmission, IngestionService};

/// Bound on a single store operation when none is configured.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors returned by [`IngestionService`].
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The submission failed validation. Nothing was counted or stored.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The source exhausted its admission window. Nothing was stored.
    #[error("Rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited {
        /// Time until the source may submit again.
        retry_after: Duration,
    },

    /// The store rejected the write.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The store did not answer in time.
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors returned by [`ProximityQueryService::near`].
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The query parameters failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The store query failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The store did not answer in time.
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Elapsed store deadline.
struct Elapsed(Duration);

impl From<Elapsed> for IngestError {
    fn from(value: Elapsed) -> Self {
        Self::Timeout(value.0)
    }
}

impl From<Elapsed> for QueryError {
    fn from(value: Elapsed) -> Self {
        Self::Timeout(value.0)
    }
}

/// Awaits a store operation for at most `limit`.
async fn bounded<T>(
    limit: Duration,
    operation: impl Future<Output = Result<T, StoreError>>,
) -> Result<Result<T, StoreError>, Elapsed> {
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| Elapsed(limit))
}
