//! Report submission pipeline.

use std::sync::Arc;
use std::time::Duration;

use disaster_reports_database::ReportStore;
use disaster_reports_rate_limit::{Decision, RateLimiter};
use disaster_reports_report_models::{NewReport, Report};
use disaster_reports_validation::{SubmissionInput, sanitize, validate_submission};

use crate::{DEFAULT_STORE_TIMEOUT, IngestError, bounded};

/// Accepts report submissions on behalf of a source.
pub struct IngestionService {
    store: Arc<dyn ReportStore>,
    limiter: Arc<dyn RateLimiter>,
    store_timeout: Duration,
}

impl IngestionService {
    #[must_use]
    pub fn new(store: Arc<dyn ReportStore>, limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            store,
            limiter,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Validates, sanitizes, admits and stores a submission.
    ///
    /// Equivalent to [`Self::admit`] followed by [`Self::create`].
    ///
    /// # Errors
    ///
    /// * [`IngestError::Validation`] if any field is invalid
    /// * [`IngestError::RateLimited`] if `source_key` has exhausted its window
    /// * [`IngestError::Store`] or [`IngestError::Timeout`] if the write fails
    pub async fn submit(
        &self,
        source_key: &str,
        input: &SubmissionInput,
        image_url: Option<String>,
    ) -> Result<Report, IngestError> {
        let admitted = self.admit(source_key, input)?;
        self.create(admitted, image_url).await
    }

    /// Validates and sanitizes a submission, then counts it against
    /// `source_key`'s window.
    ///
    /// The description length is checked on the raw text; the stored
    /// description is the sanitized one. Only submissions that pass
    /// validation are counted. Nothing is written.
    ///
    /// # Errors
    ///
    /// * [`IngestError::Validation`] if any field is invalid
    /// * [`IngestError::RateLimited`] if `source_key` has exhausted its window
    pub fn admit(
        &self,
        source_key: &str,
        input: &SubmissionInput,
    ) -> Result<AdmittedSubmission, IngestError> {
        let validated = validate_submission(input)?;
        let description = sanitize(&validated.description);

        if let Decision::Denied { retry_after } = self.limiter.admit(source_key) {
            log::info!(
                "Rate limited submission from {source_key}, retry after {}s",
                retry_after.as_secs()
            );
            return Err(IngestError::RateLimited { retry_after });
        }

        Ok(AdmittedSubmission {
            report: NewReport {
                disaster_type: validated.disaster_type,
                severity: validated.severity,
                description,
                location: validated.location,
                image_url: None,
            },
        })
    }

    /// Stores an admitted submission. `image_url` is the opaque URL of an
    /// image already uploaded for it.
    ///
    /// # Errors
    ///
    /// * [`IngestError::Store`] or [`IngestError::Timeout`] if the write fails
    pub async fn create(
        &self,
        admitted: AdmittedSubmission,
        image_url: Option<String>,
    ) -> Result<Report, IngestError> {
        let new_report = NewReport {
            image_url,
            ..admitted.report
        };

        let report = bounded(self.store_timeout, self.store.create(new_report)).await??;

        log::info!(
            "Created {} report {} at ({}, {})",
            report.disaster_type,
            report.id,
            report.location.longitude,
            report.location.latitude
        );

        Ok(report)
    }
}

/// A validated, sanitized submission that has been counted against its
/// source and may be stored with [`IngestionService::create`].
#[derive(Debug)]
#[must_use]
pub struct AdmittedSubmission {
    report: NewReport,
}
