#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the disaster reports server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the domain types so the wire contract (camelCase keys, `GeoJSON`
//! point locations) can evolve independently.

use chrono::{DateTime, Utc};
use disaster_reports_report_models::{DisasterType, GeoPoint, Report, Severity};
use serde::{Deserialize, Serialize};

/// A `GeoJSON` point. Coordinates are `[longitude, latitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApiPoint {
    /// Always `"Point"`.
    #[serde(rename = "type")]
    pub kind: ApiPointKind,
    /// `[longitude, latitude]`.
    pub coordinates: [f64; 2],
}

/// `GeoJSON` geometry type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiPointKind {
    Point,
}

impl From<GeoPoint> for ApiPoint {
    fn from(point: GeoPoint) -> Self {
        Self {
            kind: ApiPointKind::Point,
            coordinates: point.coordinates(),
        }
    }
}

/// A disaster report as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReport {
    /// Unique report ID.
    pub id: String,
    /// Disaster type.
    #[serde(rename = "type")]
    pub disaster_type: DisasterType,
    /// Severity level name.
    pub severity: Severity,
    /// Sanitized description.
    pub description: String,
    /// Report location.
    pub location: ApiPoint,
    /// URL of the attached image, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Whether a moderator has verified the report.
    pub verified: bool,
    /// When the report was created (ISO 8601).
    pub created_at: DateTime<Utc>,
}

impl From<Report> for ApiReport {
    fn from(report: Report) -> Self {
        Self {
            id: report.id.to_string(),
            disaster_type: report.disaster_type,
            severity: report.severity,
            description: report.description,
            location: report.location.into(),
            image_url: report.image_url,
            verified: report.verified,
            created_at: report.created_at,
        }
    }
}

/// Query parameters for the proximity endpoint.
///
/// Kept as raw strings so validation can report every bad field instead of
/// failing on the first deserialization error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NearQueryParams {
    /// Latitude of the search center.
    pub lat: Option<String>,
    /// Longitude of the search center.
    pub lng: Option<String>,
    /// Search radius in meters.
    pub radius: Option<String>,
}

/// `201` response for a created report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReportResponse {
    pub success: bool,
    pub message: String,
    /// ID of the created report.
    pub report_id: String,
}

/// Successful proximity query response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearReportsResponse {
    pub success: bool,
    pub reports: Vec<ApiReport>,
}

/// A single invalid field in an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiFieldError {
    /// Wire name of the offending field.
    pub field: String,
    /// Machine-readable reason, e.g. `too_short`.
    pub code: String,
    /// Human-readable reason.
    pub message: String,
}

/// Error response body shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    /// Always `false`.
    pub success: bool,
    pub message: String,
    /// Per-field errors, present for validation and file failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiFieldError>,
    /// Seconds until the client may retry, present when rate limited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl ApiErrorResponse {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            errors: Vec::new(),
            retry_after_secs: None,
        }
    }

    #[must_use]
    pub fn with_errors(mut self, errors: Vec<ApiFieldError>) -> Self {
        self.errors = errors;
        self
    }

    #[must_use]
    pub const fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after_secs = Some(secs);
        self
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// The accepted disaster types and severities, in display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiReportTypes {
    pub types: Vec<DisasterType>,
    pub severities: Vec<Severity>,
}

impl Default for ApiReportTypes {
    fn default() -> Self {
        Self {
            types: DisasterType::all().to_vec(),
            severities: Severity::all().to_vec(),
        }
    }
}
