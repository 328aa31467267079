#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Disaster report taxonomy, severity levels, and core report types.
//!
//! This crate defines the canonical report shape shared by the validation,
//! storage, ingestion, and API layers. Wire names for [`DisasterType`] and
//! [`Severity`] are lowercase and matched case-sensitively.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Kind of disaster being reported.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DisasterType {
    /// Ground shaking from seismic activity
    Earthquake,
    /// Severe weather (wind, hail, lightning)
    Storm,
    /// Rising or overflowing water
    Flood,
    /// Slope failure, mudslide, or rockfall
    Landslide,
}

impl DisasterType {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Earthquake, Self::Storm, Self::Flood, Self::Landslide]
    }
}

/// Reported severity of a disaster, from low to critical.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    /// Level 1: Minor impact, no immediate danger
    Low = 1,
    /// Level 2: Noticeable damage or disruption
    Medium = 2,
    /// Level 3: Significant damage, people at risk
    High = 3,
    /// Level 4: Life-threatening, immediate response needed
    Critical = 4,
}

impl Severity {
    /// Returns all variants of this enum, lowest first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Low, Self::Medium, Self::High, Self::Critical]
    }
}

/// A WGS84 point.
///
/// Field and constructor order is longitude first, matching the `GeoJSON`
/// `[longitude, latitude]` convention used by storage and the API.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Longitude in degrees, `[-180, 180]`.
    pub longitude: f64,
    /// Latitude in degrees, `[-90, 90]`.
    pub latitude: f64,
}

impl GeoPoint {
    /// Creates a point from longitude and latitude (in that order).
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Returns the coordinates as `[longitude, latitude]`.
    #[must_use]
    pub const fn coordinates(self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

/// Store-assigned report identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    /// Wraps an identifier produced by a store.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated, sanitized report that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    /// Kind of disaster.
    pub disaster_type: DisasterType,
    /// Reported severity.
    pub severity: Severity,
    /// Sanitized free-text description.
    pub description: String,
    /// Where the disaster was observed.
    pub location: GeoPoint,
    /// URL of an uploaded photo, if any.
    pub image_url: Option<String>,
}

/// A persisted disaster report.
///
/// Immutable after creation except for `verified`, which is owned by an
/// out-of-band moderation process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Unique identifier, never reused.
    pub id: ReportId,
    /// Kind of disaster.
    pub disaster_type: DisasterType,
    /// Reported severity.
    pub severity: Severity,
    /// Sanitized free-text description.
    pub description: String,
    /// Where the disaster was observed.
    pub location: GeoPoint,
    /// URL of an uploaded photo, if any.
    pub image_url: Option<String>,
    /// Whether a moderator has verified this report.
    pub verified: bool,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
}

impl Report {
    /// Builds a stored report from its validated payload and the
    /// store-assigned fields. New reports always start unverified.
    #[must_use]
    pub fn from_new(new: NewReport, id: ReportId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            disaster_type: new.disaster_type,
            severity: new.severity,
            description: new.description,
            location: new.location,
            image_url: new.image_url,
            verified: false,
            created_at,
        }
    }
}
