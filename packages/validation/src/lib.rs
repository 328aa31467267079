#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Field validation and description sanitization for disaster reports.
//!
//! Validation runs on the fields exactly as received from the client
//! (numbers arrive as decimal strings) and collects every violation so the
//! error payload names each invalid field. Sanitization is a separate step
//! applied to the description after validation; the length rule is checked
//! against the raw text, not the sanitized text.

pub mod sanitize;
pub mod validator;

pub use sanitize::sanitize;
pub use validator::{
    DEFAULT_RADIUS_METERS, MIN_DESCRIPTION_LENGTH, ProximityQueryInput, SubmissionInput,
    ValidatedQuery, ValidatedSubmission, validate_proximity_query, validate_submission,
};

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationIssue {
    /// Value is not one of the accepted literals.
    #[error("{field} must be one of: {}", expected.join(", "))]
    InvalidEnum {
        /// Name of the offending field.
        field: &'static str,
        /// Accepted literals.
        expected: Vec<&'static str>,
    },

    /// Text is shorter than the required minimum.
    #[error("{field} must be at least {min} characters")]
    TooShort {
        /// Name of the offending field.
        field: &'static str,
        /// Minimum length in characters.
        min: usize,
    },

    /// Value is missing, not a finite number, or outside its bounds.
    #[error("{field} must be a number between {min} and {max}")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Inclusive lower bound.
        min: i32,
        /// Inclusive upper bound.
        max: i32,
    },

    /// Value must be a positive finite number.
    #[error("{field} must be a positive number")]
    NotPositive {
        /// Name of the offending field.
        field: &'static str,
    },
}

impl ValidationIssue {
    /// Returns the name of the field this issue refers to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::InvalidEnum { field, .. }
            | Self::TooShort { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::NotPositive { field } => field,
        }
    }

    /// Returns a stable machine-readable code for this issue.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidEnum { .. } => "invalid_enum",
            Self::TooShort { .. } => "too_short",
            Self::OutOfRange { .. } => "out_of_range",
            Self::NotPositive { .. } => "not_positive",
        }
    }
}

/// All validation failures found in one request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation failed for: {}", self.fields().join(", "))]
pub struct ValidationErrors {
    issues: Vec<ValidationIssue>,
}

impl ValidationErrors {
    /// Returns the individual issues, in field order.
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Returns the names of all invalid fields.
    #[must_use]
    pub fn fields(&self) -> Vec<&'static str> {
        self.issues.iter().map(ValidationIssue::field).collect()
    }

    /// Whether `field` is among the invalid fields.
    #[must_use]
    pub fn contains_field(&self, field: &str) -> bool {
        self.issues.iter().any(|issue| issue.field() == field)
    }

    pub(crate) const fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }
}
