//! Submission and proximity-query validation rules.

use std::str::FromStr;

use disaster_reports_report_models::{DisasterType, GeoPoint, Severity};

use crate::{ValidationErrors, ValidationIssue};

/// Minimum length, in characters, of a raw description.
pub const MIN_DESCRIPTION_LENGTH: usize = 10;

/// Radius used when a proximity query does not specify one, in meters.
pub const DEFAULT_RADIUS_METERS: f64 = 5000.0;

const LATITUDE_BOUND: i32 = 90;
const LONGITUDE_BOUND: i32 = 180;

/// Raw report submission fields as received from the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionInput {
    /// Disaster type literal (`type` on the wire).
    pub disaster_type: Option<String>,
    /// Severity literal.
    pub severity: Option<String>,
    /// Unsanitized description.
    pub description: Option<String>,
    /// Latitude as a decimal string.
    pub latitude: Option<String>,
    /// Longitude as a decimal string.
    pub longitude: Option<String>,
}

/// Raw proximity query parameters as received from the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProximityQueryInput {
    /// Latitude as a decimal string.
    pub lat: Option<String>,
    /// Longitude as a decimal string.
    pub lng: Option<String>,
    /// Search radius in meters as a decimal string.
    pub radius: Option<String>,
}

/// A submission that passed validation. The description is still raw.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSubmission {
    pub disaster_type: DisasterType,
    pub severity: Severity,
    pub description: String,
    pub location: GeoPoint,
}

/// A proximity query that passed validation, with the default radius
/// already applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedQuery {
    pub point: GeoPoint,
    pub radius_meters: f64,
}

/// Validates a report submission.
///
/// # Errors
///
/// Returns [`ValidationErrors`] naming every field that fails its rule.
pub fn validate_submission(
    input: &SubmissionInput,
) -> Result<ValidatedSubmission, ValidationErrors> {
    let mut issues = Vec::new();

    let disaster_type = parse_enum::<DisasterType>(
        "type",
        input.disaster_type.as_deref(),
        literals(DisasterType::all()),
        &mut issues,
    );
    let severity = parse_enum::<Severity>(
        "severity",
        input.severity.as_deref(),
        literals(Severity::all()),
        &mut issues,
    );

    let description = input.description.as_deref().unwrap_or_default();
    if description.chars().count() < MIN_DESCRIPTION_LENGTH {
        issues.push(ValidationIssue::TooShort {
            field: "description",
            min: MIN_DESCRIPTION_LENGTH,
        });
    }

    let latitude = parse_bounded(
        "latitude",
        input.latitude.as_deref(),
        LATITUDE_BOUND,
        &mut issues,
    );
    let longitude = parse_bounded(
        "longitude",
        input.longitude.as_deref(),
        LONGITUDE_BOUND,
        &mut issues,
    );

    match (disaster_type, severity, latitude, longitude) {
        (Some(disaster_type), Some(severity), Some(latitude), Some(longitude))
            if issues.is_empty() =>
        {
            Ok(ValidatedSubmission {
                disaster_type,
                severity,
                description: description.to_string(),
                location: GeoPoint::new(longitude, latitude),
            })
        }
        _ => Err(ValidationErrors::new(issues)),
    }
}

/// Validates proximity query parameters and applies the default radius.
///
/// An absent or empty `radius` falls back to [`DEFAULT_RADIUS_METERS`].
///
/// # Errors
///
/// Returns [`ValidationErrors`] naming every field that fails its rule.
pub fn validate_proximity_query(
    input: &ProximityQueryInput,
) -> Result<ValidatedQuery, ValidationErrors> {
    let mut issues = Vec::new();

    let lat = parse_bounded("lat", input.lat.as_deref(), LATITUDE_BOUND, &mut issues);
    let lng = parse_bounded("lng", input.lng.as_deref(), LONGITUDE_BOUND, &mut issues);

    let radius = match input.radius.as_deref().map(str::trim) {
        None | Some("") => Some(DEFAULT_RADIUS_METERS),
        Some(raw) => match raw.parse::<f64>() {
            Ok(r) if r.is_finite() && r > 0.0 => Some(r),
            _ => {
                issues.push(ValidationIssue::NotPositive { field: "radius" });
                None
            }
        },
    };

    match (lat, lng, radius) {
        (Some(lat), Some(lng), Some(radius_meters)) if issues.is_empty() => Ok(ValidatedQuery {
            point: GeoPoint::new(lng, lat),
            radius_meters,
        }),
        _ => Err(ValidationErrors::new(issues)),
    }
}

fn literals<T: AsRef<str>>(all: &'static [T]) -> Vec<&'static str> {
    all.iter().map(AsRef::as_ref).collect()
}

fn parse_enum<T: FromStr>(
    field: &'static str,
    raw: Option<&str>,
    expected: Vec<&'static str>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<T> {
    let parsed = raw.and_then(|s| s.parse::<T>().ok());
    if parsed.is_none() {
        issues.push(ValidationIssue::InvalidEnum { field, expected });
    }
    parsed
}

/// Parses a finite number within `[-bound, bound]`.
fn parse_bounded(
    field: &'static str,
    raw: Option<&str>,
    bound: i32,
    issues: &mut Vec<ValidationIssue>,
) -> Option<f64> {
    let limit = f64::from(bound);
    let parsed = raw
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && (-limit..=limit).contains(v));

    if parsed.is_none() {
        issues.push(ValidationIssue::OutOfRange {
            field,
            min: -bound,
            max: bound,
        });
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(
        disaster_type: &str,
        severity: &str,
        description: &str,
        latitude: &str,
        longitude: &str,
    ) -> SubmissionInput {
        SubmissionInput {
            disaster_type: Some(disaster_type.to_string()),
            severity: Some(severity.to_string()),
            description: Some(description.to_string()),
            latitude: Some(latitude.to_string()),
            longitude: Some(longitude.to_string()),
        }
    }

    fn query(lat: &str, lng: &str, radius: Option<&str>) -> ProximityQueryInput {
        ProximityQueryInput {
            lat: Some(lat.to_string()),
            lng: Some(lng.to_string()),
            radius: radius.map(ToString::to_string),
        }
    }

    #[test]
    fn accepts_valid_submission() {
        let input = submission(
            "flood",
            "high",
            "Water level rising fast near the river",
            "40.7128",
            "-74.0060",
        );
        let valid = validate_submission(&input).unwrap();
        assert_eq!(valid.disaster_type, DisasterType::Flood);
        assert_eq!(valid.severity, Severity::High);
        assert_eq!(valid.location.latitude, 40.7128);
        assert_eq!(valid.location.longitude, -74.0060);
    }

    #[test]
    fn short_description_names_description() {
        let input = submission("flood", "high", "short", "40.7128", "-74.0060");
        let err = validate_submission(&input).unwrap_err();
        assert_eq!(err.fields(), vec!["description"]);
        assert_eq!(
            err.issues()[0],
            ValidationIssue::TooShort {
                field: "description",
                min: 10
            }
        );
    }

    #[test]
    fn description_length_counts_characters_not_bytes() {
        // 9 characters, 18 bytes
        let input = submission("storm", "low", "ééééééééé", "0", "0");
        assert!(
            validate_submission(&input)
                .unwrap_err()
                .contains_field("description")
        );

        let input = submission("storm", "low", "éééééééééé", "0", "0");
        assert!(validate_submission(&input).is_ok());
    }

    #[test]
    fn enums_are_case_sensitive() {
        let input = submission("Flood", "HIGH", "Water level rising fast", "0", "0");
        let err = validate_submission(&input).unwrap_err();
        assert_eq!(err.fields(), vec!["type", "severity"]);
    }

    #[test]
    fn coordinate_bounds_are_inclusive() {
        for (lat, lng) in [("90", "180"), ("-90", "-180"), ("0", "0")] {
            let input = submission("earthquake", "critical", "Buildings shaking", lat, lng);
            assert!(validate_submission(&input).is_ok(), "{lat},{lng}");
        }
    }

    #[test]
    fn out_of_range_coordinates_name_each_field() {
        let input = submission("earthquake", "critical", "Buildings shaking", "90.01", "0");
        assert_eq!(validate_submission(&input).unwrap_err().fields(), vec!["latitude"]);

        let input = submission("earthquake", "critical", "Buildings shaking", "0", "-180.5");
        assert_eq!(
            validate_submission(&input).unwrap_err().fields(),
            vec!["longitude"]
        );

        let input = submission("earthquake", "critical", "Buildings shaking", "-91", "181");
        assert_eq!(
            validate_submission(&input).unwrap_err().fields(),
            vec!["latitude", "longitude"]
        );
    }

    #[test]
    fn non_finite_or_garbage_numbers_are_out_of_range() {
        for bad in ["NaN", "inf", "-infinity", "abc", "", "12abc"] {
            let input = submission("landslide", "medium", "Mud across the road", bad, "0");
            assert!(
                validate_submission(&input)
                    .unwrap_err()
                    .contains_field("latitude"),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn empty_input_names_every_field() {
        let err = validate_submission(&SubmissionInput::default()).unwrap_err();
        assert_eq!(
            err.fields(),
            vec!["type", "severity", "description", "latitude", "longitude"]
        );
    }

    #[test]
    fn query_defaults_radius() {
        let q = validate_proximity_query(&query("40.7128", "-74.0060", None)).unwrap();
        assert_eq!(q.radius_meters, DEFAULT_RADIUS_METERS);
        assert_eq!(q.point, GeoPoint::new(-74.0060, 40.7128));

        let q = validate_proximity_query(&query("40.7128", "-74.0060", Some(""))).unwrap();
        assert_eq!(q.radius_meters, DEFAULT_RADIUS_METERS);
    }

    #[test]
    fn query_rejects_non_positive_radius() {
        for bad in ["0", "-5", "NaN", "inf", "wide"] {
            let err = validate_proximity_query(&query("0", "0", Some(bad))).unwrap_err();
            assert_eq!(err.fields(), vec!["radius"], "{bad:?}");
        }
        let q = validate_proximity_query(&query("0", "0", Some("0.5"))).unwrap();
        assert_eq!(q.radius_meters, 0.5);
    }

    #[test]
    fn query_names_lat_and_lng() {
        let err = validate_proximity_query(&query("95", "200", Some("1000"))).unwrap_err();
        assert_eq!(err.fields(), vec!["lat", "lng"]);

        let err = validate_proximity_query(&ProximityQueryInput::default()).unwrap_err();
        assert_eq!(err.fields(), vec!["lat", "lng"]);
    }
}
