#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial index for report locations.
//!
//! Points are stored in an R-tree keyed by `[longitude, latitude]`. A radius
//! search first narrows candidates with one or two lat/lng envelopes that
//! bound the search circle (two when the circle crosses the antimeridian),
//! then keeps only the candidates whose great-circle (haversine) distance
//! is within the radius.

use disaster_reports_report_models::GeoPoint;
use geo::{Distance, Haversine, Point};
use rstar::{AABB, RTree, RTreeObject};

/// Mean earth radius used by [`geo::Haversine`], in meters.
pub const EARTH_MEAN_RADIUS_METERS: f64 = 6_371_008.8;

/// Slack added to search envelopes so float rounding never excludes a
/// point the exact distance check would accept.
const ENVELOPE_MARGIN_DEGREES: f64 = 1e-6;

/// An indexed point with its caller-provided key.
struct IndexedPoint<K> {
    key: K,
    position: [f64; 2],
}

impl<K> RTreeObject for IndexedPoint<K> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// A point index answering "everything within R meters of P".
pub struct PointIndex<K> {
    tree: RTree<IndexedPoint<K>>,
}

impl<K> Default for PointIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> PointIndex<K> {
    #[must_use]
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Adds a point. Duplicate locations are allowed.
    pub fn insert(&mut self, point: GeoPoint, key: K) {
        self.tree.insert(IndexedPoint {
            key,
            position: point.coordinates(),
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Returns the keys of every point within `radius_meters` of `center`,
    /// in no particular order.
    #[must_use]
    pub fn within_radius(&self, center: GeoPoint, radius_meters: f64) -> Vec<&K> {
        let origin = Point::new(center.longitude, center.latitude);
        let mut hits = Vec::new();

        for envelope in search_envelopes(center, radius_meters) {
            for entry in self.tree.locate_in_envelope_intersecting(&envelope) {
                let [lng, lat] = entry.position;
                if Haversine.distance(origin, Point::new(lng, lat)) <= radius_meters {
                    hits.push(&entry.key);
                }
            }
        }

        log::trace!(
            "Radius search at ({}, {}) r={radius_meters}m: {} hits",
            center.longitude,
            center.latitude,
            hits.len()
        );

        hits
    }
}

/// Computes lat/lng envelopes that together contain the search circle.
///
/// Returns a single world-spanning longitude band when the circle reaches a
/// pole, and two envelopes when it crosses the antimeridian.
fn search_envelopes(center: GeoPoint, radius_meters: f64) -> Vec<AABB<[f64; 2]>> {
    let angular = radius_meters / EARTH_MEAN_RADIUS_METERS;
    let delta_lat = angular.to_degrees() + ENVELOPE_MARGIN_DEGREES;

    let min_lat = center.latitude - delta_lat;
    let max_lat = center.latitude + delta_lat;

    if min_lat <= -90.0 || max_lat >= 90.0 {
        return vec![AABB::from_corners(
            [-180.0, min_lat.max(-90.0)],
            [180.0, max_lat.min(90.0)],
        )];
    }

    // Widest longitude offset of the circle, reached away from the center
    // latitude on a sphere.
    let ratio = angular.sin() / center.latitude.to_radians().cos();
    if ratio >= 1.0 {
        return vec![AABB::from_corners([-180.0, min_lat], [180.0, max_lat])];
    }
    let delta_lng = ratio.asin().to_degrees() + ENVELOPE_MARGIN_DEGREES;

    let min_lng = center.longitude - delta_lng;
    let max_lng = center.longitude + delta_lng;

    if min_lng < -180.0 {
        vec![
            AABB::from_corners([min_lng + 360.0, min_lat], [180.0, max_lat]),
            AABB::from_corners([-180.0, min_lat], [max_lng, max_lat]),
        ]
    } else if max_lng > 180.0 {
        vec![
            AABB::from_corners([min_lng, min_lat], [180.0, max_lat]),
            AABB::from_corners([-180.0, min_lat], [max_lng - 360.0, max_lat]),
        ]
    } else {
        vec![AABB::from_corners([min_lng, min_lat], [max_lng, max_lat])]
    }
}
