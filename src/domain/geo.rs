//! Great-circle distance and circular geofence containment

use serde::Deserialize;

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
}

impl Point {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Circular fence around a center point
///
/// `close_radius_km` is the boundary beyond which the door must be closed;
/// `open_radius_km` is the boundary within which it must be open. Equal radii
/// give a single circle with two interpretations. A smaller open radius adds
/// a hysteresis band where no decision is taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fence {
    pub center: Point,
    pub close_radius_km: f64,
    pub open_radius_km: f64,
}

impl Fence {
    /// Single-boundary fence (open and close radius are the same)
    pub fn new(center: Point, radius_km: f64) -> Self {
        Self { center, close_radius_km: radius_km, open_radius_km: radius_km }
    }

    pub fn with_open_radius(mut self, open_radius_km: f64) -> Self {
        self.open_radius_km = open_radius_km;
        self
    }

    /// Outside the closing boundary
    pub fn beyond_close(&self, p: Point) -> bool {
        !within_fence(p, self.center, self.close_radius_km)
    }

    /// Inside (or on) the opening boundary
    pub fn within_open(&self, p: Point) -> bool {
        within_fence(p, self.center, self.open_radius_km)
    }
}

#[inline]
fn to_radians(degrees: f64) -> f64 {
    degrees * std::f64::consts::PI / 180.0
}

/// Haversine distance between two points in kilometers
pub fn distance(a: Point, b: Point) -> f64 {
    let lat1 = to_radians(a.latitude);
    let lat2 = to_radians(b.latitude);
    let dlat = to_radians(b.latitude - a.latitude);
    let dlon = to_radians(b.longitude - a.longitude);

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// True iff `p` lies within `radius_km` of `center`; the boundary counts as inside
pub fn within_fence(p: Point, center: Point, radius_km: f64) -> bool {
    distance(p, center) <= radius_km
}
