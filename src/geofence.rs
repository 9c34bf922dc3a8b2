//! Great-circle distance and circular zone membership.

use crate::model::location::Coordinates;
use crate::model::zone::GeofenceZone;

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters.
pub fn distance_meters(a: Coordinates, b: Coordinates) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // rounding can push h a hair above 1 for antipodal points
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

pub fn is_inside(point: Coordinates, zone: &GeofenceZone) -> bool {
    distance_meters(point, zone.center()) <= zone.radius
}

pub fn inside_any(point: Coordinates, zones: &[GeofenceZone]) -> bool {
    zones.iter().any(|z| is_inside(point, z))
}
