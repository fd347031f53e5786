//! Great-circle travel time estimation.
//!
//! All travel times in the solver derive from the haversine distance between
//! coordinate pairs, converted to whole minutes at an assumed driving speed.

/// Earth radius used by the haversine formula, in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Assumed driving speed expressed in meters per minute (20 km/h).
const METERS_PER_MINUTE: f64 = 333.33;

/// Compute the great-circle distance between two coordinate pairs in meters.
///
/// Inputs are latitude/longitude in degrees. The function is pure and
/// symmetric: `haversine_meters(a, b) == haversine_meters(b, a)`.
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lng1 = lng1.to_radians();
    let lat2 = lat2.to_radians();
    let lng2 = lng2.to_radians();

    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    c * EARTH_RADIUS_KM * 1000.0
}

/// Travel time in whole minutes between two coordinate pairs.
///
/// The distance is divided by the assumed speed and truncated, so short hops
/// between nearly identical coordinates round down to zero.
pub fn travel_minutes(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> i64 {
    (haversine_meters(lat1, lng1, lat2, lng2) / METERS_PER_MINUTE).floor() as i64
}
