//! Pure fare and distance arithmetic.

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Splits `total_fare` evenly across `participant_count` people, rounding up
/// to the next whole currency unit so the split never under-collects.
///
/// A zero participant count returns `total_fare` unchanged.
pub fn compute_fare_per_person(total_fare: f64, participant_count: usize) -> f64 {
    if participant_count == 0 {
        return total_fare;
    }

    (total_fare / participant_count as f64).ceil()
}

/// Great-circle distance in kilometers between two points given in degrees.
pub fn compute_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    // rounding can push `a` a hair outside [0, 1] for antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}
