use std::f64::consts::PI;

/// Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A point given as (longitude, latitude) in degrees.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Half versed sine.
fn haversin(angle: f64) -> f64 {
    (angle / 2.0).sin().powi(2)
}

/// Great-circle distance using the haversine formula.
/// Input lon/lat in degrees. Output in meters.
pub fn haversine_meters(a: LonLat, b: LonLat) -> f64 {
    let (lon1, lat1, lon2, lat2) = (
        a.lon.to_radians(),
        a.lat.to_radians(),
        b.lon.to_radians(),
        b.lat.to_radians(),
    );
    let h = haversin(lat1 - lat2) + lat1.cos() * lat2.cos() * haversin(lon1 - lon2);
    // Rounding can push h a hair past 1 for antipodal points.
    2.0 * EARTH_RADIUS_M * h.min(1.0).sqrt().asin()
}

pub fn haversine_km(a: LonLat, b: LonLat) -> f64 {
    haversine_meters(a, b) / 1000.0
}

/// City-scale distance in meters: flat-earth approximation with longitude
/// compressed by the cosine of the mean latitude. Cheaper than haversine and
/// accurate within a few kilometres.
pub fn geodist(a: LonLat, b: LonLat) -> f64 {
    let lat_factor = ((a.lat + b.lat) / 2.0).to_radians().cos();
    let lon_delta = (a.lon - b.lon) * lat_factor;
    let lat_delta = a.lat - b.lat;
    lon_delta.hypot(lat_delta) * EARTH_RADIUS_M * (PI / 180.0)
}

/// Heading in degrees when travelling from `from` to `to`, with
/// 0 = east, 90 = north, +/-180 = west, -90 = south.
pub fn geodir(from: LonLat, to: LonLat) -> f64 {
    let lat_factor = ((from.lat + to.lat) / 2.0).to_radians().cos();
    let lon_delta = (to.lon - from.lon) * lat_factor;
    let lat_delta = to.lat - from.lat;
    lat_delta.atan2(lon_delta).to_degrees()
}

/// Closest point of an eight-point compass rose for a `geodir` angle.
pub fn compass_name(angle: f64) -> &'static str {
    const NAMES: [&str; 8] = ["E", "NE", "N", "NW", "W", "SW", "S", "SE"];
    let sector = (angle * 8.0 / 360.0).round() as i64;
    NAMES[sector.rem_euclid(8) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geodist_close_to_haversine_in_city() {
        let a = LonLat::new(-8.61, 41.14);
        let b = LonLat::new(-8.58, 41.17);
        let h = haversine_meters(a, b);
        assert!((geodist(a, b) - h).abs() < 5.0);
    }

    #[test]
    fn compass_points() {
        assert_eq!(compass_name(0.0), "E");
        assert_eq!(compass_name(90.0), "N");
        assert_eq!(compass_name(180.0), "W");
        assert_eq!(compass_name(-180.0), "W");
        assert_eq!(compass_name(-90.0), "S");
        assert_eq!(compass_name(-45.0), "SE");
    }

    #[test]
    fn geodir_moving_north() {
        let angle = geodir(LonLat::new(-8.6, 41.1), LonLat::new(-8.6, 41.2));
        assert!((angle - 90.0).abs() < 1e-9);
    }
}
