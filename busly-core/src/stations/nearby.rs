//! Nearest stations to a position.

use crate::models::{GeoPoint, Station};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// How many stations the picker shows under "nearby".
pub const DEFAULT_NEARBY_LIMIT: usize = 10;

/// A station with its distance from the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyStation<'a> {
    pub station: &'a Station,
    pub distance_km: f64,
}

/// Great-circle distance between two points.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Up to `limit` stations closest to `origin`, nearest first.
///
/// Stations without both coordinates are skipped.
pub fn nearest(stations: &[Station], origin: GeoPoint, limit: usize) -> Vec<NearbyStation<'_>> {
    let mut ranked: Vec<NearbyStation<'_>> = stations
        .iter()
        .filter_map(|station| {
            let point = station.location.coordinates()?;
            Some(NearbyStation {
                station,
                distance_km: haversine_km(origin, point),
            })
        })
        .collect();

    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    ranked.truncate(limit);
    ranked
}
