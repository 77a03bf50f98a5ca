//! Station picker helpers: text search and proximity ranking.

mod nearby;
mod search;

pub use nearby::{haversine_km, nearest, NearbyStation, DEFAULT_NEARBY_LIMIT, EARTH_RADIUS_KM};
pub use search::{fuzzy_search, MATCH_THRESHOLD};
