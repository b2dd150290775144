//! Geodesy and device location.

mod distance;
mod locator;

pub use distance::{EARTH_RADIUS_METERS, distance_meters, geodesic_meters, haversine_meters};
pub use locator::{
    FixedLocator, Geolocation, LocateOptions, LocationError, Locator, UnsupportedLocator,
};
