//! Geographic coordinate type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Coordinate`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CoordinateError {
    /// Latitude outside [-90, 90] or not finite.
    #[error("latitude must be within [-90, 90] (got {0})")]
    Latitude(f64),
    /// Longitude outside [-180, 180] or not finite.
    #[error("longitude must be within [-180, 180] (got {0})")]
    Longitude(f64),
}

/// A WGS-84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Create a coordinate from latitude and longitude in degrees.
    ///
    /// # Errors
    ///
    /// Returns an error if either component is out of range or not finite.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::Latitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::Longitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Unchecked wire shape of a [`Coordinate`].
#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.latitude, raw.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_out_of_range() {
        assert!(matches!(
            Coordinate::new(91.0, 0.0),
            Err(CoordinateError::Latitude(_))
        ));
        assert!(matches!(
            Coordinate::new(0.0, -180.5),
            Err(CoordinateError::Longitude(_))
        ));
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_accepts_bounds() {
        assert!(Coordinate::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn test_deserialize_validates_range() {
        let ok: Coordinate =
            serde_json::from_str(r#"{"latitude": 5.6037, "longitude": -0.187}"#).unwrap();
        assert!((ok.latitude() - 5.6037).abs() < f64::EPSILON);

        let err = serde_json::from_str::<Coordinate>(r#"{"latitude": 123.0, "longitude": 0.0}"#)
            .unwrap_err();
        assert!(err.to_string().contains("latitude must be within"));
    }
}
