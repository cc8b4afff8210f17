//! Great-circle distance on the WGS-84 mean sphere.
//!
//! All functions are pure and total. Invalid inputs (NaN, out-of-range
//! degrees) propagate NaN instead of failing; callers validate coordinates
//! with [`Coordinate::validate`] before they reach the evaluator.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Distance in meters to `other`.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance_meters(self.lat, self.lng, other.lat, other.lng)
    }

    /// Checks that both components are finite and inside WGS-84 ranges.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("lat", self.lat, -90.0, 90.0)?;
        check_range("lng", self.lng, -180.0, 180.0)
    }
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Haversine distance in meters between two points given in degrees.
pub fn distance_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` a hair outside [0, 1]; clamp keeps NaN.
    let c = 2.0 * a.sqrt().clamp(0.0, 1.0).asin();

    EARTH_RADIUS_METERS * c
}

/// Renders a distance for display: whole meters below 1 km, otherwise
/// kilometers with one decimal.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round())
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn same_point_is_zero() {
        assert_eq!(distance_meters(48.8566, 2.3522, 48.8566, 2.3522), 0.0);
    }

    #[test]
    fn tenth_of_a_millidegree_on_equator_is_about_100m() {
        let d = distance_meters(0.0, 0.0, 0.0, 0.0009);
        assert!(d > 100.0 && d < 100.2, "got {d}");
    }

    #[test]
    fn paris_to_london() {
        let d = distance_meters(48.8566, 2.3522, 51.5074, -0.1278);
        assert!((d - 343_556.0).abs() < 1_000.0, "got {d}");
    }

    #[test]
    fn antipodal_points_are_half_circumference() {
        let d = distance_meters(0.0, 0.0, 0.0, 180.0);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1e-6);
    }

    #[test]
    fn nan_propagates() {
        assert!(distance_meters(f64::NAN, 0.0, 0.0, 0.0).is_nan());
        assert!(distance_meters(0.0, 0.0, 0.0, f64::NAN).is_nan());
        assert!(Coordinate::new(f64::NAN, 0.0)
            .distance_to(&Coordinate::new(0.0, 0.0))
            .is_nan());
    }

    #[test]
    fn format_distance_switches_units_at_one_km() {
        assert_eq!(format_distance(0.0), "0m");
        assert_eq!(format_distance(99.6), "100m");
        assert_eq!(format_distance(999.4), "999m");
        assert_eq!(format_distance(1000.0), "1.0km");
        assert_eq!(format_distance(12_345.0), "12.3km");
    }

    #[test]
    fn validate_rejects_out_of_range() {
        assert!(Coordinate::new(91.0, 0.0).validate().is_err());
        assert!(Coordinate::new(0.0, -180.5).validate().is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).validate().is_err());
        assert!(Coordinate::new(-90.0, 180.0).validate().is_ok());
    }

    proptest! {
        #[test]
        fn distance_is_symmetric(
            lat1 in -90.0f64..90.0, lng1 in -180.0f64..180.0,
            lat2 in -90.0f64..90.0, lng2 in -180.0f64..180.0,
        ) {
            let ab = distance_meters(lat1, lng1, lat2, lng2);
            let ba = distance_meters(lat2, lng2, lat1, lng1);
            prop_assert!((ab - ba).abs() < 1e-6);
            prop_assert!(ab >= 0.0);
        }

        #[test]
        fn distance_to_self_is_zero(lat in -90.0f64..90.0, lng in -180.0f64..180.0) {
            prop_assert_eq!(distance_meters(lat, lng, lat, lng), 0.0);
        }
    }
}
