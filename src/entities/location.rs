use geo_types::Point;
use serde::{Deserialize, Serialize};

use crate::error::{validation_error, Error};

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Result<Self, Error> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(validation_error("latitude must be within [-90, 90]"));
        }

        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(validation_error("longitude must be within [-180, 180]"));
        }

        Ok(Self { lat, lng })
    }

    /// Great-circle distance in kilometres.
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        let from: Point<f64> = (*self).into();
        let to: Point<f64> = (*other).into();

        let d_lat = (to.y() - from.y()).to_radians();
        let d_lng = (to.x() - from.x()).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + from.y().to_radians().cos() * to.y().to_radians().cos() * (d_lng / 2.0).sin().powi(2);

        EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

impl From<Coordinates> for Point<f64> {
    fn from(coordinates: Coordinates) -> Self {
        Point::new(coordinates.lng, coordinates.lat)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub description: String,
    pub coordinates: Coordinates,
}

impl Location {
    pub fn new(coordinates: Coordinates, description: String) -> Self {
        Self {
            description,
            coordinates,
        }
    }
}

#[test]
fn coordinates_reject_out_of_range() {
    assert!(Coordinates::new(91.0, 0.0).unwrap_err().is_validation_error());
    assert!(Coordinates::new(0.0, -180.5).unwrap_err().is_validation_error());
    assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    assert!(Coordinates::new(-8.05, -34.9).is_ok());
}

#[test]
fn distance_between_known_points() {
    let recife = Coordinates { lat: -8.0476, lng: -34.8770 };
    let olinda = Coordinates { lat: -8.0089, lng: -34.8553 };

    let km = recife.distance_km(&olinda);
    assert!((km - 4.9).abs() < 0.2, "got {}", km);
    assert_eq!(recife.distance_km(&recife), 0.0);
}
