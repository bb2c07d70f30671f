//! Great-circle distance between listing and requester locations.

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    /// Both halves must be present for a point to count as known.
    pub fn from_parts(lat: Option<f64>, lon: Option<f64>) -> Option<Self> {
        match (lat, lon) {
            (Some(lat), Some(lon)) => Some(Self { lat, lon }),
            _ => None,
        }
    }
}

/// Haversine distance in kilometres.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Checks that an optional coordinate pair is within WGS84 bounds.
pub fn validate(lat: Option<f64>, lon: Option<f64>) -> Result<(), String> {
    if let Some(lat) = lat {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err("lat must be between -90 and 90".to_string());
        }
    }
    if let Some(lon) = lon {
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err("lon must be between -180 and 180".to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn point(lat: f64, lon: f64) -> Coordinates {
        Coordinates { lat, lon }
    }

    #[test]
    fn same_point_is_zero() {
        assert_eq!(haversine_km(point(40.0, -73.0), point(40.0, -73.0)), 0.0);
    }

    #[test]
    fn nearby_points_are_about_140_metres_apart() {
        let d = haversine_km(point(40.0, -73.0), point(40.001, -73.001));
        assert!((0.13..0.15).contains(&d), "got {d}");
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = haversine_km(point(0.0, 0.0), point(1.0, 0.0));
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = point(51.5, -0.12);
        let b = point(48.85, 2.35);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
    }

    #[rstest]
    #[case(Some(1.0), None)]
    #[case(None, Some(1.0))]
    #[case(None, None)]
    fn half_a_point_is_unknown(#[case] lat: Option<f64>, #[case] lon: Option<f64>) {
        assert!(Coordinates::from_parts(lat, lon).is_none());
    }

    #[rstest]
    #[case(Some(91.0), None)]
    #[case(None, Some(-180.5))]
    #[case(Some(f64::NAN), Some(0.0))]
    fn rejects_out_of_range(#[case] lat: Option<f64>, #[case] lon: Option<f64>) {
        assert!(validate(lat, lon).is_err());
    }
}
