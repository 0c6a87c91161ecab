//! Great-circle math backing the travel-time estimate.

use crate::types::Coordinates;

/// Mean Earth radius in metres (IUGG).
const MEAN_EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance in metres between two WGS84 points.
///
/// Haversine form with an `atan2` arc, which stays numerically stable even
/// for near-antipodal input. Good to well under a percent at the scales a
/// field-service territory spans, which is all the estimate needs.
pub fn great_circle_metres(from: &Coordinates, to: &Coordinates) -> f64 {
    let lat_from = from.lat.to_radians();
    let lat_to = to.lat.to_radians();
    let half_dlat = (lat_to - lat_from) / 2.0;
    let half_dlng = (to.lng - from.lng).to_radians() / 2.0;

    let chord = half_dlat.sin().powi(2) + lat_from.cos() * lat_to.cos() * half_dlng.sin().powi(2);
    let arc = 2.0 * chord.sqrt().atan2((1.0 - chord).sqrt());

    MEAN_EARTH_RADIUS_M * arc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_points_are_zero_metres() {
        let prague = Coordinates { lat: 50.0755, lng: 14.4378 };
        assert!(great_circle_metres(&prague, &prague).abs() < 1e-6);
    }

    #[test]
    fn prague_to_brno_is_about_185_km() {
        let prague = Coordinates { lat: 50.0755, lng: 14.4378 };
        let brno = Coordinates { lat: 49.1951, lng: 16.6068 };
        let metres = great_circle_metres(&prague, &brno);
        assert!(
            metres > 170_000.0 && metres < 200_000.0,
            "got {:.1} km",
            metres / 1000.0
        );
    }

    #[test]
    fn distance_is_symmetric() {
        let ostrava = Coordinates { lat: 49.8209, lng: 18.2625 };
        let brno = Coordinates { lat: 49.1951, lng: 16.6068 };
        let there = great_circle_metres(&brno, &ostrava);
        let back = great_circle_metres(&ostrava, &brno);
        assert!((there - back).abs() < 1e-6);
    }
}
