//! Land-proximity sampling test, used to decide whether a celestial sight's
//! horizon is obstructed by nearby land.

use sailnavsim_env::GeoInfoProvider;
use sailnavsim_types::GeoPos;

const MIN_RADIUS: f64 = 30.0;
const MAX_RADIUS: f64 = 31_000.0;
const MAX_SAMPLE_POINTS_ON_CIRCLE: i32 = 32;
const METRES_PER_DEGREE: f64 = 111_120.0;

/// True if `pos` is itself land, or if land is found by sampling concentric
/// circles out to `visibility` metres (capped at `MAX_RADIUS`).
pub fn is_approximately_near_visible_land(
    geo: &dyn GeoInfoProvider,
    pos: &GeoPos,
    visibility: f32,
) -> bool {
    if !geo.is_water(pos) {
        return true;
    }

    let visibility = visibility as f64;
    let mut n: i32 = 4;
    let mut r = MIN_RADIUS;
    while r <= visibility && r <= MAX_RADIUS {
        if is_land_found_on_circle(geo, pos, r, n) {
            return true;
        }
        if n < MAX_SAMPLE_POINTS_ON_CIRCLE {
            n *= 2;
        }
        r *= 2.0;
    }

    if visibility > MIN_RADIUS {
        if is_land_found_on_circle(geo, pos, visibility, n) {
            return true;
        }
    }

    false
}

fn is_land_found_on_circle(geo: &dyn GeoInfoProvider, pos: &GeoPos, r: f64, n: i32) -> bool {
    let cos_lat = pos.lat.to_radians().cos();

    for i in 0..n {
        let theta = i as f64 * 2.0 * std::f64::consts::PI / n as f64;

        let mut lat = pos.lat + (r * theta.cos() / METRES_PER_DEGREE);
        let mut lon = pos.lon + (r * theta.sin() / (METRES_PER_DEGREE * cos_lat));

        if lat > 90.0 {
            lat = 90.0;
        } else if lat < -90.0 {
            lat = -90.0;
        }

        let mut lon_modified = false;
        if lon >= 180.0 {
            lon -= 360.0;
            lon_modified = true;
        } else if lon < -180.0 {
            lon += 360.0;
            lon_modified = true;
        }

        if lon_modified && (lon < -180.0 || lon >= 180.0) {
            // Near a pole, the recovered longitude is still nonsensical;
            // fall back to a hemisphere-wide assumption: northern is all
            // water, southern is all land.
            return lat < 0.0;
        }

        let p = GeoPos { lat, lon };
        if !geo.is_water(&p) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use sailnavsim_env::SyntheticGeoInfo;

    #[test]
    fn position_on_land_is_immediately_near_land() {
        let geo = SyntheticGeoInfo::new();
        // Inside the synthetic continent band.
        let pos = GeoPos::new(40.0, 10.0);
        assert!(is_approximately_near_visible_land(&geo, &pos, 1000.0));
    }

    #[test]
    fn open_ocean_far_from_land_is_not_near_land() {
        let geo = SyntheticGeoInfo::new();
        let pos = GeoPos::new(0.0, -150.0);
        assert!(!is_approximately_near_visible_land(&geo, &pos, 5000.0));
    }
}
