use sailnavsim_types::GeoPos;
use std::time::{SystemTime, UNIX_EPOCH};

/// Right ascension / declination, in degrees.
#[derive(Debug, Clone, Copy)]
pub struct EquatorialCoord {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

/// Altitude / azimuth as seen by an observer, in degrees. Altitude is
/// measured from the horizon, azimuth clockwise from true north.
#[derive(Debug, Clone, Copy)]
pub struct HorizontalCoord {
    pub altitude_deg: f64,
    pub azimuth_deg: f64,
}

/// A named body with a fixed (or slowly-computed) equatorial position.
#[derive(Debug, Clone, Copy)]
pub struct CelestialBody {
    pub name: &'static str,
    pub is_sun: bool,
}

pub trait CelestialProvider: Send + Sync {
    /// Sun's horizontal position as seen from `pos` at the current time.
    fn sun_position(&self, pos: &GeoPos) -> HorizontalCoord;

    /// Horizontal positions of the fixed-star catalog as seen from `pos` at
    /// the current time, paired with each star's name.
    fn star_positions(&self, pos: &GeoPos) -> Vec<(&'static str, HorizontalCoord)>;
}

/// Low-precision solar ephemeris plus a small fixed-star catalog, standing in
/// for a full almanac. Accurate to a few degrees, which is plenty for
/// deciding "is a sight obtainable" rather than producing a real fix.
pub struct SyntheticCelestial {
    epoch: SystemTime,
    stars: Vec<(&'static str, EquatorialCoord)>,
}

impl Default for SyntheticCelestial {
    fn default() -> Self {
        Self {
            epoch: UNIX_EPOCH,
            stars: vec![
                ("Sirius", EquatorialCoord { ra_deg: 101.287, dec_deg: -16.716 }),
                ("Canopus", EquatorialCoord { ra_deg: 95.988, dec_deg: -52.696 }),
                ("Arcturus", EquatorialCoord { ra_deg: 213.915, dec_deg: 19.182 }),
                ("Vega", EquatorialCoord { ra_deg: 279.234, dec_deg: 38.784 }),
                ("Capella", EquatorialCoord { ra_deg: 79.172, dec_deg: 45.998 }),
                ("Rigel", EquatorialCoord { ra_deg: 78.634, dec_deg: -8.202 }),
                ("Procyon", EquatorialCoord { ra_deg: 114.825, dec_deg: 5.225 }),
                ("Betelgeuse", EquatorialCoord { ra_deg: 88.793, dec_deg: 7.407 }),
                ("Achernar", EquatorialCoord { ra_deg: 24.429, dec_deg: -57.237 }),
                ("Polaris", EquatorialCoord { ra_deg: 37.955, dec_deg: 89.264 }),
            ],
        }
    }
}

impl SyntheticCelestial {
    pub fn new() -> Self {
        Self::default()
    }

    fn days_since_epoch(&self) -> f64 {
        SystemTime::now()
            .duration_since(self.epoch)
            .unwrap_or_default()
            .as_secs_f64()
            / 86400.0
    }

    /// Low-precision solar equatorial position (Meeus ch. 25 simplified).
    fn sun_equatorial(&self, days: f64) -> EquatorialCoord {
        let mean_lon = (280.460 + 0.9856474 * days).rem_euclid(360.0);
        let mean_anom = (357.528 + 0.9856003 * days).rem_euclid(360.0).to_radians();
        let ecl_lon = mean_lon
            + 1.915 * mean_anom.sin()
            + 0.020 * (2.0 * mean_anom).sin();
        let ecl_lon_rad = ecl_lon.to_radians();
        let obliquity = 23.439_f64.to_radians();

        let ra = (obliquity.cos() * ecl_lon_rad.sin())
            .atan2(ecl_lon_rad.cos())
            .to_degrees()
            .rem_euclid(360.0);
        let dec = (obliquity.sin() * ecl_lon_rad.sin()).asin().to_degrees();

        EquatorialCoord { ra_deg: ra, dec_deg: dec }
    }

    /// Greenwich apparent sidereal time in degrees, low precision.
    fn gst_deg(&self, days: f64) -> f64 {
        (280.46061837 + 360.98564736629 * days).rem_euclid(360.0)
    }

    fn to_horizontal(&self, eq: EquatorialCoord, pos: &GeoPos, days: f64) -> HorizontalCoord {
        let lst = (self.gst_deg(days) + pos.lon).rem_euclid(360.0);
        let hour_angle = (lst - eq.ra_deg).rem_euclid(360.0).to_radians();
        let lat = pos.lat.to_radians();
        let dec = eq.dec_deg.to_radians();

        let alt = (lat.sin() * dec.sin() + lat.cos() * dec.cos() * hour_angle.cos()).asin();
        let az_y = -hour_angle.sin();
        let az_x = dec.tan() * lat.cos() - lat.sin() * hour_angle.cos();
        let az = az_y.atan2(az_x).to_degrees().rem_euclid(360.0);

        HorizontalCoord {
            altitude_deg: alt.to_degrees(),
            azimuth_deg: az,
        }
    }
}

impl CelestialProvider for SyntheticCelestial {
    fn sun_position(&self, pos: &GeoPos) -> HorizontalCoord {
        let days = self.days_since_epoch();
        let eq = self.sun_equatorial(days);
        self.to_horizontal(eq, pos, days)
    }

    fn star_positions(&self, pos: &GeoPos) -> Vec<(&'static str, HorizontalCoord)> {
        let days = self.days_since_epoch();
        self.stars
            .iter()
            .map(|&(name, eq)| (name, self.to_horizontal(eq, pos, days)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sun_altitude_within_valid_range() {
        let celestial = SyntheticCelestial::new();
        let pos = GeoPos::new(10.0, 20.0);
        let sun = celestial.sun_position(&pos);
        assert!(sun.altitude_deg >= -90.0 && sun.altitude_deg <= 90.0);
        assert!(sun.azimuth_deg >= 0.0 && sun.azimuth_deg < 360.0);
    }

    #[test]
    fn star_catalog_nonempty() {
        let celestial = SyntheticCelestial::new();
        let pos = GeoPos::new(0.0, 0.0);
        assert!(!celestial.star_positions(&pos).is_empty());
    }
}
