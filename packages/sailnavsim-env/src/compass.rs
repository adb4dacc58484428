use sailnavsim_types::GeoPos;

pub trait CompassProvider: Send + Sync {
    /// Magnetic declination in degrees at `pos`: add to a true bearing to get
    /// the magnetic bearing a boat's compass would read.
    fn declination(&self, pos: &GeoPos) -> f32;
}

/// Smoothly-varying stand-in for the real World Magnetic Model lookup:
/// declination grows with longitude distance from the (synthetic) agonic
/// line and tapers toward the poles, where it becomes directionless.
pub struct SyntheticCompass;

impl Default for SyntheticCompass {
    fn default() -> Self {
        Self
    }
}

impl SyntheticCompass {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CompassProvider for SyntheticCompass {
    fn declination(&self, pos: &GeoPos) -> f32 {
        let lon_term = (pos.lon.to_radians()).sin() * 20.0;
        let lat_damp = (1.0 - (pos.lat.abs() / 90.0).min(1.0) * 0.3) as f64;
        (lon_term * lat_damp) as f32
    }
}
