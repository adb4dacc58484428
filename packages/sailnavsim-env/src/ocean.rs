use sailnavsim_types::{GeoPos, GeoVec};
use std::time::{SystemTime, UNIX_EPOCH};

/// One ocean sample: current vector, surface temperature, salinity and ice
/// cover percent. `None` from the provider means "no ocean data here" (land,
/// or outside model coverage), matching the real service's validity bit.
#[derive(Debug, Clone, Copy)]
pub struct OceanSample {
    pub current: GeoVec,
    pub surface_temp: f32,
    pub salinity: f32,
    pub ice: f32,
}

pub trait OceanProvider: Send + Sync {
    fn get(&self, pos: &GeoPos) -> Option<OceanSample>;
}

/// Synthetic ocean: a weak, slowly rotating gyre-like current everywhere
/// water is assumed to exist, with polar ice cover above 70 degrees latitude.
pub struct SyntheticOcean {
    epoch: SystemTime,
}

impl Default for SyntheticOcean {
    fn default() -> Self {
        Self { epoch: UNIX_EPOCH }
    }
}

impl SyntheticOcean {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OceanProvider for SyntheticOcean {
    fn get(&self, pos: &GeoPos) -> Option<OceanSample> {
        let t = SystemTime::now()
            .duration_since(self.epoch)
            .unwrap_or_default()
            .as_secs_f64()
            / 3600.0;

        let lat_rad = pos.lat.to_radians();
        let angle = 180.0 + 40.0 * (pos.lon.to_radians() + t * 0.05).sin();
        let mag = 0.2 + 0.25 * lat_rad.cos().abs();

        let ice = if pos.lat.abs() > 70.0 {
            ((pos.lat.abs() - 70.0) / 20.0 * 100.0).clamp(0.0, 100.0) as f32
        } else {
            0.0
        };

        Some(OceanSample {
            current: GeoVec::new(angle, mag),
            surface_temp: 20.0 - 0.35 * pos.lat.abs() as f32,
            salinity: 35.0,
            ice,
        })
    }
}
