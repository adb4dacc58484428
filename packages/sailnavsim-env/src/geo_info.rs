use sailnavsim_types::GeoPos;

pub trait GeoInfoProvider: Send + Sync {
    fn is_water(&self, pos: &GeoPos) -> bool;
}

/// Synthetic land/water mask: a handful of coarse rectangular landmasses
/// standing in for the real coastline raster. Good enough to exercise
/// land-detection, pole-clamp, and landing/re-floating behavior without
/// shipping gigabytes of raster data.
pub struct SyntheticGeoInfo {
    landmasses: Vec<(f64, f64, f64, f64)>, // (lat_min, lat_max, lon_min, lon_max)
}

impl Default for SyntheticGeoInfo {
    fn default() -> Self {
        Self {
            landmasses: vec![
                // A "continent" spanning a broad band, leaving open ocean
                // elsewhere for boats to sail freely.
                (10.0, 70.0, -10.0, 40.0),
                (-40.0, 10.0, -80.0, -35.0),
                (20.0, 55.0, 70.0, 140.0),
                (85.0, 90.0, -180.0, 180.0),
                (-90.0, -85.0, -180.0, 180.0),
            ],
        }
    }
}

impl SyntheticGeoInfo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GeoInfoProvider for SyntheticGeoInfo {
    fn is_water(&self, pos: &GeoPos) -> bool {
        !self.landmasses.iter().any(|&(lat_min, lat_max, lon_min, lon_max)| {
            pos.lat >= lat_min && pos.lat <= lat_max && pos.lon >= lon_min && pos.lon <= lon_max
        })
    }
}
