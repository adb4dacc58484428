use sailnavsim_types::{GeoPos, GeoVec};
use std::time::{SystemTime, UNIX_EPOCH};

/// One weather sample at a point in time and space. Never fails to produce a
/// value — weather coverage is assumed global, matching the real grid's
/// worldwide footprint.
#[derive(Debug, Clone, Copy)]
pub struct WeatherSample {
    pub wind: GeoVec,
    pub wind_gust: f32,
    pub temp: f32,
    pub dewpoint: f32,
    pub pressure: f32,
    /// Percent cloud cover, 0-100.
    pub cloud: f32,
    /// Visibility radius in metres.
    pub visibility: f32,
    pub prate: f32,
    pub cond: i32,
}

pub trait WeatherProvider: Send + Sync {
    /// `wind_only` lets callers skip computing fields the hot advance loop
    /// doesn't need (temp/dewpoint/etc.); the synthetic provider computes
    /// everything regardless since it is cheap, but the flag is threaded
    /// through to keep the call signature aligned with the real service.
    fn get(&self, pos: &GeoPos, wind_only: bool) -> WeatherSample;
}

/// Deterministic stand-in for the real gridded weather service: wind
/// direction and speed vary smoothly with latitude/longitude/time via
/// superposed sinusoids, loosely mimicking prevailing-wind banding.
pub struct SyntheticWeather {
    epoch: SystemTime,
}

impl Default for SyntheticWeather {
    fn default() -> Self {
        Self { epoch: UNIX_EPOCH }
    }
}

impl SyntheticWeather {
    pub fn new() -> Self {
        Self::default()
    }

    fn time_phase(&self) -> f64 {
        SystemTime::now()
            .duration_since(self.epoch)
            .unwrap_or_default()
            .as_secs_f64()
            / 3600.0
    }
}

impl WeatherProvider for SyntheticWeather {
    fn get(&self, pos: &GeoPos, wind_only: bool) -> WeatherSample {
        let t = self.time_phase();
        let lat_rad = pos.lat.to_radians();
        let lon_rad = pos.lon.to_radians();

        // Prevailing westerlies in mid-latitudes, trade winds near the
        // equator, slow drift over a multi-hour period.
        let band = (lat_rad * 3.0).sin();
        let base_angle = 270.0 + band * 60.0 + (t * 4.0 + lon_rad.to_degrees() * 0.1).sin() * 20.0;
        let speed = 4.0
            + 3.0 * (lat_rad * 2.0 + t * 0.3).cos().abs()
            + 1.5 * (lon_rad + t * 0.7).sin();
        let wind = GeoVec::new(base_angle, speed.max(0.0));
        let gust = (speed * (1.15 + 0.1 * (t * 2.1 + lon_rad).sin())) as f32;

        if wind_only {
            return WeatherSample {
                wind,
                wind_gust: gust,
                temp: 0.0,
                dewpoint: 0.0,
                pressure: 1013.0,
                cloud: 0.0,
                visibility: 20_000.0,
                prate: 0.0,
                cond: 0,
            };
        }

        let temp = 15.0 + 12.0 * (lat_rad).cos() as f32 + 2.0 * (t * 0.1).sin() as f32;
        let cloud = (50.0 + 50.0 * (t * 0.5 + lon_rad).sin()) as f32;
        let cloud = cloud.clamp(0.0, 100.0);

        WeatherSample {
            wind,
            wind_gust: gust,
            temp,
            dewpoint: temp - 4.0,
            pressure: 1013.0 + 8.0 * (t * 0.2).cos() as f32,
            cloud,
            visibility: (15_000.0 - cloud as f64 * 80.0).max(500.0) as f32,
            prate: if cloud > 80.0 { 0.5 } else { 0.0 },
            cond: if cloud > 80.0 { 1 } else { 0 },
        }
    }
}
