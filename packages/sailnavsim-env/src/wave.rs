use sailnavsim_types::GeoPos;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy)]
pub struct WaveSample {
    pub wave_height: f32,
}

pub trait WaveProvider: Send + Sync {
    fn get(&self, pos: &GeoPos) -> Option<WaveSample>;
}

/// Synthetic wave field: height grows with latitude band "roughness" and
/// drifts slowly over time, loosely tracking the synthetic wind's speed so
/// wave effects correlate with windier samples.
pub struct SyntheticWave {
    epoch: SystemTime,
}

impl Default for SyntheticWave {
    fn default() -> Self {
        Self { epoch: UNIX_EPOCH }
    }
}

impl SyntheticWave {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaveProvider for SyntheticWave {
    fn get(&self, pos: &GeoPos) -> Option<WaveSample> {
        let t = SystemTime::now()
            .duration_since(self.epoch)
            .unwrap_or_default()
            .as_secs_f64()
            / 3600.0;

        let roughness = (pos.lat.to_radians() * 2.5).sin().abs();
        let height = 0.5 + 2.0 * roughness + 0.3 * (t * 0.4 + pos.lon.to_radians()).sin();
        Some(WaveSample {
            wave_height: height.max(0.0) as f32,
        })
    }
}
