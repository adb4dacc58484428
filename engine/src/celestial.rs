//! Celestial sight-shooting: decides whether a sextant sight of the Sun or a
//! fixed star is obtainable from a position at a given time and cloud cover,
//! and perturbs the resulting azimuth/altitude for sea state.
//!
//! Grounded on `original_source/src/CelestialSight.c`'s `CelestialSight_shoot`
//! and `Boat.c`'s `Boat_getWaveAdjustedCelestialAzAlt`.

use rand::Rng;

use sailnavsim_env::{CelestialProvider, HorizontalCoord, WaveSample};
use sailnavsim_types::{BoatFlags, GeoPos};

use crate::wind_response;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SightObject {
    Sun,
    Star(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct Sight {
    pub object: SightObject,
    pub azimuth: f64,
    pub altitude: f64,
}

const NAUTICAL_TWILIGHT_LOWER: f64 = -12.0;
const NAUTICAL_TWILIGHT_UPPER: f64 = -6.0;
const MAX_STAR_ATTEMPTS: u32 = 20;

/// Attempts a sight: the Sun if it's above the horizon, otherwise a randomly
/// chosen star during nautical twilight, otherwise none. Cloud cover can
/// obscure the sight entirely before any body is even considered.
pub fn shoot(celestial: &dyn CelestialProvider, pos: &GeoPos, cloud_percent: i32, rng: &mut impl Rng) -> Option<Sight> {
    if is_obscured_by_cloud(cloud_percent, rng) {
        return None;
    }

    let sun = celestial.sun_position(pos);
    if sun.altitude_deg > 0.0 {
        return Some(Sight {
            object: SightObject::Sun,
            azimuth: sun.azimuth_deg,
            altitude: sun.altitude_deg,
        });
    } else if sun.altitude_deg < NAUTICAL_TWILIGHT_LOWER {
        // Too dark to see the horizon.
        return None;
    } else if sun.altitude_deg > NAUTICAL_TWILIGHT_UPPER {
        // Sun is down but still too bright for stars.
        return None;
    }

    let stars = celestial.star_positions(pos);
    if stars.is_empty() {
        return None;
    }

    for _ in 0..MAX_STAR_ATTEMPTS {
        let idx = rng.gen_range(0..stars.len());
        let (name, hc): (&'static str, HorizontalCoord) = stars[idx];
        if hc.altitude_deg >= 0.0 {
            return Some(Sight {
                object: SightObject::Star(name),
                azimuth: hc.azimuth_deg,
                altitude: hc.altitude_deg,
            });
        }
    }

    None
}

fn is_obscured_by_cloud(cloud_percent: i32, rng: &mut impl Rng) -> bool {
    let adjusted = ((cloud_percent * 100) as f64).sqrt() as i32;
    rng.gen_range(0..100) + 1 <= adjusted
}

/// Perturbs a sight's azimuth/altitude for sea state, matching the original
/// engine's wave-adjusted sextant model. Returns `None` if the perturbed
/// altitude drops below the horizon (sight lost to the waves), otherwise the
/// adjusted `(azimuth, altitude)`.
///
/// Returns the sight unchanged if the boat doesn't have the
/// `CELESTIAL_WAVE_EFFECT` flag set, or if no wave data is available.
pub fn adjust_for_waves(
    flags: BoatFlags,
    wave: Option<WaveSample>,
    boat_type: i32,
    az: f64,
    alt: f64,
    rng: &mut impl Rng,
) -> Option<(f64, f64)> {
    if !flags.contains(BoatFlags::CELESTIAL_WAVE_EFFECT) {
        return Some((az, alt));
    }

    let wh = match wave {
        Some(wd) => wd.wave_height as f64,
        None => return Some((az, alt)),
    };

    let wer = wind_response::wave_effect_resistance(boat_type);

    let mut new_alt = alt + 1.666_667 * rand_double(wh, rng) * rand_double(wh, rng) / wer;
    if new_alt < 0.0 {
        return None;
    }
    if new_alt > 90.0 {
        new_alt = 90.0 - (new_alt - 90.0);
    }

    let mut new_az = az + 100.0 * rand_double(wh, rng) * rand_double(wh, rng) / wer;
    new_az = new_az.rem_euclid(360.0);

    Some((new_az, new_alt))
}

/// Pseudo-uniform value in roughly `[-scale, scale]`.
fn rand_double(scale: f64, rng: &mut impl Rng) -> f64 {
    let r = rng.gen_range(0..257) as f64;
    (r - 128.0) / 128.0 * scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use sailnavsim_env::SyntheticCelestial;

    #[test]
    fn full_cloud_cover_always_obscures() {
        let mut rng = SmallRng::seed_from_u64(1);
        let celestial = SyntheticCelestial::new();
        let pos = GeoPos::new(10.0, 10.0);
        assert!(shoot(&celestial, &pos, 100, &mut rng).is_none());
    }

    #[test]
    fn no_wave_effect_flag_leaves_sight_unchanged() {
        let mut rng = SmallRng::seed_from_u64(2);
        let result = adjust_for_waves(BoatFlags::empty(), None, 0, 123.0, 45.0, &mut rng);
        assert_eq!(result, Some((123.0, 45.0)));
    }

    #[test]
    fn wave_adjustment_stays_within_altitude_bounds() {
        let mut rng = SmallRng::seed_from_u64(3);
        let wave = Some(WaveSample { wave_height: 2.0 });
        if let Some((_, alt)) = adjust_for_waves(BoatFlags::CELESTIAL_WAVE_EFFECT, wave, 0, 180.0, 45.0, &mut rng) {
            assert!(alt >= 0.0 && alt <= 90.0);
        }
    }
}
