//! Stand-in for the external advanced-hydrodynamics model. The production
//! engine delegates "advanced" boat types (ids >= `ADVANCED_BOAT_TYPE_BASE`)
//! to a separate, closed-source per-type hydrodynamic solver; this module
//! implements the same call contract with a simplified closed-form response
//! so the engine is runnable standalone.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdvancedBoatError {
    #[error("unknown advanced boat type index {0}")]
    UnknownType(i32),
}

#[derive(Debug, Clone, Copy)]
pub struct AdvancedBoatInput {
    /// Apparent wind angle relative to the bow, degrees, `(-180, 180]`.
    pub wind_angle: f64,
    pub wind_speed: f64,
    pub boat_speed_ahead: f64,
    pub boat_speed_abeam: f64,
    /// Sail area, percent, `[0, 100]`.
    pub sail_area: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct AdvancedBoatOutput {
    pub ahead: f64,
    pub abeam: f64,
    pub heel: f64,
}

const MODEL_TYPE_COUNT: i32 = 4;

/// Number of advanced hull types this stand-in knows about.
pub fn get_boat_type_count() -> i32 {
    MODEL_TYPE_COUNT
}

/// Runs one step of the simplified advanced-hull model. `type_index` is
/// already adjusted via `wind_response::adjust_boat_type_for_advanced`.
pub fn compute(type_index: i32, input: AdvancedBoatInput) -> Result<AdvancedBoatOutput, AdvancedBoatError> {
    if type_index < 0 || type_index >= MODEL_TYPE_COUNT {
        return Err(AdvancedBoatError::UnknownType(type_index));
    }

    // Rough per-hull polar coefficients: forward drive coefficient, abeam
    // (leeway) coefficient, and heel sensitivity, scaling with sail area.
    let (drive_coef, leeway_coef, heel_coef) = match type_index {
        0 => (0.85, 0.12, 18.0), // small catamaran-like hull: stiff, low heel
        1 => (0.95, 0.18, 28.0), // monohull racer
        2 => (1.05, 0.22, 22.0), // foiling-assisted hull
        _ => (0.75, 0.10, 32.0), // heavy cruiser
    };

    let wind_rad = input.wind_angle.to_radians();
    let area_frac = (input.sail_area / 100.0).clamp(0.0, 1.0);

    let drive = drive_coef * input.wind_speed * wind_rad.cos().abs() * area_frac;
    let abeam = leeway_coef * input.wind_speed * wind_rad.sin() * area_frac;

    // First-order lag toward the target speed, similar in spirit to the
    // basic-boat inertia model.
    let ahead = (input.boat_speed_ahead * 4.0 + drive) / 5.0;
    let leeway = (input.boat_speed_abeam * 4.0 + abeam) / 5.0;
    let heel = (heel_coef * input.wind_speed.min(30.0) / 30.0 * area_frac).clamp(0.0, 45.0);

    Ok(AdvancedBoatOutput {
        ahead: ahead.max(0.0),
        abeam: leeway,
        heel,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_errors() {
        let input = AdvancedBoatInput {
            wind_angle: 90.0,
            wind_speed: 10.0,
            boat_speed_ahead: 0.0,
            boat_speed_abeam: 0.0,
            sail_area: 100.0,
        };
        assert!(compute(99, input).is_err());
    }

    #[test]
    fn zero_sail_area_gives_zero_drive() {
        let input = AdvancedBoatInput {
            wind_angle: 0.0,
            wind_speed: 15.0,
            boat_speed_ahead: 0.0,
            boat_speed_abeam: 0.0,
            sail_area: 0.0,
        };
        let out = compute(0, input).unwrap();
        assert!(out.ahead.abs() < 1e-9);
    }
}
