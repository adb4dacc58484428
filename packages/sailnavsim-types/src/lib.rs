//! Shared domain vocabulary between the simulation engine and the synthetic
//! environment providers: geographic primitives, boat status/flags, and the
//! command types exchanged through the command channel.

use serde::{Deserialize, Serialize};

/// A point on the earth's surface.
///
/// Longitudes received at or above 180 degrees are normalized into
/// `[-180, 180)` at construction time, matching the wire protocol's
/// acceptance of `lon <= 180.0` while keeping the internal representation
/// in the half-open range used throughout the advance step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPos {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPos {
    pub fn new(lat: f64, lon: f64) -> Self {
        let mut lon = lon;
        if lon >= 180.0 {
            lon -= 360.0;
        }
        Self { lat, lon }
    }

    /// True when the boat is within the "forbidden latitude" band around
    /// either pole, matching the original engine's pole clamp.
    pub fn is_near_pole(&self) -> bool {
        const FORBIDDEN_LAT: f64 = 0.0001;
        self.lat.abs() >= 90.0 - FORBIDDEN_LAT
    }

    /// Returns a new position offset by the given ground vector, applied for
    /// one second (vector magnitude is already in metres/second).
    pub fn advance(&self, v: GeoVec) -> GeoPos {
        const METRES_PER_DEGREE_LAT: f64 = 111_120.0;
        let rad = v.angle.to_radians();
        let dlat = v.mag * rad.cos() / METRES_PER_DEGREE_LAT;
        let cos_lat = self.lat.to_radians().cos();
        let dlon = if cos_lat.abs() > 1e-9 {
            v.mag * rad.sin() / (METRES_PER_DEGREE_LAT * cos_lat)
        } else {
            0.0
        };

        let lat = (self.lat + dlat).clamp(-90.0, 90.0);
        GeoPos::new(lat, self.lon + dlon)
    }
}

/// A compass-bearing vector: `angle` is a true bearing in `[0, 360)` degrees
/// unless the caller documents it as magnetic, `mag` is a scalar magnitude
/// (m/s for velocities, currents and gusts).
///
/// `mag` may go transiently negative during vector arithmetic; exposing a
/// `GeoVec` to an external observer always normalizes it back to a
/// non-negative magnitude by flipping the angle 180 degrees, per the
/// `vGround` invariant in the data model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoVec {
    pub angle: f64,
    pub mag: f64,
}

impl GeoVec {
    pub fn new(angle: f64, mag: f64) -> Self {
        Self {
            angle: normalize_angle(angle),
            mag,
        }
    }

    pub fn zero() -> Self {
        Self { angle: 0.0, mag: 0.0 }
    }

    /// Vector sum of two compass-bearing vectors, carried out in Cartesian
    /// space (x = sin, y = cos so that 0 degrees is north) and converted
    /// back to angle/magnitude form.
    pub fn add(&self, other: GeoVec) -> GeoVec {
        let (ax, ay) = self.to_xy();
        let (bx, by) = other.to_xy();
        let (x, y) = (ax + bx, ay + by);
        let mag = (x * x + y * y).sqrt();
        if mag < 1e-12 {
            return GeoVec::zero();
        }
        GeoVec {
            angle: normalize_angle(x.atan2(y).to_degrees()),
            mag,
        }
    }

    pub fn scale(&self, factor: f64) -> GeoVec {
        GeoVec {
            angle: self.angle,
            mag: self.mag * factor,
        }
    }

    fn to_xy(&self) -> (f64, f64) {
        let rad = self.angle.to_radians();
        (self.mag * rad.sin(), self.mag * rad.cos())
    }

    /// Normalizes so that `mag >= 0`, flipping the angle by 180 degrees when
    /// the magnitude was negative.
    pub fn normalized(&self) -> GeoVec {
        if self.mag < 0.0 {
            GeoVec::new(self.angle + 180.0, -self.mag)
        } else {
            GeoVec::new(self.angle, self.mag)
        }
    }
}

/// Normalizes a bearing into `[0, 360)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % 360.0;
    if a < 0.0 {
        a += 360.0;
    }
    a
}

/// Signed shortest angular difference `to - from`, folded into `(-180, 180]`.
/// Used by the course-update step to decide turn direction.
pub fn compass_diff(from: f64, to: f64) -> f64 {
    let mut d = (to - from) % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d <= -180.0 {
        d += 360.0;
    }
    d
}

/// Recognized bits of a boat's flag set. Kept as a plain newtype over `u32`
/// rather than pulling in a dependency for six bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoatFlags(pub u32);

impl BoatFlags {
    pub const TAKES_DAMAGE: BoatFlags = BoatFlags(0x01);
    pub const WAVE_SPEED_EFFECT: BoatFlags = BoatFlags(0x02);
    pub const CELESTIAL: BoatFlags = BoatFlags(0x04);
    pub const CELESTIAL_WAVE_EFFECT: BoatFlags = BoatFlags(0x08);
    pub const DAMAGE_APPARENT_WIND: BoatFlags = BoatFlags(0x10);
    pub const LIVE_SHARING_HIDDEN: BoatFlags = BoatFlags(0x20);

    /// Upper bound on a validated flags value: exactly the bits recognized
    /// above, used to reject out-of-range `add`/`add_g` commands.
    pub const MAX_VALUE: u32 = 0x003f;

    pub fn empty() -> Self {
        BoatFlags(0)
    }

    pub fn from_bits(bits: u32) -> Self {
        BoatFlags(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: BoatFlags) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for BoatFlags {
    type Output = BoatFlags;
    fn bitor(self, rhs: BoatFlags) -> BoatFlags {
        BoatFlags(self.0 | rhs.0)
    }
}

/// The three mutually exclusive motion states a boat can be in; recorded as
/// `boatState` in the CSV/relational log (0 stopped, 1 sailing, 2
/// moving-sails-down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoatMotionState {
    Stopped,
    Sailing,
    SailsDown,
}

impl BoatMotionState {
    pub fn as_log_code(&self) -> i32 {
        match self {
            BoatMotionState::Stopped => 0,
            BoatMotionState::Sailing => 1,
            BoatMotionState::SailsDown => 2,
        }
    }
}

/// Textual command actions accepted via the command channel, matching the
/// original engine's wire strings exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    Stop,
    Start,
    CourseTrue,
    CourseMagnetic,
    SailArea,
    AddBoat,
    AddBoatWithGroup,
    RemoveBoat,
}

impl CommandAction {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "stop" => CommandAction::Stop,
            "start" => CommandAction::Start,
            "course" => CommandAction::CourseTrue,
            "course_m" => CommandAction::CourseMagnetic,
            "sail_area" => CommandAction::SailArea,
            "add" => CommandAction::AddBoat,
            "add_g" => CommandAction::AddBoatWithGroup,
            "remove" => CommandAction::RemoveBoat,
            _ => return None,
        })
    }
}

/// A single queued command, targeting one boat by name (the `add`/`add_g`
/// actions instead use `target_name` as the new boat's own name).
#[derive(Debug, Clone)]
pub struct Command {
    pub target_name: String,
    pub action: CommandAction,
    pub values: CommandValues,
}

/// Typed argument payload for a command; which fields are meaningful depends
/// on `action`.
#[derive(Debug, Clone, Default)]
pub struct CommandValues {
    pub int_val: Option<i64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub boat_type: Option<i32>,
    pub flags: Option<u32>,
    pub group: Option<String>,
    pub alt_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geopos_normalizes_longitude() {
        let p = GeoPos::new(0.0, 190.0);
        assert!((p.lon - (-170.0)).abs() < 1e-9);
    }

    #[test]
    fn compass_diff_picks_shortest_path() {
        assert_eq!(compass_diff(350.0, 10.0), 20.0);
        assert_eq!(compass_diff(10.0, 350.0), -20.0);
        assert_eq!(compass_diff(0.0, 180.0), 180.0);
    }

    #[test]
    fn geovec_add_identity_with_zero() {
        let v = GeoVec::new(45.0, 5.0);
        let sum = v.add(GeoVec::zero());
        assert!((sum.mag - v.mag).abs() < 1e-9);
        assert!((sum.angle - v.angle).abs() < 1e-9);
    }

    #[test]
    fn geovec_normalizes_negative_magnitude() {
        let v = GeoVec { angle: 10.0, mag: -5.0 };
        let n = v.normalized();
        assert!(n.mag >= 0.0);
        assert!((n.angle - 190.0).abs() < 1e-9);
    }

    #[test]
    fn boat_flags_roundtrip() {
        let f = BoatFlags::TAKES_DAMAGE | BoatFlags::CELESTIAL;
        assert!(f.contains(BoatFlags::TAKES_DAMAGE));
        assert!(f.contains(BoatFlags::CELESTIAL));
        assert!(!f.contains(BoatFlags::WAVE_SPEED_EFFECT));
    }
}
