//! Synthetic environmental data providers.
//!
//! The real SailNavSim engine reads wind, current, wave, land/water, magnetic
//! declination and celestial-ephemeris data from large gridded data sets
//! updated by an external weather pipeline. That pipeline's file formats and
//! interpolation are explicitly out of scope for this crate (see spec §1);
//! what *is* in scope is the shape of the contract the simulation engine
//! consumes it through, and a working implementation of that contract so the
//! engine is runnable standalone.
//!
//! Every provider here is a deterministic function of position and time —
//! smoothly varying, not physically accurate — grounded on the generation
//! style the teacher workspace uses for its own synthetic telemetry
//! (`BoatSim::tick`'s periodic/stochastic wave-phase and tactical-slowdown
//! model): simple periodic functions plus a seeded RNG for gusts and sight
//! obscuration, rather than a network call or a file read.

mod celestial;
mod compass;
mod geo_info;
mod ocean;
mod wave;
mod weather;

pub use celestial::{CelestialProvider, EquatorialCoord, HorizontalCoord, SyntheticCelestial};
pub use compass::{CompassProvider, SyntheticCompass};
pub use geo_info::{GeoInfoProvider, SyntheticGeoInfo};
pub use ocean::{OceanProvider, OceanSample, SyntheticOcean};
pub use wave::{SyntheticWave, WaveProvider, WaveSample};
pub use weather::{SyntheticWeather, WeatherProvider, WeatherSample};
