//! Outdoor propagation model: spreading, atmospheric absorption, ground
//! effect and barrier diffraction combined into per-path, per-band
//! attenuations.

use crate::constants::{MAX_DISTANCE, MIN_DISTANCE, MIN_LEVEL, NUM_BANDS, OCTAVE_BANDS};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod atmosphere;
mod barrier;
mod ground;
mod spreading;

pub use atmosphere::{AtmosphereModel, Meteo, atmospheric_absorption};
pub use barrier::{
    BarrierDiffractionMode, MAX_BARRIER_ATTENUATION, barrier_attenuation, maekawa_attenuation,
};
pub use ground::{
    GroundConfig, GroundMixMode, GroundModel, GroundType, ground_effect_simplified,
    ground_effect_two_ray,
};
pub use spreading::{SpreadingModel, spreading_loss, spreading_loss_from_reference};

/// Immutable propagation configuration, shared by every path calculation
/// within one compute call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PropagationConfig {
    /// Geometric spreading model.
    #[serde(default = "default_spreading")]
    pub spreading: SpreadingModel,
    /// Atmospheric absorption model.
    #[serde(default = "default_atmosphere")]
    pub atmosphere: AtmosphereModel,
    /// Whether the ground reflection term is applied at all.
    #[serde(default = "default_true")]
    pub ground_enabled: bool,
    /// Ground effect model.
    #[serde(default = "default_ground_model")]
    pub ground_model: GroundModel,
    /// Ground surface parameters.
    #[serde(default = "default_ground")]
    pub ground: GroundConfig,
    /// Whether explicit barrier segments contribute Maekawa attenuation.
    #[serde(default = "default_true")]
    pub include_barriers: bool,
    /// Which diffraction paths around barriers are considered.
    #[serde(default = "default_diffraction")]
    pub barrier_diffraction: BarrierDiffractionMode,
    /// Paths longer than this (m) are blocked outright.
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
}

fn default_spreading() -> SpreadingModel {
    SpreadingModel::Spherical
}
fn default_atmosphere() -> AtmosphereModel {
    AtmosphereModel::Simple
}
fn default_true() -> bool {
    true
}
fn default_ground_model() -> GroundModel {
    GroundModel::Simplified
}
fn default_ground() -> GroundConfig {
    GroundConfig::soft()
}
fn default_diffraction() -> BarrierDiffractionMode {
    BarrierDiffractionMode::OverTop
}
fn default_max_distance() -> f64 {
    MAX_DISTANCE
}

impl Default for PropagationConfig {
    fn default() -> Self {
        PropagationConfig {
            spreading: default_spreading(),
            atmosphere: default_atmosphere(),
            ground_enabled: true,
            ground_model: default_ground_model(),
            ground: default_ground(),
            include_barriers: true,
            barrier_diffraction: default_diffraction(),
            max_distance: default_max_distance(),
        }
    }
}

/// Attenuation breakdown for a single path at a single frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathAttenuation {
    /// Geometric spreading loss (dB).
    pub spreading_db: f64,
    /// Air absorption (dB).
    pub atmospheric_db: f64,
    /// Ground effect (dB, may be negative near constructive interference).
    pub ground_db: f64,
    /// Barrier diffraction loss (dB).
    pub barrier_db: f64,
    /// Sum of the components, or the silence sentinel when blocked.
    pub total_db: f64,
    /// True when the path contributes nothing (beyond max distance).
    /// Not an error.
    pub blocked: bool,
}

impl PathAttenuation {
    fn blocked() -> Self {
        PathAttenuation {
            spreading_db: 0.0,
            atmospheric_db: 0.0,
            ground_db: 0.0,
            barrier_db: 0.0,
            total_db: MIN_LEVEL,
            blocked: true,
        }
    }
}

/// Compute the attenuation of a single path at one frequency.
///
/// The distance is clamped to [`MIN_DISTANCE`]; a path beyond
/// `config.max_distance` is reported as blocked with zeroed components,
/// which callers treat as "contributes nothing".
pub fn calculate_propagation(
    distance: f64,
    source_height: f64,
    receiver_height: f64,
    config: &PropagationConfig,
    meteo: &Meteo,
    barrier_path_diff: f64,
    frequency: f64,
) -> PathAttenuation {
    let d = distance.max(MIN_DISTANCE);
    if d > config.max_distance {
        return PathAttenuation::blocked();
    }

    let spreading_db = spreading_loss(d, config.spreading);
    let atmospheric_db = atmospheric_absorption(d, frequency, config.atmosphere, meteo);

    let ground_db = if config.ground_enabled {
        match config.ground_model {
            GroundModel::Simplified => {
                ground_effect_simplified(d, source_height, receiver_height, &config.ground, frequency)
            }
            GroundModel::TwoRayPhasor => ground_effect_two_ray(
                d,
                source_height,
                receiver_height,
                &config.ground,
                frequency,
                meteo.speed_of_sound(),
            ),
        }
    } else {
        0.0
    };

    let barrier_db = if config.include_barriers && barrier_path_diff > 0.0 {
        barrier_attenuation(barrier_path_diff, frequency, meteo.speed_of_sound())
    } else {
        0.0
    };

    PathAttenuation {
        spreading_db,
        atmospheric_db,
        ground_db,
        barrier_db,
        total_db: spreading_db + atmospheric_db + ground_db + barrier_db,
        blocked: false,
    }
}

/// Received sound pressure level (dB) from a sound power level and a path
/// attenuation. Blocked paths receive the silence sentinel.
pub fn calculate_spl(sound_power_level: f64, attenuation: &PathAttenuation) -> f64 {
    if attenuation.blocked {
        MIN_LEVEL
    } else {
        sound_power_level - attenuation.total_db
    }
}

/// Per-band attenuation for one path: one calculation per octave band plus
/// an "overall" calculation at 1 kHz used by non-banded summaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandedPropagation {
    /// One attenuation per entry of `OCTAVE_BANDS`.
    pub bands: [PathAttenuation; NUM_BANDS],
    /// Representative single-frequency attenuation at 1000 Hz.
    pub overall: PathAttenuation,
}

/// Run [`calculate_propagation`] across the 9 octave bands.
pub fn banded_propagation(
    distance: f64,
    source_height: f64,
    receiver_height: f64,
    config: &PropagationConfig,
    meteo: &Meteo,
    barrier_path_diff: f64,
) -> BandedPropagation {
    let mut bands = [PathAttenuation::blocked(); NUM_BANDS];
    for (i, &frequency) in OCTAVE_BANDS.iter().enumerate() {
        bands[i] = calculate_propagation(
            distance,
            source_height,
            receiver_height,
            config,
            meteo,
            barrier_path_diff,
            frequency,
        );
    }
    let overall = calculate_propagation(
        distance,
        source_height,
        receiver_height,
        config,
        meteo,
        barrier_path_diff,
        1000.0,
    );
    BandedPropagation { bands, overall }
}
