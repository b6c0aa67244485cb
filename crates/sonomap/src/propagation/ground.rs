//! Ground effect: interference between the direct and ground-reflected
//! paths.
//!
//! Two models are available. The two-ray phasor model sums a unit direct
//! phasor with a reflected phasor whose magnitude and phase follow from a
//! Delany-Bazley ground impedance; the simplified model is a cheap
//! monotone proxy used by the interactive fast mode.

use crate::constants::{FLOW_RESISTIVITY_HARD, FLOW_RESISTIVITY_SOFT, MIN_DISTANCE};
use num_complex::Complex64;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Ground effect model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GroundModel {
    /// Cheap proximity-ratio proxy, no complex arithmetic.
    Simplified,
    /// Two-ray phasor summation with complex reflection coefficient.
    TwoRayPhasor,
}

/// Acoustic ground surface class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GroundType {
    /// Asphalt, concrete, water. No ground effect in this model.
    Hard,
    /// Grass, soil, porous surfaces.
    Soft,
    /// A blend of hard and soft, weighted by the mix factor.
    Mixed,
}

/// How the effective flow resistivity is interpolated for mixed ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GroundMixMode {
    /// Geometric interpolation of flow resistivity.
    PowerLaw,
    /// Linear interpolation of flow resistivity.
    LinearRatio,
}

/// Ground parameters shared by both models.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GroundConfig {
    /// Surface class.
    pub ground_type: GroundType,
    /// Softness weight in [0, 1] for [`GroundType::Mixed`]; 0 is fully
    /// hard, 1 fully soft. Ignored for the pure classes.
    #[serde(default = "default_mix_factor")]
    pub mix_factor: f64,
    /// Interpolation mode for mixed ground.
    #[serde(default = "default_mix_mode")]
    pub mix_mode: GroundMixMode,
}

fn default_mix_factor() -> f64 {
    0.5
}
fn default_mix_mode() -> GroundMixMode {
    GroundMixMode::PowerLaw
}

impl GroundConfig {
    /// Hard ground.
    pub fn hard() -> Self {
        GroundConfig {
            ground_type: GroundType::Hard,
            mix_factor: 0.0,
            mix_mode: default_mix_mode(),
        }
    }

    /// Soft ground.
    pub fn soft() -> Self {
        GroundConfig {
            ground_type: GroundType::Soft,
            mix_factor: 1.0,
            mix_mode: default_mix_mode(),
        }
    }

    /// Softness weight: 0 for hard, 1 for soft, the clamped mix factor
    /// for mixed ground.
    fn softness(&self) -> f64 {
        match self.ground_type {
            GroundType::Hard => 0.0,
            GroundType::Soft => 1.0,
            GroundType::Mixed => self.mix_factor.clamp(0.0, 1.0),
        }
    }

    /// Effective flow resistivity (kPa.s/m^2) for the two-ray model.
    fn flow_resistivity(&self) -> f64 {
        let m = self.softness();
        match self.mix_mode {
            GroundMixMode::PowerLaw => {
                FLOW_RESISTIVITY_HARD.powf(1.0 - m) * FLOW_RESISTIVITY_SOFT.powf(m)
            }
            GroundMixMode::LinearRatio => {
                FLOW_RESISTIVITY_HARD + m * (FLOW_RESISTIVITY_SOFT - FLOW_RESISTIVITY_HARD)
            }
        }
    }
}

/// Normalized characteristic ground impedance per Delany-Bazley.
///
/// `sigma` is the effective flow resistivity in kPa.s/m^2.
fn ground_impedance(frequency: f64, sigma: f64) -> Complex64 {
    // Delany-Bazley with sigma in Pa.s/m^2
    let x = frequency / (sigma * 1000.0);
    Complex64::new(
        1.0 + 0.0571 * x.powf(-0.754),
        0.087 * x.powf(-0.732),
    )
}

/// Band taper for the simplified model: the proxy is strongest in the
/// mid bands and fades toward the spectral extremes.
fn band_taper(frequency: f64) -> f64 {
    match frequency {
        f if f < 125.0 => 0.4,
        f if f < 250.0 => 0.7,
        f if f <= 4000.0 => 1.0,
        f if f <= 8000.0 => 0.7,
        _ => 0.4,
    }
}

/// Simplified ground effect (dB): zero for hard ground, non-negative,
/// growing with the `30*hm/d` proximity ratio and tapering at the lowest
/// and highest bands.
pub fn ground_effect_simplified(
    distance: f64,
    source_height: f64,
    receiver_height: f64,
    ground: &GroundConfig,
    frequency: f64,
) -> f64 {
    let softness = ground.softness();
    if softness == 0.0 {
        return 0.0;
    }
    let d = distance.max(MIN_DISTANCE);
    let hm = 0.5 * (source_height + receiver_height).max(0.0);
    let ratio = 30.0 * hm / d;
    softness * band_taper(frequency) * ratio.min(6.0)
}

/// Two-ray phasor ground effect (dB).
///
/// Builds direct path r1 and reflected path r2 from the heights and the
/// horizontal distance, forms the complex reflection coefficient from the
/// ground impedance at the grazing angle, and sums the two phasors:
///
/// `effect = -20*log10(|1 + G*(r1/r2)*exp(j*k*(r2-r1))|)`
///
/// Positive values are destructive interference; negative values (gain)
/// occur near constructive interference and are kept.
pub fn ground_effect_two_ray(
    distance: f64,
    source_height: f64,
    receiver_height: f64,
    ground: &GroundConfig,
    frequency: f64,
    speed_of_sound: f64,
) -> f64 {
    if ground.softness() == 0.0 {
        return 0.0;
    }
    let d = distance.max(MIN_DISTANCE);
    let hs = source_height.max(0.0);
    let hr = receiver_height.max(0.0);

    let dh = hs - hr;
    let r1 = (d * d + dh * dh).sqrt().max(MIN_DISTANCE);
    let sh = hs + hr;
    let r2 = (d * d + sh * sh).sqrt().max(r1);

    let sin_theta = (sh / r2).max(1e-6);
    let z = ground_impedance(frequency, ground.flow_resistivity());

    // Plane-wave reflection coefficient for a locally reacting surface
    let zs = z * sin_theta;
    let gamma = (zs - 1.0) / (zs + 1.0);

    let k = 2.0 * PI * frequency / speed_of_sound;
    let phasor = Complex64::from_polar(1.0, k * (r2 - r1));
    let total = Complex64::new(1.0, 0.0) + gamma * (r1 / r2) * phasor;

    // Deep interference nulls are clamped so the effect stays finite
    -20.0 * total.norm().max(1e-2).log10()
}
