//! Maekawa barrier diffraction loss.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Maximum barrier insertion loss (dB) credited by the Maekawa formula.
pub const MAX_BARRIER_ATTENUATION: f64 = 25.0;

/// How diffraction paths around a barrier are considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BarrierDiffractionMode {
    /// Only the path over the barrier top.
    OverTop,
    /// Over the top and around both barrier ends; the shortest detour wins.
    OverTopAndSides,
}

/// Maekawa attenuation (dB) from a Fresnel number.
///
/// `N = 0` is credited exactly 5 dB; positive N follows
/// `10*log10(3 + 20N)` capped at [`MAX_BARRIER_ATTENUATION`].
pub fn maekawa_attenuation(fresnel_number: f64) -> f64 {
    if fresnel_number == 0.0 {
        return 5.0;
    }
    (10.0 * (3.0 + 20.0 * fresnel_number).log10()).min(MAX_BARRIER_ATTENUATION)
}

/// Barrier attenuation (dB) from a path-length difference (m) at a given
/// frequency. A non-positive path difference means the line of sight
/// clears the barrier: no effect.
pub fn barrier_attenuation(path_difference: f64, frequency: f64, speed_of_sound: f64) -> f64 {
    if path_difference <= 0.0 {
        return 0.0;
    }
    let wavelength = speed_of_sound / frequency;
    let n = 2.0 * path_difference / wavelength;
    maekawa_attenuation(n)
}
