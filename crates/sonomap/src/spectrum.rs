//! Spectral math kernel: decibel/energy conversions, energetic summation
//! and A/C/Z frequency weighting over the 9 fixed octave bands.
//!
//! All arithmetic combination of levels happens in the linear energy
//! domain; dB values are only ever added when one of them is a gain or a
//! weighting offset.

use crate::constants::{
    A_WEIGHTING, C_WEIGHTING, MIN_LEVEL, NUM_BANDS, OCTAVE_BANDS, Z_WEIGHTING,
};
use crate::error::{Result, SonomapError};
use schemars::JsonSchema;
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use serde::{Deserialize, Serialize};

/// Convert a dB level to linear energy. Levels at or below [`MIN_LEVEL`]
/// carry no energy at all.
pub fn db_to_energy(level: f64) -> f64 {
    if level <= MIN_LEVEL {
        0.0
    } else {
        10.0_f64.powf(level / 10.0)
    }
}

/// Convert linear energy back to a dB level. Zero or negative energy maps
/// to the [`MIN_LEVEL`] silence sentinel.
pub fn energy_to_db(energy: f64) -> f64 {
    if energy <= 0.0 {
        MIN_LEVEL
    } else {
        10.0 * energy.log10()
    }
}

/// Energetic sum of a set of dB levels. Entries at or below [`MIN_LEVEL`]
/// are excluded; an empty or all-silent input sums to [`MIN_LEVEL`].
pub fn sum_decibels(levels: &[f64]) -> f64 {
    let total: f64 = levels
        .iter()
        .filter(|&&l| l > MIN_LEVEL)
        .map(|&l| db_to_energy(l))
        .sum();
    energy_to_db(total)
}

/// Frequency weighting applied when collapsing a spectrum to an overall level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Weighting {
    /// A-weighting (LAeq), the default human-hearing weighting.
    A,
    /// C-weighting (LCeq), flatter at low frequencies.
    C,
    /// Z-weighting (LZeq), no weighting at all.
    Z,
}

impl Weighting {
    /// Per-band offset table for this weighting at [`OCTAVE_BANDS`].
    pub fn offsets(&self) -> &'static [f64; NUM_BANDS] {
        match self {
            Weighting::A => &A_WEIGHTING,
            Weighting::C => &C_WEIGHTING,
            Weighting::Z => &Z_WEIGHTING,
        }
    }
}

/// An ordered 9-tuple of dB levels, index `i` corresponding to
/// `OCTAVE_BANDS[i]`.
///
/// Construction from a slice fails fast on any length other than 9;
/// spectra are never truncated or padded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Spectrum9([f64; NUM_BANDS]);

impl Spectrum9 {
    /// Wrap a fixed-size band array.
    pub fn new(bands: [f64; NUM_BANDS]) -> Self {
        Spectrum9(bands)
    }

    /// Build a spectrum from a slice, failing fast on a wrong length.
    pub fn from_slice(levels: &[f64]) -> Result<Self> {
        let bands: [f64; NUM_BANDS] =
            levels
                .try_into()
                .map_err(|_| SonomapError::SpectrumLength {
                    expected: NUM_BANDS,
                    actual: levels.len(),
                })?;
        Ok(Spectrum9(bands))
    }

    /// A flat spectrum with the same level in every band.
    pub fn flat(level: f64) -> Self {
        Spectrum9([level; NUM_BANDS])
    }

    /// The all-silent spectrum.
    pub fn silence() -> Self {
        Spectrum9::flat(MIN_LEVEL)
    }

    /// Level of band `i`.
    pub fn band(&self, i: usize) -> f64 {
        self.0[i]
    }

    /// The raw band array.
    pub fn bands(&self) -> &[f64; NUM_BANDS] {
        &self.0
    }

    /// Iterate over `(center_frequency, level)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        OCTAVE_BANDS.iter().copied().zip(self.0.iter().copied())
    }

    /// Apply a per-band map, e.g. a gain or an attenuation.
    pub fn map(&self, f: impl Fn(usize, f64) -> f64) -> Self {
        let mut out = self.0;
        for (i, level) in out.iter_mut().enumerate() {
            *level = f(i, *level);
        }
        Spectrum9(out)
    }

    /// True if every band is at or below the silence sentinel.
    pub fn is_silent(&self) -> bool {
        self.0.iter().all(|&l| l <= MIN_LEVEL)
    }
}

impl TryFrom<Vec<f64>> for Spectrum9 {
    type Error = SonomapError;

    fn try_from(levels: Vec<f64>) -> Result<Self> {
        Spectrum9::from_slice(&levels)
    }
}

impl From<Spectrum9> for Vec<f64> {
    fn from(s: Spectrum9) -> Vec<f64> {
        s.0.to_vec()
    }
}

impl JsonSchema for Spectrum9 {
    fn schema_name() -> String {
        "Spectrum9".to_string()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        let mut schema = <Vec<f64>>::json_schema(generator).into_object();
        schema.array().min_items = Some(NUM_BANDS as u32);
        schema.array().max_items = Some(NUM_BANDS as u32);
        schema.into()
    }
}

/// Add the weighting offset table to a spectrum band by band. Silent bands
/// stay silent rather than picking up the offset.
pub fn apply_weighting(spectrum: &Spectrum9, weighting: Weighting) -> Spectrum9 {
    let offsets = weighting.offsets();
    spectrum.map(|i, level| {
        if level <= MIN_LEVEL {
            MIN_LEVEL
        } else {
            level + offsets[i]
        }
    })
}

/// Collapse a spectrum to a single weighted level: weight per band, sum the
/// band energies (silent bands excluded), convert back to dB. An all-silent
/// spectrum collapses to [`MIN_LEVEL`].
pub fn overall_level(spectrum: &Spectrum9, weighting: Weighting) -> f64 {
    let weighted = apply_weighting(spectrum, weighting);
    sum_decibels(weighted.bands())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_round_trip() {
        assert_eq!(db_to_energy(MIN_LEVEL), 0.0);
        assert_eq!(energy_to_db(0.0), MIN_LEVEL);
        assert_eq!(energy_to_db(-1.0), MIN_LEVEL);
        assert_eq!(overall_level(&Spectrum9::silence(), Weighting::A), MIN_LEVEL);
    }

    #[test]
    fn test_energy_conversion() {
        assert!((db_to_energy(10.0) - 10.0).abs() < 1e-12);
        assert!((energy_to_db(100.0) - 20.0).abs() < 1e-12);
        let level = 73.4;
        assert!((energy_to_db(db_to_energy(level)) - level).abs() < 1e-9);
    }

    #[test]
    fn test_sum_decibels_doubling() {
        // Two equal levels combine to +10*log10(2) ~ 3.0103 dB
        let sum = sum_decibels(&[80.0, 80.0]);
        assert!((sum - 83.0103).abs() < 1e-3);
    }

    #[test]
    fn test_sum_decibels_excludes_silence() {
        assert_eq!(sum_decibels(&[]), MIN_LEVEL);
        assert_eq!(sum_decibels(&[MIN_LEVEL, MIN_LEVEL - 10.0]), MIN_LEVEL);
        let sum = sum_decibels(&[60.0, MIN_LEVEL]);
        assert!((sum - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_spectrum_length_contract() {
        assert!(Spectrum9::from_slice(&[0.0; 9]).is_ok());
        let err = Spectrum9::from_slice(&[0.0; 8]).unwrap_err();
        assert!(matches!(
            err,
            SonomapError::SpectrumLength {
                expected: 9,
                actual: 8
            }
        ));
        assert!(Spectrum9::from_slice(&[0.0; 10]).is_err());
    }

    #[test]
    fn test_z_weighting_is_identity() {
        let s = Spectrum9::flat(70.0);
        assert_eq!(apply_weighting(&s, Weighting::Z), s);
    }

    #[test]
    fn test_a_weighting_at_1khz_is_zero() {
        let offsets = Weighting::A.offsets();
        assert_eq!(offsets[4], 0.0);
        // A-weighting attenuates the 63 Hz band strongly
        assert!(offsets[0] < -20.0);
    }

    #[test]
    fn test_overall_level_flat_spectrum() {
        // Nine equal 70 dB bands, Z-weighted: 70 + 10*log10(9)
        let s = Spectrum9::flat(70.0);
        let overall = overall_level(&s, Weighting::Z);
        assert!((overall - (70.0 + 10.0 * 9.0_f64.log10())).abs() < 1e-9);
    }

    #[test]
    fn test_weighting_keeps_silent_bands_silent() {
        let mut bands = [MIN_LEVEL; 9];
        bands[4] = 65.0;
        let s = Spectrum9::new(bands);
        let weighted = apply_weighting(&s, Weighting::A);
        assert_eq!(weighted.band(0), MIN_LEVEL);
        assert!((overall_level(&s, Weighting::A) - 65.0).abs() < 1e-9);
    }
}
