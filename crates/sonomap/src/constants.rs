//! Shared physical constants and band tables for the sonomap workspace.

/// Number of octave bands carried by every spectrum.
pub const NUM_BANDS: usize = 9;

/// Octave band center frequencies (Hz).
pub const OCTAVE_BANDS: [f64; NUM_BANDS] = [
    63.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

/// Silence sentinel (dB). Levels at or below this value carry no energy.
pub const MIN_LEVEL: f64 = -100.0;

/// Minimum source-receiver distance (m). Shorter paths are clamped here.
pub const MIN_DISTANCE: f64 = 0.1;

/// Default maximum propagation distance (m). Paths beyond it are blocked.
pub const MAX_DISTANCE: f64 = 10_000.0;

/// A-weighting offsets (dB) at [`OCTAVE_BANDS`] per IEC 61672.
pub const A_WEIGHTING: [f64; NUM_BANDS] = [
    -26.2, -16.1, -8.6, -3.2, 0.0, 1.2, 1.0, -1.1, -6.6,
];

/// C-weighting offsets (dB) at [`OCTAVE_BANDS`] per IEC 61672.
pub const C_WEIGHTING: [f64; NUM_BANDS] = [
    -0.8, -0.2, 0.0, 0.0, 0.0, -0.2, -0.8, -3.0, -8.5,
];

/// Z-weighting offsets (dB): flat by definition.
pub const Z_WEIGHTING: [f64; NUM_BANDS] = [0.0; NUM_BANDS];

/// Effective flow resistivity of acoustically hard ground (kPa·s/m²).
pub const FLOW_RESISTIVITY_HARD: f64 = 20_000.0;

/// Effective flow resistivity of soft ground, e.g. grass (kPa·s/m²).
pub const FLOW_RESISTIVITY_SOFT: f64 = 200.0;

/// Reference atmospheric pressure (kPa).
pub const REFERENCE_PRESSURE_KPA: f64 = 101.325;

/// Nepers to decibels.
pub const NEPER_TO_DB: f64 = 8.685_889_638_065_036;
