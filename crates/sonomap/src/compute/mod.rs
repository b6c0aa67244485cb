//! Scene compute engine: enumerates source-receiver and source-sample
//! paths, applies occlusion geometry and the banded propagation model,
//! and aggregates energies into weighted levels.
//!
//! All entry points are pure and deterministic: a fixed scene, config and
//! meteo always produce bit-identical results. Multi-source combination
//! always happens in the linear energy domain.

use crate::constants::{MIN_LEVEL, NUM_BANDS, OCTAVE_BANDS};
use crate::error::Result;
use crate::propagation::{
    Meteo, PropagationConfig, banded_propagation, calculate_spl,
};
use crate::scene::geometry::{los_occluded, max_barrier_path_difference};
use crate::scene::sampling::sample_panel_points;
use crate::scene::{Barrier, PanelSampling, Point3, Scene, Source};
use crate::spectrum::{Spectrum9, Weighting, db_to_energy, energy_to_db, overall_level};
use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod stats;

/// Per-receiver compute result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReceiverResult {
    pub receiver_id: String,
    /// A-weighted overall level (dB).
    pub laeq: f64,
    /// C-weighted overall level (dB).
    pub lceq: f64,
    /// Unweighted overall level (dB).
    pub lzeq: f64,
    /// Received unweighted spectrum.
    pub spectrum: Spectrum9,
}

/// One panel sample point with its computed level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PanelSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub laeq: f64,
    pub spectrum: Spectrum9,
}

/// Panel summary statistics over the non-silent samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PanelStats {
    pub laeq_min: f64,
    pub laeq_max: f64,
    pub laeq_avg: f64,
    pub laeq_p25: f64,
    pub laeq_p50: f64,
    pub laeq_p75: f64,
    pub laeq_p95: f64,
}

impl PanelStats {
    /// Every statistic at the silence sentinel.
    pub fn silent() -> Self {
        PanelStats {
            laeq_min: MIN_LEVEL,
            laeq_max: MIN_LEVEL,
            laeq_avg: MIN_LEVEL,
            laeq_p25: MIN_LEVEL,
            laeq_p50: MIN_LEVEL,
            laeq_p75: MIN_LEVEL,
            laeq_p95: MIN_LEVEL,
        }
    }
}

/// Full panel compute result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PanelResult {
    pub panel_id: String,
    pub sample_count: usize,
    pub stats: PanelStats,
    pub samples: Vec<PanelSample>,
}

/// Rectangular bounds of a heatmap grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GridBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Heatmap grid request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GridConfig {
    pub bounds: GridBounds,
    /// Grid spacing (m).
    pub resolution: f64,
    /// Evaluation height above ground (m).
    #[serde(default = "default_grid_height")]
    pub height: f64,
}

fn default_grid_height() -> f64 {
    1.5
}

/// Heatmap grid result. `values` is flattened row-major: row `r` spans
/// `values[r*cols .. (r+1)*cols]`, rows run along ascending y, columns
/// along ascending x, so `values[r*cols + c]` is the LAeq at
/// `(min_x + c*resolution, min_y + r*resolution)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GridResult {
    pub cols: usize,
    pub rows: usize,
    pub values: Vec<f64>,
}

/// Probe frequency response: the 9 band centers and the received band
/// levels at a single point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrequencyResponse {
    pub frequencies: [f64; NUM_BANDS],
    pub magnitudes: [f64; NUM_BANDS],
}

/// Received unweighted spectrum at `position`: per admitted source, run
/// the occlusion check and the banded propagation model, then sum source
/// energies per band.
pub fn point_spectrum(
    scene: &Scene,
    propagation: &PropagationConfig,
    meteo: &Meteo,
    position: Point3,
) -> Spectrum9 {
    let mut energies = [0.0_f64; NUM_BANDS];
    for source in scene.admitted_sources() {
        accumulate_source(
            &mut energies,
            source,
            position,
            &scene.barriers,
            |s, r| los_occluded(s, r, &scene.buildings),
            propagation,
            meteo,
        );
    }
    Spectrum9::new(energies.map(energy_to_db))
}

/// Accumulate one source's banded energy contribution at a position.
fn accumulate_source(
    energies: &mut [f64; NUM_BANDS],
    source: &Source,
    position: Point3,
    barriers: &[Barrier],
    occluded: impl Fn(Point3, Point3) -> bool,
    propagation: &PropagationConfig,
    meteo: &Meteo,
) {
    if occluded(source.position, position) {
        return;
    }
    let barrier_delta = if propagation.include_barriers {
        max_barrier_path_difference(
            source.position,
            position,
            barriers,
            propagation.barrier_diffraction,
        )
    } else {
        0.0
    };
    let distance = source.position.distance_to(&position);
    let banded = banded_propagation(
        distance,
        source.position.z,
        position.z,
        propagation,
        meteo,
        barrier_delta,
    );
    for (i, attenuation) in banded.bands.iter().enumerate() {
        let spl = calculate_spl(source.band_power(i), attenuation);
        energies[i] += db_to_energy(spl);
    }
}

/// Compute results for every receiver in the scene.
pub fn compute_receivers(
    scene: &Scene,
    propagation: &PropagationConfig,
    meteo: &Meteo,
) -> Result<Vec<ReceiverResult>> {
    Ok(scene
        .receivers
        .iter()
        .map(|receiver| {
            let spectrum = point_spectrum(scene, propagation, meteo, receiver.position);
            ReceiverResult {
                receiver_id: receiver.id.clone(),
                laeq: overall_level(&spectrum, Weighting::A),
                lceq: overall_level(&spectrum, Weighting::C),
                lzeq: overall_level(&spectrum, Weighting::Z),
                spectrum,
            }
        })
        .collect())
}

/// Compute one panel: sample the polygon, run the receiver-style energy
/// sum per sample in parallel, then summarize.
pub fn compute_panel(
    scene: &Scene,
    panel_id: &str,
    propagation: &PropagationConfig,
    meteo: &Meteo,
    sampling_override: Option<&PanelSampling>,
) -> Result<PanelResult> {
    let panel = scene.panel(panel_id)?;
    let sampling = sampling_override.unwrap_or(&panel.sampling);
    let points = sample_panel_points(panel, sampling);

    let samples: Vec<PanelSample> = points
        .par_iter()
        .map(|&point| {
            let spectrum = point_spectrum(scene, propagation, meteo, point);
            PanelSample {
                x: point.x,
                y: point.y,
                z: point.z,
                laeq: overall_level(&spectrum, Weighting::A),
                spectrum,
            }
        })
        .collect();

    Ok(PanelResult {
        panel_id: panel_id.to_string(),
        sample_count: samples.len(),
        stats: stats::recompute_panel_stats(&samples),
        samples,
    })
}

/// Compute a heatmap grid of LAeq values over `grid.bounds`.
pub fn compute_grid(
    scene: &Scene,
    grid: &GridConfig,
    propagation: &PropagationConfig,
    meteo: &Meteo,
) -> Result<GridResult> {
    let step = grid.resolution.max(1e-3);
    let cols = (((grid.bounds.max_x - grid.bounds.min_x) / step).floor() as usize) + 1;
    let rows = (((grid.bounds.max_y - grid.bounds.min_y) / step).floor() as usize) + 1;

    let values: Vec<f64> = (0..rows * cols)
        .into_par_iter()
        .map(|idx| {
            let row = idx / cols;
            let col = idx % cols;
            let point = Point3::new(
                grid.bounds.min_x + col as f64 * step,
                grid.bounds.min_y + row as f64 * step,
                grid.height,
            );
            let spectrum = point_spectrum(scene, propagation, meteo, point);
            overall_level(&spectrum, Weighting::A)
        })
        .collect();

    Ok(GridResult { cols, rows, values })
}

/// Single-point probe: a reduced, single-pass instance of the same
/// propagation math fed by an explicit source and wall list, bypassing
/// the scene abstraction. Used by the live frequency-response inspector.
pub fn compute_probe(
    position: Point3,
    sources: &[Source],
    walls: &[Barrier],
    propagation: &PropagationConfig,
    meteo: &Meteo,
) -> FrequencyResponse {
    let mut energies = [0.0_f64; NUM_BANDS];
    for source in sources.iter().filter(|s| s.enabled) {
        accumulate_source(
            &mut energies,
            source,
            position,
            walls,
            |_, _| false,
            propagation,
            meteo,
        );
    }
    FrequencyResponse {
        frequencies: OCTAVE_BANDS,
        magnitudes: energies.map(energy_to_db),
    }
}
