//! Panel summary statistics and the dB/energy bridge used by the
//! incremental update path.

use super::{PanelResult, PanelSample, PanelStats};
use crate::constants::MIN_LEVEL;
use crate::spectrum::{db_to_energy, energy_to_db};
use ndarray::Array1;

/// Nearest-rank percentile on an ascending-sorted array:
/// index `ceil(n*p) - 1`, clamped to `[0, n-1]`.
fn percentile_nearest_rank(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let n = sorted.len();
    let rank = (n as f64 * p).ceil() as usize;
    sorted[rank.saturating_sub(1).min(n - 1)]
}

/// Recompute summary statistics from the per-sample LAeq array.
///
/// Samples at or below the silence sentinel are excluded; when none
/// remain every statistic is the sentinel. The average is the energetic
/// mean; the percentiles are plain order statistics on the sorted dB
/// values, which is intentionally a different rule.
pub fn recompute_panel_stats(samples: &[PanelSample]) -> PanelStats {
    let mut levels: Vec<f64> = samples
        .iter()
        .map(|s| s.laeq)
        .filter(|&l| l > MIN_LEVEL)
        .collect();
    if levels.is_empty() {
        return PanelStats::silent();
    }
    levels.sort_by(|a, b| a.total_cmp(b));

    let mean_energy =
        levels.iter().map(|&l| db_to_energy(l)).sum::<f64>() / levels.len() as f64;

    PanelStats {
        laeq_min: levels[0],
        laeq_max: levels[levels.len() - 1],
        laeq_avg: energy_to_db(mean_energy),
        laeq_p25: percentile_nearest_rank(&levels, 0.25),
        laeq_p50: percentile_nearest_rank(&levels, 0.50),
        laeq_p75: percentile_nearest_rank(&levels, 0.75),
        laeq_p95: percentile_nearest_rank(&levels, 0.95),
    }
}

/// Elementwise `db_to_energy` over the sample LAeq values, in sample
/// order. This is the canonical bridge between the dB-domain result
/// object and the energy-domain incremental cache.
pub fn panel_samples_to_energy(samples: &[PanelSample]) -> Array1<f64> {
    samples.iter().map(|s| db_to_energy(s.laeq)).collect()
}

/// Write patched per-sample energies back into a panel result and refresh
/// its statistics. The energies array must be in sample order.
pub fn apply_energies_to_panel(result: &mut PanelResult, energies: &Array1<f64>) {
    debug_assert_eq!(result.samples.len(), energies.len());
    for (sample, &energy) in result.samples.iter_mut().zip(energies.iter()) {
        sample.laeq = energy_to_db(energy);
    }
    result.stats = recompute_panel_stats(&result.samples);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::Spectrum9;

    fn sample(laeq: f64) -> PanelSample {
        PanelSample {
            x: 0.0,
            y: 0.0,
            z: 1.5,
            laeq,
            spectrum: Spectrum9::silence(),
        }
    }

    #[test]
    fn test_empty_and_silent_panels() {
        let stats = recompute_panel_stats(&[]);
        assert_eq!(stats.laeq_min, MIN_LEVEL);
        assert_eq!(stats.laeq_p95, MIN_LEVEL);

        let stats = recompute_panel_stats(&[sample(MIN_LEVEL), sample(MIN_LEVEL - 5.0)]);
        assert_eq!(stats.laeq_avg, MIN_LEVEL);
    }

    #[test]
    fn test_avg_is_energetic_not_arithmetic() {
        let samples = [sample(60.0), sample(80.0)];
        let stats = recompute_panel_stats(&samples);
        // Energetic mean of 60 and 80 dB: 10*log10((1e6 + 1e8)/2) ~ 77.03
        assert!((stats.laeq_avg - 77.032).abs() < 1e-2);
        assert!(stats.laeq_avg > 70.0, "must not be the arithmetic mean");
    }

    #[test]
    fn test_percentiles_nearest_rank() {
        let samples: Vec<PanelSample> =
            (1..=10).map(|i| sample(i as f64 * 10.0)).collect();
        let stats = recompute_panel_stats(&samples);
        assert_eq!(stats.laeq_min, 10.0);
        assert_eq!(stats.laeq_max, 100.0);
        // ceil(10*0.25)-1 = 2 -> 30; ceil(10*0.5)-1 = 4 -> 50
        assert_eq!(stats.laeq_p25, 30.0);
        assert_eq!(stats.laeq_p50, 50.0);
        assert_eq!(stats.laeq_p75, 80.0);
        assert_eq!(stats.laeq_p95, 100.0);
    }

    #[test]
    fn test_single_sample_percentiles() {
        let stats = recompute_panel_stats(&[sample(55.0)]);
        assert_eq!(stats.laeq_p25, 55.0);
        assert_eq!(stats.laeq_p95, 55.0);
        assert_eq!(stats.laeq_avg, 55.0);
    }

    #[test]
    fn test_energy_bridge_round_trip() {
        let samples = [sample(60.0), sample(MIN_LEVEL), sample(72.5)];
        let energies = panel_samples_to_energy(&samples);
        assert_eq!(energies.len(), 3);
        assert_eq!(energies[1], 0.0);
        assert!((energy_to_db(energies[2]) - 72.5).abs() < 1e-9);
    }
}
