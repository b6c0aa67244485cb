//! Geometric spreading loss.

use crate::constants::MIN_DISTANCE;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Geometric spreading model for a point or line source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SpreadingModel {
    /// Point source, inverse-square law: -6 dB per doubling of distance.
    Spherical,
    /// Line source: -3 dB per doubling of distance.
    Cylindrical,
}

/// Spreading loss (dB) over `distance` meters, absolute form.
///
/// Distances below [`MIN_DISTANCE`] are clamped so the result stays finite
/// for zero or negative inputs.
pub fn spreading_loss(distance: f64, model: SpreadingModel) -> f64 {
    let d = distance.max(MIN_DISTANCE);
    match model {
        SpreadingModel::Spherical => 20.0 * d.log10() + 10.0 * (4.0 * PI).log10(),
        SpreadingModel::Cylindrical => 10.0 * d.log10() + 10.0 * (2.0 * PI).log10(),
    }
}

/// Spreading loss (dB) relative to the level at 1 m, used by chart
/// rendering. Differs from [`spreading_loss`] by exactly the
/// `10*log10(4*pi)` (spherical) or `10*log10(2*pi)` (cylindrical) constant.
pub fn spreading_loss_from_reference(distance: f64, model: SpreadingModel) -> f64 {
    let d = distance.max(MIN_DISTANCE);
    match model {
        SpreadingModel::Spherical => 20.0 * d.log10(),
        SpreadingModel::Cylindrical => 10.0 * d.log10(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_square_doubling() {
        for d in [0.1, 1.0, 5.0, 10.0, 20.0, 40.0, 80.0, 500.0] {
            let diff = spreading_loss(2.0 * d, SpreadingModel::Spherical)
                - spreading_loss(d, SpreadingModel::Spherical);
            assert!((diff - 6.0206).abs() < 1e-3, "spherical doubling at {d}");

            let diff = spreading_loss(2.0 * d, SpreadingModel::Cylindrical)
                - spreading_loss(d, SpreadingModel::Cylindrical);
            assert!((diff - 3.0103).abs() < 1e-3, "cylindrical doubling at {d}");
        }
    }

    #[test]
    fn test_reference_variant_offset() {
        for d in [0.5, 1.0, 13.7, 200.0] {
            let diff = spreading_loss(d, SpreadingModel::Spherical)
                - spreading_loss_from_reference(d, SpreadingModel::Spherical);
            assert!((diff - 10.0 * (4.0 * PI).log10()).abs() < 1e-12);

            let diff = spreading_loss(d, SpreadingModel::Cylindrical)
                - spreading_loss_from_reference(d, SpreadingModel::Cylindrical);
            assert!((diff - 10.0 * (2.0 * PI).log10()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_degenerate_distances_are_finite() {
        for d in [-5.0, 0.0, 1e-12] {
            let loss = spreading_loss(d, SpreadingModel::Spherical);
            assert!(loss.is_finite());
            assert_eq!(loss, spreading_loss(MIN_DISTANCE, SpreadingModel::Spherical));
        }
    }
}
