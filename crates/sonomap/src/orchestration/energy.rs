//! Energy-domain bookkeeping: the substitution primitive, the shared
//! energy ledger and the cached per-source drag contribution.

use ndarray::Array1;
use std::collections::HashMap;

/// Substitute one source's contribution inside a cached energy total:
/// `total - old + new`, floored at zero against float round-off.
///
/// The algebra is exact as long as `total` and `old` stay in sync, which
/// the orchestrator guarantees by routing every ledger mutation through
/// one generation-checked writer.
pub fn patch_energy(total: f64, old_contribution: f64, new_contribution: f64) -> f64 {
    (total - old_contribution + new_contribution).max(0.0)
}

/// The sum over all sources of linear energy per receiver and per panel
/// sample. Ground truth behind the displayed dB values: full recomputes
/// replace it wholesale, drag updates patch it.
#[derive(Debug, Clone, Default)]
pub struct EnergyLedger {
    receivers: HashMap<String, f64>,
    panels: HashMap<String, Array1<f64>>,
}

impl EnergyLedger {
    /// Replace every receiver total.
    pub fn replace_receivers(&mut self, totals: impl IntoIterator<Item = (String, f64)>) {
        self.receivers = totals.into_iter().collect();
    }

    /// Replace one panel's per-sample totals.
    pub fn replace_panel(&mut self, panel_id: &str, energies: Array1<f64>) {
        self.panels.insert(panel_id.to_string(), energies);
    }

    pub fn receiver_energy(&self, receiver_id: &str) -> Option<f64> {
        self.receivers.get(receiver_id).copied()
    }

    pub fn panel_energies(&self, panel_id: &str) -> Option<&Array1<f64>> {
        self.panels.get(panel_id)
    }

    /// Patch one receiver total in place, returning the combined energy.
    /// `None` when the receiver has no cached total yet.
    pub fn patch_receiver(&mut self, receiver_id: &str, old: f64, new: f64) -> Option<f64> {
        let total = self.receivers.get_mut(receiver_id)?;
        *total = patch_energy(*total, old, new);
        Some(*total)
    }

    /// Patch one panel's totals elementwise, returning the combined
    /// energies. `None` when the panel is uncached or the sample counts
    /// disagree (e.g. the polygon was edited mid-drag).
    pub fn patch_panel(
        &mut self,
        panel_id: &str,
        old: &Array1<f64>,
        new: &Array1<f64>,
    ) -> Option<Array1<f64>> {
        let totals = self.panels.get_mut(panel_id)?;
        if totals.len() != old.len() || totals.len() != new.len() {
            return None;
        }
        for ((total, &o), &n) in totals.iter_mut().zip(old.iter()).zip(new.iter()) {
            *total = patch_energy(*total, o, n);
        }
        Some(totals.clone())
    }
}

/// Cached contribution of exactly one source to every receiver and panel
/// sample. Created when a drag begins, primed by one full single-source
/// compute, updated on every drag tick, discarded when the drag ends or
/// another source takes over.
#[derive(Debug, Clone)]
pub struct DragContribution {
    pub source_id: String,
    pub receivers: HashMap<String, f64>,
    pub panels: HashMap<String, Array1<f64>>,
}

impl DragContribution {
    pub fn new(source_id: &str) -> Self {
        DragContribution {
            source_id: source_id.to_string(),
            receivers: HashMap::new(),
            panels: HashMap::new(),
        }
    }

    /// Receiver baseline is ready once every receiver in the scene has a
    /// cached contribution (trivially ready for a receiver-less scene).
    pub fn receiver_baseline_ready(&self, scene_receiver_count: usize) -> bool {
        scene_receiver_count == 0 || self.receivers.len() >= scene_receiver_count
    }

    /// Panel baseline is ready only for panels that were primed.
    pub fn panel_baseline_ready(&self, panel_id: &str) -> bool {
        self.panels.contains_key(panel_id)
    }
}
