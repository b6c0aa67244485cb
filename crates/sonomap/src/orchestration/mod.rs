//! Caller-side orchestration of async computes.
//!
//! The engine itself is pure and synchronous; this layer owns the async
//! boundary, the energy ledger behind the displayed levels, and the
//! incremental single-source update path used while a source is dragged.
//! Correctness under out-of-order completion rests entirely on the
//! generation counters: a response is applied only while its ticket is
//! current, otherwise it is dropped without touching shared state.

use crate::compute::stats::{apply_energies_to_panel, panel_samples_to_energy};
use crate::compute::{GridConfig, GridResult, PanelResult, PanelStats, ReceiverResult};
use crate::error::{Result, SonomapError};
use crate::scene::Scene;
use crate::service::{ComputeBackend, EngineConfig};
use crate::spectrum::{db_to_energy, energy_to_db};
use log::{debug, warn};
use ndarray::Array1;
use std::collections::HashMap;
use std::sync::Arc;

mod energy;
mod tokens;

pub use energy::{DragContribution, EnergyLedger, patch_energy};
pub use tokens::{Generation, GenerationCounter, RequestKey, Ticket};

/// Snapshot of the displayed levels after an update.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLevels {
    /// Primary metric (LAeq) per receiver.
    pub receivers: HashMap<String, f64>,
    /// Summary statistics per panel.
    pub panels: HashMap<String, PanelStats>,
}

/// Single-source contribution as returned by a priming or tick compute.
#[derive(Debug, Clone)]
pub struct SourceContribution {
    receivers: HashMap<String, f64>,
    panels: HashMap<String, Array1<f64>>,
}

/// Owns the energy ledger and serializes every mutation behind the
/// generation counters. One orchestrator per scene; it is the single
/// writer of the totals, which is what keeps the substitution algebra of
/// [`patch_energy`] exact.
pub struct ComputeOrchestrator {
    backend: Arc<dyn ComputeBackend>,
    config: EngineConfig,
    scene_tokens: GenerationCounter,
    grid_tokens: GenerationCounter,
    drag_tokens: GenerationCounter,
    ledger: EnergyLedger,
    drag: Option<DragContribution>,
    receiver_levels: HashMap<String, f64>,
    panel_results: HashMap<String, PanelResult>,
    grid_result: Option<GridResult>,
}

impl ComputeOrchestrator {
    pub fn new(backend: Arc<dyn ComputeBackend>, config: EngineConfig) -> Self {
        ComputeOrchestrator {
            backend,
            config,
            scene_tokens: GenerationCounter::default(),
            grid_tokens: GenerationCounter::default(),
            drag_tokens: GenerationCounter::default(),
            ledger: EnergyLedger::default(),
            drag: None,
            receiver_levels: HashMap::new(),
            panel_results: HashMap::new(),
            grid_result: None,
        }
    }

    /// Current displayed level for a receiver, if computed.
    pub fn receiver_level(&self, receiver_id: &str) -> Option<f64> {
        self.receiver_levels.get(receiver_id).copied()
    }

    /// Current panel result, if computed.
    pub fn panel_result(&self, panel_id: &str) -> Option<&PanelResult> {
        self.panel_results.get(panel_id)
    }

    /// Latest applied heatmap grid, if computed.
    pub fn grid_result(&self) -> Option<&GridResult> {
        self.grid_result.as_ref()
    }

    /// The energy ledger, read-only. Tests use this to verify that stale
    /// responses never mutate totals.
    pub fn ledger(&self) -> &EnergyLedger {
        &self.ledger
    }

    // ------------------------------------------------------------------
    // Ticket discipline
    // ------------------------------------------------------------------

    /// Stamp a new request, superseding every earlier request on the same
    /// stream.
    pub fn stamp(&mut self, key: RequestKey) -> Ticket {
        let generation = match &key {
            RequestKey::Scene => self.scene_tokens.advance(),
            RequestKey::Grid => self.grid_tokens.advance(),
            RequestKey::Drag { .. } => self.drag_tokens.advance(),
        };
        Ticket { key, generation }
    }

    /// Pure staleness predicate: true when the ticket's generation has
    /// been superseded, or when a drag response no longer matches the
    /// currently dragged source.
    pub fn is_stale(&self, ticket: &Ticket) -> bool {
        match &ticket.key {
            RequestKey::Scene => !self.scene_tokens.is_current(ticket.generation),
            RequestKey::Grid => !self.grid_tokens.is_current(ticket.generation),
            RequestKey::Drag { source_id } => {
                !self.drag_tokens.is_current(ticket.generation)
                    || self
                        .drag
                        .as_ref()
                        .map(|d| &d.source_id != source_id)
                        .unwrap_or(true)
            }
        }
    }

    /// Cancel a compute stream: bump its token so in-flight responses are
    /// ignored when they land. Requests are not aborted at the transport
    /// layer; they complete and are dropped. Cancelling the drag stream
    /// also discards the cached contribution.
    pub fn cancel(&mut self, key: &RequestKey) {
        match key {
            RequestKey::Scene => {
                self.scene_tokens.advance();
            }
            RequestKey::Grid => {
                self.grid_tokens.advance();
            }
            RequestKey::Drag { .. } => {
                self.drag_tokens.advance();
                self.drag = None;
            }
        }
    }

    /// The centralized compare-and-discard gate: every ledger mutation
    /// goes through here.
    fn apply_if_current<T>(
        &mut self,
        ticket: &Ticket,
        mutation: impl FnOnce(&mut Self) -> T,
    ) -> Option<T> {
        if self.is_stale(ticket) {
            debug!(
                "dropping stale response for {} (generation {})",
                ticket.key,
                ticket.generation.value()
            );
            return None;
        }
        Some(mutation(self))
    }

    // ------------------------------------------------------------------
    // Full recompute path
    // ------------------------------------------------------------------

    /// Apply a full-scene result: replace the ledger wholesale and drop
    /// any cached drag contribution. Returns false when the ticket went
    /// stale in flight.
    pub fn apply_full(
        &mut self,
        ticket: &Ticket,
        receivers: Vec<ReceiverResult>,
        panels: Vec<PanelResult>,
    ) -> bool {
        self.apply_if_current(ticket, |this| {
            this.drag = None;
            this.ledger.replace_receivers(
                receivers
                    .iter()
                    .map(|r| (r.receiver_id.clone(), db_to_energy(r.laeq))),
            );
            this.receiver_levels = receivers
                .iter()
                .map(|r| (r.receiver_id.clone(), r.laeq))
                .collect();
            this.panel_results.clear();
            for panel in panels {
                this.ledger
                    .replace_panel(&panel.panel_id, panel_samples_to_energy(&panel.samples));
                this.panel_results.insert(panel.panel_id.clone(), panel);
            }
        })
        .is_some()
    }

    /// Run a full recompute of every receiver and panel. Returns `None`
    /// when a newer request superseded this one while it was in flight.
    pub async fn recompute_scene(&mut self, scene: &Scene) -> Result<Option<SceneLevels>> {
        let ticket = self.stamp(RequestKey::Scene);
        let (receivers, panels) = self.run_scene_compute(scene.clone()).await?;
        if self.apply_full(&ticket, receivers, panels) {
            Ok(Some(self.levels()))
        } else {
            Ok(None)
        }
    }

    /// Recompute the heatmap grid. Separately tokened from the scene
    /// stream: grids are typically slower and must not block or be
    /// invalidated by receiver/panel updates. Returns `None` when a newer
    /// grid request superseded this one in flight.
    pub async fn recompute_grid(
        &mut self,
        scene: &Scene,
        grid: GridConfig,
    ) -> Result<Option<&GridResult>> {
        let ticket = self.stamp(RequestKey::Grid);
        let backend = Arc::clone(&self.backend);
        let config = self.config;
        let scene = scene.clone();
        let result =
            spawn_compute(move || backend.compute_grid(&scene, &grid, &config)).await?;
        let applied = self
            .apply_if_current(&ticket, |this| {
                this.grid_result = Some(result);
            })
            .is_some();
        Ok(if applied { self.grid_result.as_ref() } else { None })
    }

    // ------------------------------------------------------------------
    // Incremental drag path
    // ------------------------------------------------------------------

    /// Begin dragging `source_id`: create the drag contribution and prime
    /// it with one full single-source compute. Any previous drag is
    /// superseded. Returns true when the baseline is ready for
    /// incremental ticks.
    pub async fn begin_drag(&mut self, scene: &Scene, source_id: &str) -> Result<bool> {
        self.drag = Some(DragContribution::new(source_id));
        let ticket = self.stamp(RequestKey::Drag {
            source_id: source_id.to_string(),
        });
        let contribution = self.run_single_source_compute(scene, source_id).await?;

        let receiver_count = scene.receivers.len();
        let ready = self.apply_if_current(&ticket, |this| {
            let Some(drag) = this.drag.as_mut() else {
                return false;
            };
            drag.receivers = contribution.receivers;
            drag.panels = contribution.panels;
            drag.receiver_baseline_ready(receiver_count)
        });
        Ok(ready.unwrap_or(false))
    }

    /// One incremental drag tick: recompute only the dragged source's
    /// contribution and substitute it into the cached totals. Returns
    /// `None` (no mutation) when there is no primed drag, the response
    /// went stale, or the baseline is not ready.
    pub async fn drag_tick(&mut self, scene: &Scene) -> Result<Option<SceneLevels>> {
        let Some(drag) = &self.drag else {
            return Ok(None);
        };
        if !drag.receiver_baseline_ready(scene.receivers.len()) {
            debug!("drag tick skipped: baseline not primed yet");
            return Ok(None);
        }
        let source_id = drag.source_id.clone();
        let ticket = self.stamp(RequestKey::Drag {
            source_id: source_id.clone(),
        });
        let contribution = self.run_single_source_compute(scene, &source_id).await?;
        Ok(self.apply_drag_update(&ticket, contribution))
    }

    /// Apply one tick's contribution through the substitution algebra.
    pub fn apply_drag_update(
        &mut self,
        ticket: &Ticket,
        contribution: SourceContribution,
    ) -> Option<SceneLevels> {
        self.apply_if_current(ticket, |this| {
            let Some(drag) = this.drag.as_mut() else {
                return None;
            };

            for (receiver_id, new_energy) in contribution.receivers {
                let Some(old_energy) = drag.receivers.get(&receiver_id).copied() else {
                    continue;
                };
                if let Some(total) = this.ledger.patch_receiver(&receiver_id, old_energy, new_energy)
                {
                    this.receiver_levels
                        .insert(receiver_id.clone(), energy_to_db(total));
                    drag.receivers.insert(receiver_id, new_energy);
                }
            }

            for (panel_id, new_energies) in contribution.panels {
                if !drag.panel_baseline_ready(&panel_id) {
                    continue;
                }
                let old_energies = drag.panels[&panel_id].clone();
                match this.ledger.patch_panel(&panel_id, &old_energies, &new_energies) {
                    Some(totals) => {
                        if let Some(result) = this.panel_results.get_mut(&panel_id) {
                            apply_energies_to_panel(result, &totals);
                        }
                        drag.panels.insert(panel_id, new_energies);
                    }
                    None => {
                        warn!("panel '{panel_id}' sample layout changed mid-drag; patch skipped");
                    }
                }
            }
            Some(())
        })
        .flatten()
        .map(|_| self.levels())
    }

    /// End the drag and discard the cached contribution. The totals keep
    /// the last applied state; the next full recompute replaces them.
    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    // ------------------------------------------------------------------
    // Backend calls
    // ------------------------------------------------------------------

    async fn run_scene_compute(
        &self,
        scene: Scene,
    ) -> Result<(Vec<ReceiverResult>, Vec<PanelResult>)> {
        let backend = Arc::clone(&self.backend);
        let config = self.config;
        spawn_compute(move || {
            let receivers = backend.compute_receivers(&scene, &config)?;
            let panels = scene
                .panels
                .iter()
                .map(|p| backend.compute_panel(&scene, &p.id, None, &config))
                .collect::<Result<Vec<_>>>()?;
            Ok((receivers, panels))
        })
        .await
    }

    async fn run_single_source_compute(
        &self,
        scene: &Scene,
        source_id: &str,
    ) -> Result<SourceContribution> {
        let view = scene.single_source_view(source_id)?;
        let backend = Arc::clone(&self.backend);
        let config = self.config;
        spawn_compute(move || {
            let receivers = backend
                .compute_receivers(&view, &config)?
                .into_iter()
                .map(|r| (r.receiver_id, db_to_energy(r.laeq)))
                .collect();
            let panels = view
                .panels
                .iter()
                .map(|p| {
                    backend
                        .compute_panel(&view, &p.id, None, &config)
                        .map(|result| (p.id.clone(), panel_samples_to_energy(&result.samples)))
                })
                .collect::<Result<HashMap<_, _>>>()?;
            Ok(SourceContribution { receivers, panels })
        })
        .await
    }

    fn levels(&self) -> SceneLevels {
        SceneLevels {
            receivers: self.receiver_levels.clone(),
            panels: self
                .panel_results
                .iter()
                .map(|(id, result)| (id.clone(), result.stats))
                .collect(),
        }
    }
}

/// Run a blocking compute off the async executor.
async fn spawn_compute<T: Send + 'static>(
    job: impl FnOnce() -> Result<T> + Send + 'static,
) -> Result<T> {
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| SonomapError::BackendUnavailable {
            backend: "local".to_string(),
            message: format!("compute task failed: {e}"),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Point3, Receiver, Source};
    use crate::service::CpuBackend;
    use crate::spectrum::Spectrum9;

    fn scene() -> Scene {
        Scene {
            sources: vec![
                Source {
                    id: "s1".into(),
                    position: Point3::new(0.0, 0.0, 1.0),
                    spectrum: Spectrum9::flat(100.0),
                    gain_db: 0.0,
                    enabled: true,
                },
                Source {
                    id: "s2".into(),
                    position: Point3::new(40.0, 0.0, 1.0),
                    spectrum: Spectrum9::flat(95.0),
                    gain_db: 0.0,
                    enabled: true,
                },
            ],
            receivers: vec![Receiver {
                id: "r1".into(),
                position: Point3::new(20.0, 10.0, 1.5),
            }],
            ..Scene::default()
        }
    }

    fn orchestrator() -> ComputeOrchestrator {
        ComputeOrchestrator::new(Arc::new(CpuBackend), EngineConfig::default())
    }

    #[tokio::test]
    async fn test_full_recompute_populates_ledger() {
        let mut orch = orchestrator();
        let levels = orch.recompute_scene(&scene()).await.unwrap().unwrap();
        assert!(levels.receivers["r1"].is_finite());
        assert!(orch.ledger().receiver_energy("r1").unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_drag_requires_priming() {
        let mut orch = orchestrator();
        orch.recompute_scene(&scene()).await.unwrap();
        // No begin_drag: ticks are no-ops
        assert!(orch.drag_tick(&scene()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_full_response_is_dropped() {
        let mut orch = orchestrator();
        let s = scene();

        let old_ticket = orch.stamp(RequestKey::Scene);
        let old = orch.run_scene_compute(s.clone()).await.unwrap();

        // A newer request supersedes the first before it is applied
        let new_ticket = orch.stamp(RequestKey::Scene);
        let new = orch.run_scene_compute(s.clone()).await.unwrap();

        assert!(orch.is_stale(&old_ticket));
        assert!(!orch.apply_full(&old_ticket, old.0, old.1));
        assert!(orch.ledger().receiver_energy("r1").is_none());

        assert!(orch.apply_full(&new_ticket, new.0, new.1));
        assert!(orch.ledger().receiver_energy("r1").is_some());
    }

    #[tokio::test]
    async fn test_cancel_bumps_token_and_drops_contribution() {
        let mut orch = orchestrator();
        let s = scene();
        orch.recompute_scene(&s).await.unwrap();
        assert!(orch.begin_drag(&s, "s1").await.unwrap());

        let ticket = orch.stamp(RequestKey::Drag {
            source_id: "s1".into(),
        });
        orch.cancel(&RequestKey::Drag {
            source_id: "s1".into(),
        });
        assert!(orch.is_stale(&ticket));
        assert!(orch.drag_tick(&s).await.unwrap().is_none());

        let scene_ticket = orch.stamp(RequestKey::Scene);
        orch.cancel(&RequestKey::Scene);
        assert!(orch.is_stale(&scene_ticket));
    }

    #[tokio::test]
    async fn test_drag_for_superseded_source_is_dropped() {
        let mut orch = orchestrator();
        let s = scene();
        orch.recompute_scene(&s).await.unwrap();

        let ticket_a = orch.stamp(RequestKey::Drag {
            source_id: "s1".into(),
        });
        orch.drag = Some(DragContribution::new("s1"));
        // User switches to dragging s2 before s1's response lands
        let primed = orch.begin_drag(&s, "s2").await.unwrap();
        assert!(primed);

        let contribution = orch.run_single_source_compute(&s, "s1").await.unwrap();
        let before = orch.ledger().receiver_energy("r1").unwrap();
        assert!(orch.apply_drag_update(&ticket_a, contribution).is_none());
        assert_eq!(orch.ledger().receiver_energy("r1").unwrap(), before);
    }
}
