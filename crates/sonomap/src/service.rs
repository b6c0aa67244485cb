//! Service layer: engine configuration, the backend abstraction and the
//! logical request/response contract the engine is consumed through.
//!
//! Transport (worker message, HTTP, in-process call) is an external
//! collaborator; only the shapes live here. Any backend must produce
//! identical numerical results for the same request.

use crate::compute::{
    FrequencyResponse, GridConfig, GridResult, PanelResult, ReceiverResult, compute_grid,
    compute_panel, compute_probe, compute_receivers,
};
use crate::error::{Result, SonomapError};
use crate::propagation::{
    AtmosphereModel, GroundModel, Meteo, PropagationConfig,
};
use crate::scene::{Barrier, PanelSampling, Point3, Scene, Source};
use crate::spectrum::Weighting;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Engine operating mode, selecting the default model fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// Fast interactive models: simplified ground, empirical atmosphere.
    FestivalFast,
    /// Higher-fidelity models: two-ray phasor ground, ISO 9613 atmosphere.
    StandardsStrict,
}

/// Complete per-request engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    pub mode: EngineMode,
    /// Weighting used for the primary displayed metric.
    #[serde(default = "default_metric")]
    pub output_metric: Weighting,
    #[serde(default)]
    pub propagation: PropagationConfig,
    #[serde(default)]
    pub meteo: Meteo,
}

fn default_metric() -> Weighting {
    Weighting::A
}

impl EngineConfig {
    /// Default configuration for a mode.
    pub fn default_for(mode: EngineMode) -> Self {
        let propagation = match mode {
            EngineMode::FestivalFast => PropagationConfig {
                ground_model: GroundModel::Simplified,
                atmosphere: AtmosphereModel::Simple,
                ..PropagationConfig::default()
            },
            EngineMode::StandardsStrict => PropagationConfig {
                ground_model: GroundModel::TwoRayPhasor,
                atmosphere: AtmosphereModel::Iso9613,
                ..PropagationConfig::default()
            },
        };
        EngineConfig {
            mode,
            output_metric: default_metric(),
            propagation,
            meteo: Meteo::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::default_for(EngineMode::FestivalFast)
    }
}

/// Which backend the caller prefers; the dispatch layer resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComputePreference {
    Auto,
    Cpu,
    Gpu,
}

/// Probe payload: a single point plus explicit source and wall lists,
/// bypassing the scene abstraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProbeRequest {
    pub position: Point3,
    pub sources: Vec<Source>,
    #[serde(default)]
    pub walls: Vec<Barrier>,
}

/// A compute backend. Implementations must be pure: same request, same
/// bits, regardless of where the computation runs.
pub trait ComputeBackend: Send + Sync + std::fmt::Debug {
    /// Stable identifier reported in responses.
    fn id(&self) -> &'static str;

    fn compute_receivers(&self, scene: &Scene, config: &EngineConfig)
    -> Result<Vec<ReceiverResult>>;

    fn compute_panel(
        &self,
        scene: &Scene,
        panel_id: &str,
        sampling: Option<&PanelSampling>,
        config: &EngineConfig,
    ) -> Result<PanelResult>;

    fn compute_grid(
        &self,
        scene: &Scene,
        grid: &GridConfig,
        config: &EngineConfig,
    ) -> Result<GridResult>;

    fn compute_probe(&self, probe: &ProbeRequest, config: &EngineConfig)
    -> Result<FrequencyResponse>;
}

/// The in-process CPU backend.
#[derive(Debug, Default)]
pub struct CpuBackend;

impl ComputeBackend for CpuBackend {
    fn id(&self) -> &'static str {
        "cpu"
    }

    fn compute_receivers(
        &self,
        scene: &Scene,
        config: &EngineConfig,
    ) -> Result<Vec<ReceiverResult>> {
        compute_receivers(scene, &config.propagation, &config.meteo)
    }

    fn compute_panel(
        &self,
        scene: &Scene,
        panel_id: &str,
        sampling: Option<&PanelSampling>,
        config: &EngineConfig,
    ) -> Result<PanelResult> {
        compute_panel(scene, panel_id, &config.propagation, &config.meteo, sampling)
    }

    fn compute_grid(
        &self,
        scene: &Scene,
        grid: &GridConfig,
        config: &EngineConfig,
    ) -> Result<GridResult> {
        compute_grid(scene, grid, &config.propagation, &config.meteo)
    }

    fn compute_probe(
        &self,
        probe: &ProbeRequest,
        config: &EngineConfig,
    ) -> Result<FrequencyResponse> {
        Ok(compute_probe(
            probe.position,
            &probe.sources,
            &probe.walls,
            &config.propagation,
            &config.meteo,
        ))
    }
}

/// Resolve a backend from a preference. The GPU path is a capability
/// failure at dispatch time; callers fall back to CPU.
pub fn select_backend(preference: ComputePreference) -> Result<Arc<dyn ComputeBackend>> {
    match preference {
        ComputePreference::Auto | ComputePreference::Cpu => Ok(Arc::new(CpuBackend)),
        ComputePreference::Gpu => Err(SonomapError::BackendUnavailable {
            backend: "gpu".to_string(),
            message: "no GPU backend is built into this host".to_string(),
        }),
    }
}

// ============================================================================
// Request/response envelope
// ============================================================================

/// A logical compute request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComputeRequest {
    Receivers {
        scene: Scene,
        engine_config: EngineConfig,
        /// Restrict the response to these receivers; `None` means all.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        receiver_ids: Option<Vec<String>>,
    },
    Panel {
        scene: Scene,
        engine_config: EngineConfig,
        panel_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sampling: Option<PanelSampling>,
    },
    Grid {
        scene: Scene,
        engine_config: EngineConfig,
        grid: GridConfig,
    },
    Probe {
        probe: ProbeRequest,
        engine_config: EngineConfig,
    },
}

/// The result payload of a compute response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComputeOutcome {
    Receivers { results: Vec<ReceiverResult> },
    Panel { result: PanelResult },
    Grid { result: GridResult },
    Probe { result: FrequencyResponse },
}

/// Response envelope shared by every request kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComputeResponse {
    pub outcome: ComputeOutcome,
    /// Stable hash of the normalized request, for caller-side caching.
    pub scene_hash: String,
    pub backend_id: String,
    pub timings_ms: f64,
    pub warnings: Vec<String>,
}

/// Validate, execute and wrap one request on the given backend.
pub fn dispatch(backend: &dyn ComputeBackend, request: &ComputeRequest) -> Result<ComputeResponse> {
    let started = Instant::now();
    let scene_hash = stable_hash(request)?;
    let mut warnings = Vec::new();

    let outcome = match request {
        ComputeRequest::Receivers {
            scene,
            engine_config,
            receiver_ids,
        } => {
            scene.validate()?;
            warn_on_unreachable_sources(scene, engine_config, &mut warnings);
            let mut results = backend.compute_receivers(scene, engine_config)?;
            if let Some(ids) = receiver_ids {
                results.retain(|r| ids.contains(&r.receiver_id));
            }
            ComputeOutcome::Receivers { results }
        }
        ComputeRequest::Panel {
            scene,
            engine_config,
            panel_id,
            sampling,
        } => {
            scene.validate()?;
            let result = backend.compute_panel(scene, panel_id, sampling.as_ref(), engine_config)?;
            let cap = sampling
                .as_ref()
                .map(|s| s.point_cap)
                .unwrap_or_else(|| scene.panel(panel_id).map(|p| p.sampling.point_cap).unwrap_or(0));
            if cap > 0 && result.sample_count == cap {
                warnings.push(format!(
                    "panel '{panel_id}' sampling hit the {cap}-point cap; grid was thinned"
                ));
            }
            ComputeOutcome::Panel { result }
        }
        ComputeRequest::Grid {
            scene,
            engine_config,
            grid,
        } => {
            scene.validate()?;
            let result = backend.compute_grid(scene, grid, engine_config)?;
            ComputeOutcome::Grid { result }
        }
        ComputeRequest::Probe {
            probe,
            engine_config,
        } => ComputeOutcome::Probe {
            result: backend.compute_probe(probe, engine_config)?,
        },
    };

    Ok(ComputeResponse {
        outcome,
        scene_hash,
        backend_id: backend.id().to_string(),
        timings_ms: started.elapsed().as_secs_f64() * 1e3,
        warnings,
    })
}

fn warn_on_unreachable_sources(scene: &Scene, config: &EngineConfig, warnings: &mut Vec<String>) {
    for source in scene.admitted_sources() {
        let reachable = scene.receivers.iter().any(|r| {
            source.position.distance_to(&r.position) <= config.propagation.max_distance
        });
        if !scene.receivers.is_empty() && !reachable {
            warnings.push(format!(
                "source '{}' is beyond max_distance of every receiver",
                source.id
            ));
        }
    }
}

// ============================================================================
// Stable request hashing
// ============================================================================

/// Deterministic hash of any serializable value: canonical JSON (object
/// keys sorted, no insignificant whitespace) folded through FNV-1a 64.
/// Identical requests hash identically across processes and platforms.
pub fn stable_hash<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_value(value)?;
    let mut canonical = String::new();
    write_canonical_json(&json, &mut canonical);
    Ok(format!("{:016x}", fnv1a64(canonical.as_bytes())))
}

fn write_canonical_json(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical_json(&map[*key], out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical_json(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Point2, Receiver};
    use crate::spectrum::Spectrum9;

    fn scene() -> Scene {
        Scene {
            sources: vec![Source {
                id: "s1".into(),
                position: Point3::new(0.0, 0.0, 1.0),
                spectrum: Spectrum9::flat(95.0),
                gain_db: 0.0,
                enabled: true,
            }],
            receivers: vec![Receiver {
                id: "r1".into(),
                position: Point3::new(25.0, 0.0, 1.5),
            }],
            ..Scene::default()
        }
    }

    #[test]
    fn test_mode_defaults() {
        let fast = EngineConfig::default_for(EngineMode::FestivalFast);
        assert_eq!(fast.propagation.ground_model, GroundModel::Simplified);
        assert_eq!(fast.propagation.atmosphere, AtmosphereModel::Simple);

        let strict = EngineConfig::default_for(EngineMode::StandardsStrict);
        assert_eq!(strict.propagation.ground_model, GroundModel::TwoRayPhasor);
        assert_eq!(strict.propagation.atmosphere, AtmosphereModel::Iso9613);
    }

    #[test]
    fn test_backend_selection() {
        assert_eq!(select_backend(ComputePreference::Auto).unwrap().id(), "cpu");
        assert_eq!(select_backend(ComputePreference::Cpu).unwrap().id(), "cpu");
        let err = select_backend(ComputePreference::Gpu).unwrap_err();
        assert!(err.is_backend_error());
    }

    #[test]
    fn test_dispatch_receivers_envelope() {
        let backend = CpuBackend;
        let request = ComputeRequest::Receivers {
            scene: scene(),
            engine_config: EngineConfig::default(),
            receiver_ids: None,
        };
        let response = dispatch(&backend, &request).unwrap();
        assert_eq!(response.backend_id, "cpu");
        assert!(response.timings_ms >= 0.0);
        assert_eq!(response.scene_hash.len(), 16);
        match response.outcome {
            ComputeOutcome::Receivers { results } => {
                assert_eq!(results.len(), 1);
                assert!(results[0].laeq.is_finite());
            }
            _ => panic!("wrong outcome kind"),
        }
    }

    #[test]
    fn test_dispatch_filters_receiver_ids() {
        let backend = CpuBackend;
        let mut s = scene();
        s.receivers.push(Receiver {
            id: "r2".into(),
            position: Point3::new(50.0, 0.0, 1.5),
        });
        let request = ComputeRequest::Receivers {
            scene: s,
            engine_config: EngineConfig::default(),
            receiver_ids: Some(vec!["r2".into()]),
        };
        let response = dispatch(&backend, &request).unwrap();
        match response.outcome {
            ComputeOutcome::Receivers { results } => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].receiver_id, "r2");
            }
            _ => panic!("wrong outcome kind"),
        }
    }

    #[test]
    fn test_stable_hash_is_order_insensitive_and_value_sensitive() {
        let a: serde_json::Value = serde_json::from_str(r#"{"x": 1, "y": [2, 3]}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"y": [2, 3], "x": 1}"#).unwrap();
        assert_eq!(stable_hash(&a).unwrap(), stable_hash(&b).unwrap());

        let c: serde_json::Value = serde_json::from_str(r#"{"x": 1, "y": [3, 2]}"#).unwrap();
        assert_ne!(stable_hash(&a).unwrap(), stable_hash(&c).unwrap());
    }

    #[test]
    fn test_identical_requests_hash_identically() {
        let request = ComputeRequest::Probe {
            probe: ProbeRequest {
                position: Point3::new(1.0, 2.0, 1.5),
                sources: scene().sources,
                walls: vec![Barrier {
                    id: "w".into(),
                    start: Point2::new(0.0, -1.0),
                    end: Point2::new(0.0, 1.0),
                    height: 3.0,
                }],
            },
            engine_config: EngineConfig::default(),
        };
        let h1 = stable_hash(&request).unwrap();
        let h2 = stable_hash(&request.clone()).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_probe_dispatch() {
        let backend = CpuBackend;
        let request = ComputeRequest::Probe {
            probe: ProbeRequest {
                position: Point3::new(10.0, 0.0, 1.5),
                sources: scene().sources,
                walls: Vec::new(),
            },
            engine_config: EngineConfig::default(),
        };
        let response = dispatch(&backend, &request).unwrap();
        match response.outcome {
            ComputeOutcome::Probe { result } => {
                assert!(result.magnitudes.iter().all(|m| m.is_finite()));
            }
            _ => panic!("wrong outcome kind"),
        }
    }
}
