//! sonomap - outdoor noise-propagation compute engine
//!
//! Sources, receivers, measurement panels, barriers and buildings on a 2D
//! site plan; A/C/Z-weighted sound levels at receivers and across sampled
//! areas, using a simplified outdoor-acoustics propagation model:
//! - geometric spreading (spherical/cylindrical)
//! - atmospheric absorption (empirical or ISO 9613-1)
//! - ground effect (proximity proxy or two-ray phasor summation)
//! - Maekawa barrier diffraction
//!
//! Results combine across sources in the linear energy domain. The
//! orchestration layer keeps per-receiver and per-panel energy totals and
//! patches them incrementally while a source is dragged, guarded by
//! generation counters so out-of-order async responses are discarded
//! rather than applied.

/// Shared physical constants and band tables.
pub mod constants;
/// Error types for sonomap operations.
pub mod error;
pub use error::{Result, SonomapError};

/// Scene compute engine: receivers, panels, grids and probes.
pub mod compute;
/// Async orchestration: energy ledger, drag contributions, generation counters.
pub mod orchestration;
/// Per-path attenuation models.
pub mod propagation;
/// Strongly-typed scene model and site-plan geometry.
pub mod scene;
/// Service layer: engine config, backends, request/response envelope.
pub mod service;
/// Decibel/energy conversions and frequency weighting.
pub mod spectrum;

// Re-export commonly used items
pub use compute::{
    FrequencyResponse, GridBounds, GridConfig, GridResult, PanelResult, PanelSample, PanelStats,
    ReceiverResult,
};
pub use orchestration::{ComputeOrchestrator, SceneLevels, patch_energy};
pub use propagation::{Meteo, PropagationConfig};
pub use scene::{Barrier, Building, Panel, Point2, Point3, Receiver, Scene, Source};
pub use service::{
    ComputeBackend, ComputePreference, ComputeRequest, ComputeResponse, CpuBackend, EngineConfig,
    EngineMode, select_backend,
};
pub use spectrum::{Spectrum9, Weighting};
