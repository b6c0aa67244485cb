//! sonomap - outdoor noise-propagation calculator
//!
//! Loads a scene JSON, computes receiver levels, panel statistics and an
//! optional heatmap grid or probe response, and prints the results as
//! tables or writes them as JSON.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use schemars::schema_for;
use std::path::PathBuf;

use sonomap::service::{ComputeOutcome, dispatch};
use sonomap::{
    ComputePreference, ComputeRequest, EngineConfig, EngineMode, GridBounds, GridConfig, Point3,
    Scene, select_backend,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Fast interactive models
    FestivalFast,
    /// Higher-fidelity models
    StandardsStrict,
}

impl From<ModeArg> for EngineMode {
    fn from(mode: ModeArg) -> EngineMode {
        match mode {
            ModeArg::FestivalFast => EngineMode::FestivalFast,
            ModeArg::StandardsStrict => EngineMode::StandardsStrict,
        }
    }
}

/// Compute weighted noise levels for a site plan
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the scene JSON file
    #[arg(short, long, required_unless_present = "schema")]
    scene: Option<PathBuf>,

    /// Engine mode
    #[arg(long, value_enum, default_value_t = ModeArg::FestivalFast)]
    mode: ModeArg,

    /// Backend preference
    #[arg(long, value_enum, default_value_t = BackendArg::Auto)]
    backend: BackendArg,

    /// Compute only this panel (default: every panel in the scene)
    #[arg(long)]
    panel: Option<String>,

    /// Heatmap grid bounds as min_x,min_y,max_x,max_y (m)
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    grid: Option<Vec<f64>>,

    /// Heatmap grid resolution (m)
    #[arg(long, default_value_t = 5.0)]
    grid_resolution: f64,

    /// Heatmap evaluation height (m)
    #[arg(long, default_value_t = 1.5)]
    grid_height: f64,

    /// Probe a single point as x,y,z (m) and print its band response
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    probe: Option<Vec<f64>>,

    /// Write all responses as JSON to this file instead of tables
    #[arg(long)]
    json: Option<PathBuf>,

    /// Dump the scene JSON schema and exit
    #[arg(long)]
    schema: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Auto,
    Cpu,
    Gpu,
}

impl From<BackendArg> for ComputePreference {
    fn from(backend: BackendArg) -> ComputePreference {
        match backend {
            BackendArg::Auto => ComputePreference::Auto,
            BackendArg::Cpu => ComputePreference::Cpu,
            BackendArg::Gpu => ComputePreference::Gpu,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.schema {
        let schema = schema_for!(Scene);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let scene_path = args.scene.as_ref().context("--scene is required")?;
    let scene_json = std::fs::read_to_string(scene_path)
        .with_context(|| format!("reading scene file {}", scene_path.display()))?;
    let scene = Scene::from_json(&scene_json).context("parsing scene")?;
    info!(
        "scene: {} sources, {} receivers, {} panels, {} barriers, {} buildings",
        scene.sources.len(),
        scene.receivers.len(),
        scene.panels.len(),
        scene.barriers.len(),
        scene.buildings.len()
    );

    let backend = match select_backend(args.backend.into()) {
        Ok(backend) => backend,
        Err(e) if e.is_backend_error() => {
            warn!("{e}; falling back to cpu");
            select_backend(ComputePreference::Cpu)?
        }
        Err(e) => return Err(e.into()),
    };
    let engine_config = EngineConfig::default_for(args.mode.into());

    let mut requests = vec![ComputeRequest::Receivers {
        scene: scene.clone(),
        engine_config,
        receiver_ids: None,
    }];

    let panel_ids: Vec<String> = match &args.panel {
        Some(id) => vec![id.clone()],
        None => scene.panels.iter().map(|p| p.id.clone()).collect(),
    };
    for panel_id in panel_ids {
        requests.push(ComputeRequest::Panel {
            scene: scene.clone(),
            engine_config,
            panel_id,
            sampling: None,
        });
    }

    if let Some(bounds) = &args.grid {
        requests.push(ComputeRequest::Grid {
            scene: scene.clone(),
            engine_config,
            grid: GridConfig {
                bounds: GridBounds {
                    min_x: bounds[0],
                    min_y: bounds[1],
                    max_x: bounds[2],
                    max_y: bounds[3],
                },
                resolution: args.grid_resolution,
                height: args.grid_height,
            },
        });
    }

    if let Some(point) = &args.probe {
        requests.push(ComputeRequest::Probe {
            probe: sonomap::service::ProbeRequest {
                position: Point3::new(point[0], point[1], point[2]),
                sources: scene.sources.clone(),
                walls: scene.barriers.clone(),
            },
            engine_config,
        });
    }

    let mut responses = Vec::new();
    for request in &requests {
        let response = dispatch(backend.as_ref(), request)?;
        for warning in &response.warnings {
            warn!("{warning}");
        }
        responses.push(response);
    }

    if let Some(path) = &args.json {
        std::fs::write(path, serde_json::to_string_pretty(&responses)?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("wrote {} responses to {}", responses.len(), path.display());
        return Ok(());
    }

    for response in &responses {
        print_outcome(&response.outcome);
        info!(
            "backend={} hash={} took {:.1} ms",
            response.backend_id, response.scene_hash, response.timings_ms
        );
    }
    Ok(())
}

fn print_outcome(outcome: &ComputeOutcome) {
    match outcome {
        ComputeOutcome::Receivers { results } => {
            println!("receiver      LAeq    LCeq    LZeq");
            for r in results {
                println!(
                    "{:<12} {:>6.1}  {:>6.1}  {:>6.1}",
                    r.receiver_id, r.laeq, r.lceq, r.lzeq
                );
            }
        }
        ComputeOutcome::Panel { result } => {
            let s = &result.stats;
            println!(
                "panel {} ({} samples): min {:.1} / avg {:.1} / max {:.1} dB(A)",
                result.panel_id, result.sample_count, s.laeq_min, s.laeq_avg, s.laeq_max
            );
            println!(
                "  p25 {:.1}  p50 {:.1}  p75 {:.1}  p95 {:.1}",
                s.laeq_p25, s.laeq_p50, s.laeq_p75, s.laeq_p95
            );
        }
        ComputeOutcome::Grid { result } => {
            println!(
                "grid {}x{} ({} values)",
                result.cols,
                result.rows,
                result.values.len()
            );
        }
        ComputeOutcome::Probe { result } => {
            println!("freq (Hz)   level (dB)");
            for (f, m) in result.frequencies.iter().zip(result.magnitudes.iter()) {
                println!("{:>8.0}   {:>8.1}", f, m);
            }
        }
    }
}
