//! Strongly-typed scene model.
//!
//! Scene payloads are deserialized through this schema-validated layer;
//! the compute engine only ever operates on the validated representation,
//! never on loosely-typed JSON.

use crate::error::{Result, SonomapError};
use crate::spectrum::Spectrum9;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod geometry;
pub mod sampling;

/// A 2D site-plan point (m).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Point2 { x, y }
    }

    pub fn distance_to(&self, other: &Point2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A 3D point (m); `z` is height above ground.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Point3 { x, y, z }
    }

    /// Euclidean 3D distance.
    pub fn distance_to(&self, other: &Point3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Horizontal (2D) projection.
    pub fn xy(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

/// A sound source: position, per-band sound power spectrum (dB Lw), scalar
/// gain and an enabled flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Source {
    pub id: String,
    pub position: Point3,
    /// Sound power level per octave band (dB Lw).
    pub spectrum: Spectrum9,
    /// Additive gain applied to every band (dB).
    #[serde(default)]
    pub gain_db: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Source {
    /// Sound power level of band `i` including the gain offset.
    pub fn band_power(&self, i: usize) -> f64 {
        self.spectrum.band(i) + self.gain_db
    }
}

/// A receiver point. Results are produced by the compute engine; the scene
/// only carries the position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Receiver {
    pub id: String,
    pub position: Point3,
}

/// Sampling specification for a panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PanelSampling {
    /// Grid spacing (m).
    #[serde(default = "default_resolution")]
    pub resolution_m: f64,
    /// Hard cap on the number of sample points.
    #[serde(default = "default_point_cap")]
    pub point_cap: usize,
}

fn default_resolution() -> f64 {
    2.0
}
fn default_point_cap() -> usize {
    400
}
fn default_true() -> bool {
    true
}
fn default_elevation() -> f64 {
    1.5
}

impl Default for PanelSampling {
    fn default() -> Self {
        PanelSampling {
            resolution_m: default_resolution(),
            point_cap: default_point_cap(),
        }
    }
}

/// A measurement panel: a polygon sampled on a grid at a fixed elevation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Panel {
    pub id: String,
    /// Polygon outline (consistently wound, CCW not required).
    pub polygon: Vec<Point2>,
    /// Sample elevation above ground (m).
    #[serde(default = "default_elevation")]
    pub elevation: f64,
    #[serde(default)]
    pub sampling: PanelSampling,
}

/// A noise barrier: a wall segment with a height. Contributes Maekawa
/// diffraction, never blocks binarily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Barrier {
    pub id: String,
    pub start: Point2,
    pub end: Point2,
    pub height: f64,
}

/// A building: a polygon footprint with a height. Binary occluder only,
/// never a sound source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Building {
    pub id: String,
    pub footprint: Vec<Point2>,
    pub height: f64,
}

/// The complete site plan consumed by the compute engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub receivers: Vec<Receiver>,
    #[serde(default)]
    pub panels: Vec<Panel>,
    #[serde(default)]
    pub barriers: Vec<Barrier>,
    #[serde(default)]
    pub buildings: Vec<Building>,
    /// When set, only this source contributes (solo mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solo_source_id: Option<String>,
}

impl Scene {
    /// Parse and validate a scene from JSON.
    pub fn from_json(json: &str) -> Result<Scene> {
        let scene: Scene = serde_json::from_str(json)?;
        scene.validate()?;
        Ok(scene)
    }

    /// Structural validation: duplicate ids, degenerate polygons and
    /// zero-length barriers are scene-construction bugs and fail fast.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        let all_ids = self
            .sources
            .iter()
            .map(|s| &s.id)
            .chain(self.receivers.iter().map(|r| &r.id))
            .chain(self.panels.iter().map(|p| &p.id))
            .chain(self.barriers.iter().map(|b| &b.id))
            .chain(self.buildings.iter().map(|b| &b.id));
        for id in all_ids {
            if !seen.insert(id.clone()) {
                return Err(SonomapError::InvalidScene {
                    message: format!("duplicate entity id '{id}'"),
                });
            }
        }

        for panel in &self.panels {
            if panel.polygon.len() < 3 {
                return Err(SonomapError::InvalidScene {
                    message: format!("panel '{}' polygon has fewer than 3 vertices", panel.id),
                });
            }
            if panel.sampling.resolution_m <= 0.0 {
                return Err(SonomapError::InvalidScene {
                    message: format!("panel '{}' sampling resolution must be positive", panel.id),
                });
            }
            if panel.sampling.point_cap == 0 {
                return Err(SonomapError::InvalidScene {
                    message: format!("panel '{}' point cap must be at least 1", panel.id),
                });
            }
        }
        for building in &self.buildings {
            if building.footprint.len() < 3 {
                return Err(SonomapError::InvalidScene {
                    message: format!(
                        "building '{}' footprint has fewer than 3 vertices",
                        building.id
                    ),
                });
            }
        }
        for barrier in &self.barriers {
            if barrier.start.distance_to(&barrier.end) <= 0.0 {
                return Err(SonomapError::InvalidScene {
                    message: format!("barrier '{}' has zero length", barrier.id),
                });
            }
        }

        if let Some(solo) = &self.solo_source_id {
            if !self.sources.iter().any(|s| &s.id == solo) {
                return Err(SonomapError::UnknownEntity { id: solo.clone() });
            }
        }
        Ok(())
    }

    /// Sources that contribute energy: enabled, and matching the solo
    /// source when solo mode is active.
    pub fn admitted_sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter().filter(move |s| {
            s.enabled
                && self
                    .solo_source_id
                    .as_ref()
                    .map(|solo| solo == &s.id)
                    .unwrap_or(true)
        })
    }

    /// Look up a panel by id.
    pub fn panel(&self, id: &str) -> Result<&Panel> {
        self.panels
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| SonomapError::UnknownEntity { id: id.to_string() })
    }

    /// Look up a source by id.
    pub fn source(&self, id: &str) -> Result<&Source> {
        self.sources
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| SonomapError::UnknownEntity { id: id.to_string() })
    }

    /// A view of this scene in which only `source_id` is audible. Used by
    /// the incremental drag path to compute one source's contribution.
    pub fn single_source_view(&self, source_id: &str) -> Result<Scene> {
        self.source(source_id)?;
        let mut view = self.clone();
        view.solo_source_id = None;
        for source in &mut view.sources {
            source.enabled = source.enabled && source.id == source_id;
        }
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MIN_LEVEL;

    fn scene_with_two_sources() -> Scene {
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
                    position: Point3::new(20.0, 0.0, 1.0),
                    spectrum: Spectrum9::flat(95.0),
                    gain_db: -3.0,
                    enabled: false,
                },
            ],
            ..Scene::default()
        }
    }

    #[test]
    fn test_admitted_sources_respects_enabled_and_solo() {
        let mut scene = scene_with_two_sources();
        let ids: Vec<_> = scene.admitted_sources().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec!["s1"]);

        scene.sources[1].enabled = true;
        scene.solo_source_id = Some("s2".into());
        let ids: Vec<_> = scene.admitted_sources().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec!["s2"]);
    }

    #[test]
    fn test_single_source_view() {
        let mut scene = scene_with_two_sources();
        scene.sources[1].enabled = true;
        let view = scene.single_source_view("s2").unwrap();
        let ids: Vec<_> = view.admitted_sources().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec!["s2"]);
        assert!(view.single_source_view("nope").is_err());
    }

    #[test]
    fn test_validate_rejects_duplicates_and_degenerates() {
        let mut scene = scene_with_two_sources();
        scene.receivers.push(Receiver {
            id: "s1".into(),
            position: Point3::new(0.0, 0.0, 1.5),
        });
        assert!(scene.validate().is_err());

        let scene = Scene {
            barriers: vec![Barrier {
                id: "w".into(),
                start: Point2::new(1.0, 1.0),
                end: Point2::new(1.0, 1.0),
                height: 3.0,
            }],
            ..Scene::default()
        };
        assert!(scene.validate().is_err());
    }

    #[test]
    fn test_scene_json_round_trip() {
        let json = r#"{
            "sources": [{
                "id": "s1",
                "position": {"x": 0, "y": 0, "z": 1},
                "spectrum": [90, 92, 94, 96, 95, 93, 90, 85, 80]
            }],
            "receivers": [{"id": "r1", "position": {"x": 30, "y": 0, "z": 1.5}}]
        }"#;
        let scene = Scene::from_json(json).unwrap();
        assert_eq!(scene.sources.len(), 1);
        assert!(scene.sources[0].enabled);
        assert_eq!(scene.sources[0].gain_db, 0.0);
        assert!(scene.sources[0].spectrum.band(0) > MIN_LEVEL);

        // Wrong spectrum length is a contract violation, not a coercion
        let bad = r#"{
            "sources": [{
                "id": "s1",
                "position": {"x": 0, "y": 0},
                "spectrum": [90, 92, 94]
            }]
        }"#;
        assert!(Scene::from_json(bad).is_err());
    }
}
