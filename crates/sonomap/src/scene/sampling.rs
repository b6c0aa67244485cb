//! Deterministic grid sampling of measurement panels.

use super::geometry::point_in_polygon;
use super::{Panel, PanelSampling, Point2, Point3};

const EPS: f64 = 1e-9;

/// Linearly spaced coordinates from `start` to `end` inclusive at `step`
/// spacing. The end point is kept when it lands on the grid.
fn grid_axis(start: f64, end: f64, step: f64) -> Vec<f64> {
    let mut out = Vec::new();
    let mut v = start;
    while v <= end + EPS {
        out.push(v);
        v += step;
    }
    out
}

/// Derive the finite, deterministic sample point set for a panel: a grid at
/// the sampling resolution over the polygon bounding box, clipped to the
/// polygon (boundary inclusive), thinned to the point cap, at the panel
/// elevation.
pub fn sample_panel_points(panel: &Panel, sampling: &PanelSampling) -> Vec<Point3> {
    let polygon = &panel.polygon;
    if polygon.len() < 3 {
        return Vec::new();
    }
    let step = sampling.resolution_m.max(1e-3);

    let min_x = polygon.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = polygon.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = polygon.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_y = polygon.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

    let mut points = Vec::new();
    for y in grid_axis(min_y, max_y, step) {
        for x in grid_axis(min_x, max_x, step) {
            if point_in_polygon(Point2::new(x, y), polygon) {
                points.push(Point3::new(x, y, panel.elevation));
            }
        }
    }

    // Thin with a deterministic stride rather than truncating, so a capped
    // panel still covers the whole polygon
    let cap = sampling.point_cap.max(1);
    if points.len() > cap {
        let stride = points.len().div_ceil(cap);
        points = points.into_iter().step_by(stride).collect();
    }
    points
}
