//! 2D site-plan geometry: segment intersection, point-in-polygon,
//! line-of-sight occlusion and barrier path-length differences.

use super::{Barrier, Building, Point2, Point3};
use crate::propagation::BarrierDiffractionMode;

const EPS: f64 = 1e-9;

/// Intersection of segments `a1->a2` and `b1->b2`, if any, returned as the
/// parameter `t` along `a1->a2` together with the intersection point.
pub fn segment_intersection(a1: Point2, a2: Point2, b1: Point2, b2: Point2) -> Option<(f64, Point2)> {
    let r = Point2::new(a2.x - a1.x, a2.y - a1.y);
    let s = Point2::new(b2.x - b1.x, b2.y - b1.y);
    let denom = r.x * s.y - r.y * s.x;
    if denom.abs() < EPS {
        // Parallel or collinear segments do not produce a crossing point
        return None;
    }
    let qp = Point2::new(b1.x - a1.x, b1.y - a1.y);
    let t = (qp.x * s.y - qp.y * s.x) / denom;
    let u = (qp.x * r.y - qp.y * r.x) / denom;
    if (-EPS..=1.0 + EPS).contains(&t) && (-EPS..=1.0 + EPS).contains(&u) {
        let t = t.clamp(0.0, 1.0);
        Some((t, Point2::new(a1.x + t * r.x, a1.y + t * r.y)))
    } else {
        None
    }
}

/// Distance from a point to a 2D segment.
fn point_segment_distance(p: Point2, a: Point2, b: Point2) -> f64 {
    let ab = Point2::new(b.x - a.x, b.y - a.y);
    let len_sq = ab.x * ab.x + ab.y * ab.y;
    if len_sq < EPS * EPS {
        return p.distance_to(&a);
    }
    let t = (((p.x - a.x) * ab.x + (p.y - a.y) * ab.y) / len_sq).clamp(0.0, 1.0);
    p.distance_to(&Point2::new(a.x + t * ab.x, a.y + t * ab.y))
}

/// Ray-casting point-in-polygon test. Points lying on an edge count as
/// inside, which keeps panel samples on the outline of their polygon.
pub fn point_in_polygon(p: Point2, polygon: &[Point2]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[(i + 1) % polygon.len()];
        if point_segment_distance(p, a, b) < EPS.sqrt() {
            return true;
        }
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > p.y) != (pj.y > p.y)
            && p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// True when the 2D projection of the source-receiver path is cut off by
/// the building footprint and the lower of the two endpoints sits below
/// the building top.
pub fn path_blocked_by_building(source: Point3, receiver: Point3, building: &Building) -> bool {
    if source.z.min(receiver.z) >= building.height {
        return false;
    }
    let s = source.xy();
    let r = receiver.xy();
    if point_in_polygon(s, &building.footprint) || point_in_polygon(r, &building.footprint) {
        return true;
    }
    let n = building.footprint.len();
    for i in 0..n {
        let a = building.footprint[i];
        let b = building.footprint[(i + 1) % n];
        if segment_intersection(s, r, a, b).is_some() {
            return true;
        }
    }
    false
}

/// True when any building in the scene occludes the path.
pub fn los_occluded(source: Point3, receiver: Point3, buildings: &[Building]) -> bool {
    buildings
        .iter()
        .any(|b| path_blocked_by_building(source, receiver, b))
}

/// Maekawa path-length difference (m) introduced by one barrier, or 0 when
/// the barrier does not cut the path or its top sits below the line of
/// sight.
///
/// With side diffraction enabled, the detours around both barrier ends
/// compete with the over-top path and the shortest wins.
pub fn barrier_path_difference(
    source: Point3,
    receiver: Point3,
    barrier: &Barrier,
    mode: BarrierDiffractionMode,
) -> f64 {
    let s = source.xy();
    let r = receiver.xy();
    let Some((t, _crossing)) = segment_intersection(s, r, barrier.start, barrier.end) else {
        return 0.0;
    };

    let horizontal = s.distance_to(&r);
    let los_height = source.z + (receiver.z - source.z) * t;
    if barrier.height <= los_height {
        return 0.0;
    }

    let dz = receiver.z - source.z;
    let direct = (horizontal * horizontal + dz * dz).sqrt();

    let d1 = t * horizontal;
    let d2 = (1.0 - t) * horizontal;
    let up = barrier.height - source.z;
    let down = barrier.height - receiver.z;
    let over_top = (d1 * d1 + up * up).sqrt() + (d2 * d2 + down * down).sqrt() - direct;

    let delta = match mode {
        BarrierDiffractionMode::OverTop => over_top,
        BarrierDiffractionMode::OverTopAndSides => {
            let mut best = over_top;
            for end in [barrier.start, barrier.end] {
                let detour = s.distance_to(&end) + end.distance_to(&r);
                let side = (detour * detour + dz * dz).sqrt() - direct;
                best = best.min(side);
            }
            best
        }
    };
    delta.max(0.0)
}

/// The largest path difference over all barriers cutting the path
/// (dominant-edge assumption; barrier terms are not stacked).
pub fn max_barrier_path_difference(
    source: Point3,
    receiver: Point3,
    barriers: &[Barrier],
    mode: BarrierDiffractionMode,
) -> f64 {
    barriers
        .iter()
        .map(|b| barrier_path_difference(source, receiver, b, mode))
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ]
    }

    #[test]
    fn test_segment_intersection() {
        let hit = segment_intersection(
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(5.0, -5.0),
            Point2::new(5.0, 5.0),
        );
        let (t, p) = hit.expect("segments cross");
        assert!((t - 0.5).abs() < 1e-9);
        assert!((p.x - 5.0).abs() < 1e-9 && p.y.abs() < 1e-9);

        assert!(segment_intersection(
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 1.0),
            Point2::new(10.0, 1.0),
        )
        .is_none());
    }

    #[test]
    fn test_point_in_polygon_boundary_inclusive() {
        let poly = square();
        assert!(point_in_polygon(Point2::new(5.0, 5.0), &poly));
        assert!(point_in_polygon(Point2::new(0.0, 5.0), &poly));
        assert!(point_in_polygon(Point2::new(10.0, 10.0), &poly));
        assert!(!point_in_polygon(Point2::new(10.1, 5.0), &poly));
        assert!(!point_in_polygon(Point2::new(-1.0, -1.0), &poly));
    }

    #[test]
    fn test_building_blocks_low_path_only() {
        let building = Building {
            id: "b1".into(),
            footprint: square(),
            height: 8.0,
        };
        let src = Point3::new(-5.0, 5.0, 2.0);
        let rcv = Point3::new(15.0, 5.0, 1.5);
        assert!(path_blocked_by_building(src, rcv, &building));

        // Both endpoints above the roof line clear the building
        let src_high = Point3::new(-5.0, 5.0, 9.0);
        let rcv_high = Point3::new(15.0, 5.0, 8.5);
        assert!(!path_blocked_by_building(src_high, rcv_high, &building));

        // A path that misses the footprint is clear
        let rcv_side = Point3::new(-5.0, 20.0, 1.5);
        assert!(!path_blocked_by_building(src, rcv_side, &building));
    }

    #[test]
    fn test_barrier_path_difference_over_top() {
        let barrier = Barrier {
            id: "w1".into(),
            start: Point2::new(5.0, -10.0),
            end: Point2::new(5.0, 10.0),
            height: 4.0,
        };
        let src = Point3::new(0.0, 0.0, 1.0);
        let rcv = Point3::new(10.0, 0.0, 1.5);
        let delta = barrier_path_difference(src, rcv, &barrier, BarrierDiffractionMode::OverTop);

        // Closed form: over the top at the crossing point x = 5
        let direct = (10.0_f64.powi(2) + 0.5_f64.powi(2)).sqrt();
        let expected = (25.0 + 9.0_f64).sqrt() + (25.0 + 6.25_f64).sqrt() - direct;
        assert!((delta - expected).abs() < 1e-9);

        // A barrier below the line of sight adds nothing
        let low = Barrier {
            height: 1.0,
            ..barrier.clone()
        };
        assert_eq!(
            barrier_path_difference(src, rcv, &low, BarrierDiffractionMode::OverTop),
            0.0
        );
    }

    #[test]
    fn test_side_diffraction_shortens_delta() {
        // Barrier end close to the path: going around is shorter than over
        let barrier = Barrier {
            id: "w1".into(),
            start: Point2::new(5.0, -1.0),
            end: Point2::new(5.0, 30.0),
            height: 12.0,
        };
        let src = Point3::new(0.0, 0.0, 1.0);
        let rcv = Point3::new(10.0, 0.0, 1.5);
        let over = barrier_path_difference(src, rcv, &barrier, BarrierDiffractionMode::OverTop);
        let side =
            barrier_path_difference(src, rcv, &barrier, BarrierDiffractionMode::OverTopAndSides);
        assert!(side < over);
        assert!(side >= 0.0);
    }
}
