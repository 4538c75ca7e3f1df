//! 4-connected flood-fill segmentation of hit cells into contact patches,
//! with per-patch hull/area/perimeter/shape-factor.

use std::collections::{HashMap, HashSet, VecDeque};

use glam::DVec2;
use smallvec::SmallVec;

use crate::constants::MIN_PATCH_AREA;
use crate::raycast::RayCastHit;
use crate::types::CellIndex;

/// Most contact patches span a handful of cells; inline storage avoids a
/// heap allocation for the common single-wheel-print case (mirrors the
/// octree's `SmallVec<[_; 8]>` children list).
pub type PatchCells = SmallVec<[CellIndex; 8]>;

/// A connected group of hit cells sharing a Bekker shape factor.
#[derive(Clone, Debug)]
pub struct ContactPatch {
    pub cells: PatchCells,
    pub hull: Vec<DVec2>,
    pub area: f64,
    pub perimeter: f64,
    /// Bekker shape factor approximating `1/b`; `perimeter / (2*area)`, or
    /// zero if `area <= MIN_PATCH_AREA`.
    pub oob: f64,
}

/// Flood-fill every cell in `hits` into 4-connected patches and compute
/// each patch's geometry. Takes the merged ray-cast hit
/// set directly so callers never need an intermediate cell set.
pub fn segment(hits: &HashMap<CellIndex, RayCastHit>, delta: f64) -> Vec<ContactPatch> {
    let hit_cells = hits;
    let mut unvisited: HashSet<CellIndex> = hit_cells.keys().copied().collect();
    let mut patches = Vec::new();

    while let Some(&seed) = unvisited.iter().next() {
        unvisited.remove(&seed);
        let mut members: PatchCells = SmallVec::new();
        members.push(seed);
        let mut queue = VecDeque::new();
        queue.push_back(seed);

        while let Some(cell) = queue.pop_front() {
            for n in cell.neighbors4() {
                if unvisited.remove(&n) {
                    members.push(n);
                    queue.push_back(n);
                }
            }
        }

        patches.push(build_patch(members, delta));
    }

    patches
}

fn build_patch(cells: PatchCells, delta: f64) -> ContactPatch {
    let points: Vec<DVec2> = cells
        .iter()
        .map(|c| DVec2::new(c.i as f64 * delta, c.j as f64 * delta))
        .collect();
    let hull = convex_hull(&points);
    let area = polygon_area(&hull);
    let perimeter = polygon_perimeter(&hull);
    let oob = if area > MIN_PATCH_AREA { perimeter / (2.0 * area) } else { 0.0 };

    ContactPatch {
        cells,
        hull,
        area,
        perimeter,
        oob,
    }
}

/// Andrew's monotone-chain 2D convex hull, returned counter-clockwise with
/// no duplicate closing point.
fn convex_hull(points: &[DVec2]) -> Vec<DVec2> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap().then(a.y.partial_cmp(&b.y).unwrap()));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    fn cross(o: DVec2, a: DVec2, b: DVec2) -> f64 {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    }

    let mut lower = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

fn polygon_area(hull: &[DVec2]) -> f64 {
    if hull.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    (sum * 0.5).abs()
}

fn polygon_perimeter(hull: &[DVec2]) -> f64 {
    if hull.len() < 2 {
        return 0.0;
    }
    if hull.len() == 1 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        sum += (b - a).length();
    }
    sum
}
