//! Parallel ray-cast dispatch over active-domain cells, map-reduced into a
//! single hit set.

use glam::DVec3;

use rayon::prelude::*;

use crate::config::ScmConfig;
use crate::domain::{ray_hits_obox, ActiveDomain};
use crate::external::{Body, CollisionService, ContactableRef};
use crate::grid::{BaseHeightfield, Grid};
use crate::types::CellIndex;

/// One successful ray-cast hit, produced by worker threads and folded into
/// the global hit set on the calling thread.
#[derive(Clone, Copy, Debug)]
pub struct RayCastHit {
    pub cell: CellIndex,
    pub contactable: ContactableRef,
    pub world_point: DVec3,
}

/// Tally of attempted vs. successful ray casts, for [`crate::metrics::StepStats`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DispatchCounts {
    pub ray_casts: u64,
    pub ray_hits: u64,
}

/// Cast rays over every cell in `cell_range`, optionally rejecting by a
/// ray-vs-OBB slab test against `domain_filter` (skipped entirely for the
/// default, unbounded domain).
///
/// This is the crate's only parallel region: `rayon`'s
/// `into_par_iter().filter_map(..).collect()` is a natural map-reduce here:
/// each logical "worker" (one cell) produces at most one hit
/// independently of the grid store and of every other cell, and rayon
/// folds the per-worker results into the returned `Vec` on completion.
/// Nothing in the closure mutates shared state; the grid and hit set are
/// both read-only during this call.
pub fn dispatch<H: BaseHeightfield>(
    grid: &Grid<H>,
    config: &ScmConfig,
    collision: &dyn CollisionService,
    domain_filter: Option<(&ActiveDomain, &dyn Body)>,
    cell_range: (CellIndex, CellIndex),
) -> (Vec<RayCastHit>, DispatchCounts) {
    let (lo, hi) = cell_range;

    let cells: Vec<CellIndex> = (lo.j..=hi.j)
        .flat_map(|j| (lo.i..=hi.i).map(move |i| CellIndex::new(i, j)))
        .collect();

    let ray_casts = std::sync::atomic::AtomicU64::new(0);
    let ray_hits = std::sync::atomic::AtomicU64::new(0);

    let hits: Vec<RayCastHit> = cells
        .into_par_iter()
        .filter_map(|cell| {
            let level = grid.height(cell);
            let delta = grid.delta();
            let x = cell.i as f64 * delta;
            let y = cell.j as f64 * delta;

            if let Some(boundary) = &config.boundary {
                if !boundary.contains(x, y) {
                    return None;
                }
            }

            let top_scm = DVec3::new(x, y, level + config.test_up);
            let bottom_scm = DVec3::new(x, y, level + config.test_up - config.test_down);
            let top_world = config.scm_to_world(top_scm);
            let bottom_world = config.scm_to_world(bottom_scm);

            if let Some((active_domain, body)) = domain_filter {
                let ray_origin_body = body.transform_point_parent_to_local(top_world);
                if !ray_hits_obox(ray_origin_body, active_domain.inv_normal_body_frame, &active_domain.obox) {
                    return None;
                }
            }

            ray_casts.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

            let hit = collision.ray_hit(bottom_world, top_world)?;
            ray_hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Some(RayCastHit {
                cell,
                contactable: hit.hit_model,
                world_point: hit.world_point,
            })
        })
        .collect();

    let counts = DispatchCounts {
        ray_casts: ray_casts.load(std::sync::atomic::Ordering::Relaxed),
        ray_hits: ray_hits.load(std::sync::atomic::Ordering::Relaxed),
    };

    (hits, counts)
}

/// Merge dispatch output into the grid: for every newly-hit cell absent
/// from the store, insert a fresh node record seeded from the base
/// heightfield. Runs on the calling (single) thread, after the parallel
/// region returns.
pub fn merge_hits<H: BaseHeightfield>(
    grid: &mut Grid<H>,
    hits: &[RayCastHit],
) -> std::collections::HashMap<CellIndex, RayCastHit> {
    let mut by_cell = std::collections::HashMap::with_capacity(hits.len());
    for hit in hits {
        grid.get_or_create(hit.cell);
        by_cell.insert(hit.cell, *hit);
    }
    by_cell
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::DenseHeightfield;

    struct AlwaysHit;
    impl CollisionService for AlwaysHit {
        fn ray_hit(&self, _from: DVec3, to: DVec3) -> Option<crate::external::RayHit> {
            Some(crate::external::RayHit {
                hit_model: ContactableRef(1),
                world_point: DVec3::new(to.x, to.y, -0.05),
            })
        }
        fn world_bounds(&self) -> (DVec3, DVec3) {
            (DVec3::splat(-10.0), DVec3::splat(10.0))
        }
    }

    struct NeverHit;
    impl CollisionService for NeverHit {
        fn ray_hit(&self, _from: DVec3, _to: DVec3) -> Option<crate::external::RayHit> {
            None
        }
        fn world_bounds(&self) -> (DVec3, DVec3) {
            (DVec3::splat(-10.0), DVec3::splat(10.0))
        }
    }

    #[test]
    fn no_hits_produces_empty_result() {
        let grid = Grid::new(DenseHeightfield::flat(2.0, 2.0, 0.5).unwrap());
        let config = ScmConfig::default();
        let range = (CellIndex::new(-2, -2), CellIndex::new(2, 2));
        let (hits, counts) = dispatch(&grid, &config, &NeverHit, None, range);
        assert!(hits.is_empty());
        assert_eq!(counts.ray_hits, 0);
        assert!(counts.ray_casts > 0);
    }

    #[test]
    fn every_cell_hits_when_collision_always_returns_a_hit() {
        let grid = Grid::new(DenseHeightfield::flat(1.0, 1.0, 0.5).unwrap());
        let config = ScmConfig::default();
        let range = (CellIndex::new(-1, -1), CellIndex::new(1, 1));
        let (hits, counts) = dispatch(&grid, &config, &AlwaysHit, None, range);
        assert_eq!(hits.len(), 9);
        assert_eq!(counts.ray_hits, 9);
    }

    #[test]
    fn merge_hits_creates_nodes_for_new_cells_only() {
        let mut grid = Grid::new(DenseHeightfield::flat(1.0, 1.0, 0.5).unwrap());
        let config = ScmConfig::default();
        let range = (CellIndex::new(-1, -1), CellIndex::new(1, 1));
        let (hits, _) = dispatch(&grid, &config, &AlwaysHit, None, range);
        assert_eq!(grid.len(), 0);
        merge_hits(&mut grid, &hits);
        assert_eq!(grid.len(), 9);
    }
}
