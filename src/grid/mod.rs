//! Sparse mapping from integer cell index to persistent per-node state.
//!
//! A hash map, not a dense array: only a tiny fraction of cells are ever
//! touched in a typical run. Missing lookups fall through to the base
//! heightfield and a bilinear normal estimator.

pub mod node;

use std::collections::{HashMap, HashSet};

use glam::DVec3;

pub use node::NodeRecord;

/// Base (undeformed) heightfield the grid falls through to for any cell
/// without a [`NodeRecord`] yet. Implemented by [`crate::init`]'s three
/// initializer modes (flat / heightmap / triangle mesh).
pub trait BaseHeightfield: Send + Sync {
    /// Grid half-extent in cells along x.
    fn n_x(&self) -> i32;
    /// Grid half-extent in cells along y.
    fn n_y(&self) -> i32;
    /// Uniform grid spacing.
    fn delta(&self) -> f64;
    /// Undeformed height at cell `(i, j)`, clamped to the grid interior.
    fn height(&self, i: i32, j: i32) -> f64;

    /// Clamp a raw index to `[-n, n]`.
    fn clamp_index(n: i32, v: i32) -> i32 {
        v.clamp(-n, n)
    }
}

/// Sparse grid + node store.
pub struct Grid<H: BaseHeightfield> {
    base: H,
    nodes: HashMap<CellIndexKey, NodeRecord>,
    /// Cells touched this step (by contact, bulldozing, or an explicit
    /// `SetModifiedNodes`); cleared at the start of the next step.
    modified_this_step: HashSet<CellIndexKey>,
}

/// Re-exported under the grid module for convenience; identical to
/// [`crate::types::CellIndex`].
pub type CellIndexKey = crate::types::CellIndex;

impl<H: BaseHeightfield> Grid<H> {
    pub fn new(base: H) -> Self {
        Self {
            base,
            nodes: HashMap::new(),
            modified_this_step: HashSet::new(),
        }
    }

    pub fn base(&self) -> &H {
        &self.base
    }

    pub fn n_x(&self) -> i32 {
        self.base.n_x()
    }

    pub fn n_y(&self) -> i32 {
        self.base.n_y()
    }

    pub fn delta(&self) -> f64 {
        self.base.delta()
    }

    /// Bilinear (four-neighbor central-difference) normal estimate of the
    /// base heightfield at cell `(i, j)`.
    pub fn base_normal(&self, i: i32, j: i32) -> DVec3 {
        let d = self.base.delta();
        let h_px = self.base.height(i + 1, j);
        let h_mx = self.base.height(i - 1, j);
        let h_py = self.base.height(i, j + 1);
        let h_my = self.base.height(i, j - 1);
        let dz_dx = (h_px - h_mx) / (2.0 * d);
        let dz_dy = (h_py - h_my) / (2.0 * d);
        DVec3::new(-dz_dx, -dz_dy, 1.0).normalize()
    }

    /// Current height at a cell: node state if present, base heightfield
    /// otherwise.
    pub fn height(&self, cell: CellIndexKey) -> f64 {
        match self.nodes.get(&cell) {
            Some(n) => n.level,
            None => self.base.height(cell.i, cell.j),
        }
    }

    /// Current surface normal at a cell: node state if present, bilinear
    /// base estimate otherwise.
    pub fn normal(&self, cell: CellIndexKey) -> DVec3 {
        match self.nodes.get(&cell) {
            Some(n) => n.normal,
            None => self.base_normal(cell.i, cell.j),
        }
    }

    pub fn get(&self, cell: CellIndexKey) -> Option<&NodeRecord> {
        self.nodes.get(&cell)
    }

    pub fn get_mut(&mut self, cell: CellIndexKey) -> Option<&mut NodeRecord> {
        self.nodes.get_mut(&cell)
    }

    pub fn contains(&self, cell: CellIndexKey) -> bool {
        self.nodes.contains_key(&cell)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get-or-create a node at `cell`, seeding it from the base heightfield
    /// the first time it is touched.
    pub fn get_or_create(&mut self, cell: CellIndexKey) -> &mut NodeRecord {
        self.nodes.entry(cell).or_insert_with(|| {
            let level_initial = self.base.height(cell.i, cell.j);
            let normal = {
                let d = self.base.delta();
                let h_px = self.base.height(cell.i + 1, cell.j);
                let h_mx = self.base.height(cell.i - 1, cell.j);
                let h_py = self.base.height(cell.i, cell.j + 1);
                let h_my = self.base.height(cell.i, cell.j - 1);
                let dz_dx = (h_px - h_mx) / (2.0 * d);
                let dz_dy = (h_py - h_my) / (2.0 * d);
                DVec3::new(-dz_dx, -dz_dy, 1.0).normalize()
            };
            NodeRecord::new(level_initial, normal)
        })
    }

    pub fn mark_modified(&mut self, cell: CellIndexKey) {
        self.modified_this_step.insert(cell);
    }

    pub fn modified_this_step(&self) -> impl Iterator<Item = CellIndexKey> + '_ {
        self.modified_this_step.iter().copied()
    }

    /// Clear the "modified this step" bookkeeping; called at the start of
    /// each step.
    pub fn begin_step(&mut self) {
        self.modified_this_step.clear();
        for node in self.nodes.values_mut() {
            node.begin_step();
        }
    }

    /// All `(cell, level)` pairs currently in the store, for checkpoint
    /// persistence.
    pub fn all_levels(&self) -> Vec<(CellIndexKey, f64)> {
        self.nodes.iter().map(|(c, n)| (*c, n.level)).collect()
    }

    /// Only cells modified this step, for incremental persistence.
    pub fn modified_levels(&self) -> Vec<(CellIndexKey, f64)> {
        self.modified_this_step
            .iter()
            .filter_map(|c| self.nodes.get(c).map(|n| (*c, n.level)))
            .collect()
    }

    /// Bulk-overwrite heights for checkpoint restore. `level_initial` is
    /// recomputed to match the restored `level` and `normal` is recomputed
    /// from the base heightfield; all other per-node fields reset — a
    /// documented lossy checkpoint.
    pub fn set_levels(&mut self, entries: &[(CellIndexKey, f64)]) {
        for &(cell, level) in entries {
            let normal = self.base_normal(cell.i, cell.j);
            let mut node = NodeRecord::new(level, normal);
            node.level = level;
            self.nodes.insert(cell, node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellIndex;

    struct FlatHeightfield {
        n: i32,
        delta: f64,
        height: f64,
    }

    impl BaseHeightfield for FlatHeightfield {
        fn n_x(&self) -> i32 {
            self.n
        }
        fn n_y(&self) -> i32 {
            self.n
        }
        fn delta(&self) -> f64 {
            self.delta
        }
        fn height(&self, _i: i32, _j: i32) -> f64 {
            self.height
        }
    }

    fn flat_grid() -> Grid<FlatHeightfield> {
        Grid::new(FlatHeightfield {
            n: 50,
            delta: 0.1,
            height: 0.0,
        })
    }

    #[test]
    fn missing_lookup_falls_through_to_base() {
        let grid = flat_grid();
        assert_eq!(grid.height(CellIndex::new(3, 3)), 0.0);
        assert_eq!(grid.normal(CellIndex::new(3, 3)), DVec3::Z);
    }

    #[test]
    fn get_or_create_seeds_from_base_once() {
        let mut grid = flat_grid();
        let cell = CellIndex::new(1, 1);
        assert!(!grid.contains(cell));
        {
            let node = grid.get_or_create(cell);
            node.level = 5.0;
        }
        assert!(grid.contains(cell));
        assert_eq!(grid.height(cell), 5.0);
        // Re-fetching does not reset the mutated state.
        grid.get_or_create(cell);
        assert_eq!(grid.height(cell), 5.0);
    }

    #[test]
    fn begin_step_clears_modified_and_hit_state() {
        let mut grid = flat_grid();
        let cell = CellIndex::new(0, 0);
        grid.get_or_create(cell).hit_level = 0.2;
        grid.mark_modified(cell);
        assert_eq!(grid.modified_this_step().count(), 1);

        grid.begin_step();
        assert_eq!(grid.modified_this_step().count(), 0);
        assert!(!grid.get(cell).unwrap().has_hit_this_step());
    }

    #[test]
    fn modified_levels_only_reports_touched_cells() {
        let mut grid = flat_grid();
        let a = CellIndex::new(0, 0);
        let b = CellIndex::new(1, 0);
        grid.get_or_create(a).level = 1.0;
        grid.get_or_create(b).level = 2.0;
        grid.mark_modified(a);

        let modified = grid.modified_levels();
        assert_eq!(modified, vec![(a, 1.0)]);
    }

    #[test]
    fn all_levels_round_trips_through_set_levels() {
        let mut grid = flat_grid();
        grid.get_or_create(CellIndex::new(2, -1)).level = 3.5;
        grid.get_or_create(CellIndex::new(-4, 4)).level = -1.25;

        let snapshot = grid.all_levels();

        let mut fresh = flat_grid();
        fresh.set_levels(&snapshot);

        for (cell, level) in snapshot {
            assert_eq!(fresh.height(cell), level);
        }
    }
}
