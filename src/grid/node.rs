//! Per-cell persistent node record.

use glam::DVec3;

use crate::constants::NO_HIT_SENTINEL;

/// State for one touched grid cell. Created lazily on first ray hit (or
/// first bulldozing touch) and never destroyed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeRecord {
    /// Undeformed height at creation; may drift upward during bulldozing.
    pub level_initial: f64,
    /// Current height.
    pub level: f64,
    /// Height of the ray intersection this step; `+inf` if no hit this step.
    pub hit_level: f64,
    /// Undeformed surface normal at creation (unit vector, SCM frame).
    pub normal: DVec3,

    pub sinkage: f64,
    pub sinkage_elastic: f64,
    pub sinkage_plastic: f64,

    pub sigma: f64,
    pub sigma_yield: f64,

    /// Accumulated tangential shear displacement (Janosi state).
    pub kshear: f64,
    pub tau: f64,

    pub erosion: bool,
    pub massremainder: f64,
    pub step_plastic_flow: f64,
}

impl NodeRecord {
    /// A freshly-created node, initialized from the base heightfield at the
    /// cell that first triggered its creation.
    pub fn new(level_initial: f64, normal: DVec3) -> Self {
        Self {
            level_initial,
            level: level_initial,
            hit_level: NO_HIT_SENTINEL,
            normal,
            sinkage: 0.0,
            sinkage_elastic: 0.0,
            sinkage_plastic: 0.0,
            sigma: 0.0,
            sigma_yield: 0.0,
            kshear: 0.0,
            tau: 0.0,
            erosion: false,
            massremainder: 0.0,
            step_plastic_flow: 0.0,
        }
    }

    /// Clear the per-step hit state; called at the start of each step so a
    /// node that isn't hit this step reports no intersection.
    pub fn begin_step(&mut self) {
        self.hit_level = NO_HIT_SENTINEL;
        self.step_plastic_flow = 0.0;
    }

    /// `true` if this node has a valid ray hit recorded for the current step.
    pub fn has_hit_this_step(&self) -> bool {
        self.hit_level.is_finite()
    }

    /// Check the invariants that must hold at step end.
    #[cfg(test)]
    pub fn check_invariants(&self, tol: f64) {
        assert!(
            (self.sinkage_elastic + self.sinkage_plastic - self.sinkage).abs() < tol,
            "sinkage decomposition mismatch: {} + {} != {}",
            self.sinkage_elastic,
            self.sinkage_plastic,
            self.sinkage
        );
        assert!(self.sigma >= -tol, "sigma went tensile: {}", self.sigma);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_has_no_hit_and_zero_state() {
        let n = NodeRecord::new(1.5, DVec3::Z);
        assert_eq!(n.level_initial, 1.5);
        assert_eq!(n.level, 1.5);
        assert!(!n.has_hit_this_step());
        assert_eq!(n.sigma, 0.0);
    }

    #[test]
    fn begin_step_resets_hit_level() {
        let mut n = NodeRecord::new(0.0, DVec3::Z);
        n.hit_level = 0.4;
        n.step_plastic_flow = 2.0;
        n.begin_step();
        assert!(!n.has_hit_this_step());
        assert_eq!(n.step_plastic_flow, 0.0);
    }

    #[test]
    fn invariants_hold_for_consistent_state() {
        let mut n = NodeRecord::new(0.0, DVec3::Z);
        n.sinkage_elastic = 0.3;
        n.sinkage_plastic = 0.1;
        n.sinkage = 0.4;
        n.sigma = 10.0;
        n.check_invariants(1e-9);
    }

    #[test]
    #[should_panic(expected = "sinkage decomposition mismatch")]
    fn invariants_catch_decomposition_mismatch() {
        let mut n = NodeRecord::new(0.0, DVec3::Z);
        n.sinkage_elastic = 0.3;
        n.sinkage_plastic = 0.1;
        n.sinkage = 1.0;
        n.check_invariants(1e-9);
    }
}
