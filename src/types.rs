//! Shared types used across the grid, pipeline stages, and external contracts.

use glam::{DVec3, Vec3};

/// Integer grid cell index `(i, j)`.
///
/// The world position of a cell is `(i*delta, j*delta, z)` in the SCM frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellIndex {
    pub i: i32,
    pub j: i32,
}

impl CellIndex {
    pub fn new(i: i32, j: i32) -> Self {
        Self { i, j }
    }

    /// The four 4-connected (N/S/E/W) neighbors, used by flood fill (C5) and
    /// bulldozing dilation/smoothing (C8).
    pub fn neighbors4(self) -> [CellIndex; 4] {
        [
            CellIndex::new(self.i + 1, self.j),
            CellIndex::new(self.i - 1, self.j),
            CellIndex::new(self.i, self.j + 1),
            CellIndex::new(self.i, self.j - 1),
        ]
    }
}

/// World-space identity of an object the terrain can exert force on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContactableId(pub u64);

impl From<crate::external::ContactableRef> for ContactableId {
    fn from(r: crate::external::ContactableRef) -> Self {
        ContactableId(r.0)
    }
}

/// A rigid-body contactable: center of mass plus an accumulated
/// force/torque pair, submitted to the host integrator at step end.
#[derive(Clone, Copy, Debug, Default)]
pub struct RigidBodyAccumulator {
    pub force: DVec3,
    pub torque: DVec3,
}

impl RigidBodyAccumulator {
    /// Fold in a cell's force, applied at `world_point`, about `body_com`.
    pub fn accumulate(&mut self, world_point: DVec3, force: DVec3, body_com: DVec3) {
        self.force += force;
        self.torque += (world_point - body_com).cross(force);
    }
}

/// A finite-element triangle contactable: per-node force accumulators.
#[derive(Clone, Copy, Debug, Default)]
pub struct FeaTriangleAccumulator {
    pub node_forces: [DVec3; 3],
}

impl FeaTriangleAccumulator {
    /// Distribute `force` onto the three nodes by barycentric weight.
    pub fn accumulate(&mut self, barycentric: [f64; 3], force: DVec3) {
        for (node_force, weight) in self.node_forces.iter_mut().zip(barycentric) {
            *node_force += force * weight;
        }
    }
}

/// A generic parametric-surface contactable: attaches force at a fixed parametric location.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoadableSurfaceAccumulator {
    pub force: DVec3,
    // TODO: support more than one attachment point per surface once an
    // embedder actually needs it; today every hit on the surface folds into
    // this single accumulator at its fixed parametric location.
}

impl LoadableSurfaceAccumulator {
    pub fn accumulate(&mut self, force: DVec3) {
        self.force += force;
    }
}

/// Per-object soil-parameter override blended into the shear traction.
#[derive(Clone, Copy, Debug)]
pub struct ContactableData {
    pub cohesion: f64,
    pub friction_angle_deg: f64,
    pub janosi_shear: f64,
    /// Blend weight in `[0, 1]`: 0 = pure terrain shear law, 1 = pure
    /// object override.
    pub area_fraction: f64,
}

/// Convert a `glam::Vec3` (single precision, as used by most embedder APIs)
/// to the double-precision vectors used throughout the core.
#[inline]
pub fn to_dvec3(v: Vec3) -> DVec3 {
    DVec3::new(v.x as f64, v.y as f64, v.z as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbors4_are_4_connected() {
        let c = CellIndex::new(2, 3);
        let ns = c.neighbors4();
        assert!(ns.contains(&CellIndex::new(3, 3)));
        assert!(ns.contains(&CellIndex::new(1, 3)));
        assert!(ns.contains(&CellIndex::new(2, 4)));
        assert!(ns.contains(&CellIndex::new(2, 2)));
    }

    #[test]
    fn rigid_body_accumulate_sums_force_and_torque() {
        let mut acc = RigidBodyAccumulator::default();
        acc.accumulate(DVec3::new(1.0, 0.0, 0.0), DVec3::new(0.0, 0.0, 1.0), DVec3::ZERO);
        assert_eq!(acc.force, DVec3::new(0.0, 0.0, 1.0));
        // r x F = (1,0,0) x (0,0,1) = (0*1-0*0, 0*0-1*1, 1*0-0*0) = (0,-1,0)
        assert_eq!(acc.torque, DVec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn fea_triangle_accumulate_distributes_by_barycentric_weight() {
        let mut acc = FeaTriangleAccumulator::default();
        acc.accumulate([0.5, 0.3, 0.2], DVec3::new(10.0, 0.0, 0.0));
        assert_eq!(acc.node_forces[0], DVec3::new(5.0, 0.0, 0.0));
        assert_eq!(acc.node_forces[1], DVec3::new(3.0, 0.0, 0.0));
        assert_eq!(acc.node_forces[2], DVec3::new(2.0, 0.0, 0.0));
    }
}
