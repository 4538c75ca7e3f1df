//! Force distribution: combine each hit cell's normal/shear stress into a
//! world-space force, split it across its contact patch area, and fold it
//! into the owning contactable's accumulator.

use std::collections::HashMap;

use glam::DVec3;

use crate::external::{Contactable, ContactableRef};
use crate::types::{FeaTriangleAccumulator, LoadableSurfaceAccumulator, RigidBodyAccumulator};

/// Per-cell force inputs handed up from the constitutive update (C6).
#[derive(Clone, Copy, Debug)]
pub struct CellForce {
    pub contactable: ContactableRef,
    pub world_point: DVec3,
    pub normal: DVec3,
    pub tangent: DVec3,
    pub sigma: f64,
    pub tau: f64,
    pub cell_area: f64,
}

impl CellForce {
    /// World-space force this cell exerts on the body: normal pressure
    /// along `normal`, shear traction along `tangent`, both scaled by the
    /// cell's footprint area.
    pub fn world_force(&self) -> DVec3 {
        (self.normal * self.sigma + self.tangent * self.tau) * self.cell_area
    }
}

enum Accumulator {
    RigidBody(RigidBodyAccumulator),
    FeaTriangle(FeaTriangleAccumulator),
    LoadableSurface(LoadableSurfaceAccumulator),
}

/// Accumulates per-contactable loads across a step and, unless running in
/// co-simulation mode, submits them to the embedder at the end of it.
pub struct ForceDistributor {
    accumulators: HashMap<u64, Accumulator>,
    cosimulation: bool,
}

impl ForceDistributor {
    pub fn new(cosimulation: bool) -> Self {
        Self {
            accumulators: HashMap::new(),
            cosimulation,
        }
    }

    /// Fold one cell's force into its contactable's accumulator. `body_com`
    /// is only consulted for `RigidBody` contactables (torque arm).
    pub fn accumulate(
        &mut self,
        force: CellForce,
        body_com: Option<DVec3>,
        triangle_uv: Option<[f64; 3]>,
        is_fea: bool,
    ) {
        let key = force.contactable.0;
        let world_force = force.world_force();

        if is_fea {
            let acc = self
                .accumulators
                .entry(key)
                .or_insert_with(|| Accumulator::FeaTriangle(FeaTriangleAccumulator::default()));
            if let (Accumulator::FeaTriangle(a), Some(uv)) = (acc, triangle_uv) {
                a.accumulate(uv, world_force);
            }
        } else if let Some(com) = body_com {
            let acc = self
                .accumulators
                .entry(key)
                .or_insert_with(|| Accumulator::RigidBody(RigidBodyAccumulator::default()));
            if let Accumulator::RigidBody(a) = acc {
                a.accumulate(force.world_point, world_force, com);
            }
        } else {
            let acc = self
                .accumulators
                .entry(key)
                .or_insert_with(|| Accumulator::LoadableSurface(LoadableSurfaceAccumulator::default()));
            if let Accumulator::LoadableSurface(a) = acc {
                a.accumulate(world_force);
            }
        }
    }

    /// Read back a rigid body's accumulated `(force, torque)` without
    /// submitting it, for co-simulation queries.
    pub fn rigid_body_force(&self, contactable: ContactableRef) -> Option<(DVec3, DVec3)> {
        match self.accumulators.get(&contactable.0) {
            Some(Accumulator::RigidBody(a)) => Some((a.force, a.torque)),
            _ => None,
        }
    }

    /// Snapshot every accumulated rigid-body and FEA-node load before
    /// [`Self::submit`] clears them, for the step-end query API.
    pub fn snapshot(&self) -> (HashMap<u64, (DVec3, DVec3)>, HashMap<u64, [DVec3; 3]>) {
        let mut bodies = HashMap::new();
        let mut triangles = HashMap::new();
        for (&key, acc) in &self.accumulators {
            match acc {
                Accumulator::RigidBody(a) => {
                    bodies.insert(key, (a.force, a.torque));
                }
                Accumulator::FeaTriangle(a) => {
                    triangles.insert(key, a.node_forces);
                }
                Accumulator::LoadableSurface(_) => {}
            }
        }
        (bodies, triangles)
    }

    /// Submit every accumulated load to its owning contactable. A no-op
    /// (besides clearing state) in co-simulation mode — the host integrator
    /// is expected to query forces itself instead.
    pub fn submit(&mut self, mut lookup: impl FnMut(u64) -> Option<Contactable<'_>>) {
        if !self.cosimulation {
            for (&key, acc) in self.accumulators.iter() {
                match (acc, lookup(key)) {
                    (Accumulator::RigidBody(a), Some(Contactable::RigidBody { body, .. })) => {
                        body.apply_load(a.force, a.torque);
                    }
                    (Accumulator::FeaTriangle(a), Some(Contactable::FeaTriangle(tri))) => {
                        for (i, f) in a.node_forces.iter().enumerate() {
                            tri.apply_node_load(i, *f);
                        }
                    }
                    (Accumulator::LoadableSurface(a), Some(Contactable::LoadableSurface(surf))) => {
                        surf.apply_load(a.force);
                    }
                    _ => {}
                }
            }
        }
        self.accumulators.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn force(sigma: f64, tau: f64) -> CellForce {
        CellForce {
            contactable: ContactableRef(1),
            world_point: DVec3::new(1.0, 0.0, 0.0),
            normal: DVec3::Z,
            tangent: DVec3::X,
            sigma,
            tau,
            cell_area: 0.01,
        }
    }

    #[test]
    fn world_force_combines_normal_and_shear_scaled_by_area() {
        let f = force(100.0, 50.0);
        let w = f.world_force();
        assert!((w.z - 1.0).abs() < 1e-9); // 100 * 0.01
        assert!((w.x - 0.5).abs() < 1e-9); // 50 * 0.01
    }

    #[test]
    fn rigid_body_accumulation_sums_across_cells() {
        let mut dist = ForceDistributor::new(false);
        dist.accumulate(force(100.0, 0.0), Some(DVec3::ZERO), None, false);
        dist.accumulate(force(100.0, 0.0), Some(DVec3::ZERO), None, false);
        let (force_sum, _) = dist.rigid_body_force(ContactableRef(1)).unwrap();
        assert!((force_sum.z - 2.0).abs() < 1e-9);
    }

    #[test]
    fn cosimulation_mode_clears_without_submitting() {
        let mut dist = ForceDistributor::new(true);
        dist.accumulate(force(100.0, 0.0), Some(DVec3::ZERO), None, false);
        assert!(dist.rigid_body_force(ContactableRef(1)).is_some());

        let mut submitted = false;
        dist.submit(|_| {
            submitted = true;
            None
        });
        assert!(!submitted, "co-simulation mode must not invoke apply_load");
        assert!(dist.rigid_body_force(ContactableRef(1)).is_none());
    }
}
