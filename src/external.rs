//! Downward contracts the core requires from its embedder.
//!
//! These are traits, not implementations: the multibody integrator, the
//! collision service, FEA triangles, the visualization mesh, and the
//! colormap all live outside this crate.

use glam::DVec3;

use crate::types::{ContactableData, ContactableId};

/// Result of a single ray query against the collision world.
#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    pub hit_model: ContactableRef,
    pub world_point: DVec3,
}

/// Opaque reference to whatever the collision world considers a hittable
/// object; the core never inspects it beyond using it as a lookup key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContactableRef(pub u64);

impl From<ContactableId> for ContactableRef {
    fn from(id: ContactableId) -> Self {
        ContactableRef(id.0)
    }
}

/// The multibody system's collision service.
///
/// Must be concurrent-callable: the ray-cast dispatcher (C4) invokes it
/// from every rayon worker thread in the one parallel region.
pub trait CollisionService: Send + Sync {
    /// Cast a ray from `from` to `to` (world space); `None` if no hit.
    fn ray_hit(&self, from: DVec3, to: DVec3) -> Option<RayHit>;

    /// The collision world's global AABB, used by the implicit default
    /// active domain.
    fn world_bounds(&self) -> (DVec3, DVec3);
}

/// A rigid body the core can query kinematics from and submit loads to.
pub trait Body: Send + Sync {
    /// Transform a point from this body's local frame to world space.
    fn frame_ref_to_abs(&self, local: DVec3) -> DVec3;
    /// Transform a point from world (parent) space into this body's local
    /// frame (used by the ray-vs-OBB slab test).
    fn transform_point_parent_to_local(&self, world_point: DVec3) -> DVec3;
    /// Transform a direction from world (parent) space into this body's
    /// local frame.
    fn transform_direction_parent_to_local(&self, world_dir: DVec3) -> DVec3;
    /// World-space velocity of the material point currently at `world_point`.
    fn get_contact_point_speed(&self, world_point: DVec3) -> DVec3;
    /// World-space position of the body's center of mass.
    fn get_pos(&self) -> DVec3;
    /// Per-object soil parameter override, if any.
    fn contactable_data(&self) -> Option<ContactableData> {
        None
    }
    /// Submit an accumulated force/torque pair as a load on this body.
    /// No-op in co-simulation mode.
    fn apply_load(&self, force: DVec3, torque: DVec3);
}

/// An FEA triangle the core can distribute barycentric forces onto.
pub trait FeaTriangle: Send + Sync {
    /// World-space positions of the triangle's three nodes.
    fn node_positions(&self) -> [DVec3; 3];
    /// Barycentric `(u, v, w)` of world point `p` projected onto the
    /// triangle's plane; `None` if the triangle is degenerate.
    fn compute_uv_from_p(&self, p: DVec3) -> Option<(f64, f64, f64)>;
    /// Submit a force on node `index` (`0..3`). No-op in co-simulation mode.
    fn apply_node_load(&self, index: usize, force: DVec3);
}

/// A generic parametric-surface load target.
pub trait LoadableSurface: Send + Sync {
    /// Fixed world-space attachment point this surface accepts force at.
    fn attachment_point(&self) -> DVec3;
    fn apply_load(&self, force: DVec3);
}

/// Per-location soil-parameter override callback.
pub trait SoilParametersCallback: Send + Sync {
    /// Return `(Kphi, Kc, n, c, phi_deg, J, K, R)` for the SCM-frame
    /// location `loc`, or `None` to use the global defaults.
    fn get(&self, loc: DVec3) -> Option<[f64; 8]>;
}

/// Sink for visualization-mesh vertex/normal/color updates.
pub trait VisualizationMesh {
    fn set_vertex(&mut self, index: usize, position: DVec3);
    fn set_normal(&mut self, index: usize, normal: DVec3);
    fn set_color(&mut self, index: usize, color: [f32; 4]);
    fn wireframe(&self) -> bool;
}

/// Scalar-to-color lookup for the selected visualization field.
pub trait Colormap {
    fn get(&self, value: f64, vmin: f64, vmax: f64) -> [f32; 4];
}

/// Which capability a contactable exposes.
pub enum Contactable<'a> {
    RigidBody { com: DVec3, body: &'a dyn Body },
    FeaTriangle(&'a dyn FeaTriangle),
    LoadableSurface(&'a dyn LoadableSurface),
}

/// The embedder's full per-step world: resolves opaque collision-hit and
/// active-domain identities into the concrete trait objects above.
pub trait World: Send + Sync {
    /// Resolve a ray-cast hit's contactable into its concrete capability.
    fn contactable(&self, id: ContactableRef) -> Option<Contactable<'_>>;
    /// Resolve an active domain's owning body for this step's kinematics.
    fn body_for_domain(&self, id: ContactableId) -> Option<&dyn Body>;
}
