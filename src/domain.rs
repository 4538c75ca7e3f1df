//! Active-domain resolution: restrict which cells are ray-tested each step
//! to the footprint of monitored bodies.

use glam::DVec3;

use crate::config::ScmConfig;
use crate::constants::SLAB_INV_SENTINEL;
use crate::external::{Body, CollisionService};
use crate::types::{CellIndex, ContactableId};

/// An oriented box attached to a body, in the body's local frame.
#[derive(Clone, Copy, Debug)]
pub struct OrientedBox {
    pub center: DVec3,
    pub half_dims: DVec3,
}

impl OrientedBox {
    /// The 8 corners of the box, in the body's local frame.
    pub fn corners(&self) -> [DVec3; 8] {
        let c = self.center;
        let h = self.half_dims;
        [
            c + DVec3::new(-h.x, -h.y, -h.z),
            c + DVec3::new(h.x, -h.y, -h.z),
            c + DVec3::new(-h.x, h.y, -h.z),
            c + DVec3::new(h.x, h.y, -h.z),
            c + DVec3::new(-h.x, -h.y, h.z),
            c + DVec3::new(h.x, -h.y, h.z),
            c + DVec3::new(-h.x, h.y, h.z),
            c + DVec3::new(h.x, h.y, h.z),
        ]
    }
}

/// A monitored body's active domain: its oriented box plus the per-step
/// cache this resolver computes.
pub struct ActiveDomain {
    pub body: ContactableId,
    pub obox: OrientedBox,
    /// Inclusive `(i, j)` cell range covered this step.
    pub cell_range: Option<(CellIndex, CellIndex)>,
    /// Componentwise inverse of the SCM +z direction in the body frame,
    /// with near-zero components replaced by a large sentinel.
    pub inv_normal_body_frame: DVec3,
}

impl ActiveDomain {
    pub fn new(body: ContactableId, obox: OrientedBox) -> Self {
        Self {
            body,
            obox,
            cell_range: None,
            inv_normal_body_frame: DVec3::ONE,
        }
    }

    /// Recompute `cell_range` and `inv_normal_body_frame` for this step.
    pub fn resolve(&mut self, body: &dyn Body, config: &ScmConfig, n_x: i32, n_y: i32, delta: f64) {
        let to_scm = config.reference_frame.inverse();

        let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
        for corner in self.obox.corners() {
            let world = body.frame_ref_to_abs(corner);
            let scm = to_scm.transform_point3(world);
            x_min = x_min.min(scm.x);
            x_max = x_max.max(scm.x);
            y_min = y_min.min(scm.y);
            y_max = y_max.max(scm.y);
        }

        self.cell_range = Some(snap_to_cell_range(x_min, x_max, y_min, y_max, n_x, n_y, delta));

        let world_z = config.scm_to_world_dir(DVec3::Z);
        let body_z = body.transform_direction_parent_to_local(world_z);
        self.inv_normal_body_frame = safe_inverse(body_z);
    }
}

/// Snap a world-space `(x, y)` rectangle onto the integer cell range,
/// clamped to the grid interior.
pub fn snap_to_cell_range(
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    n_x: i32,
    n_y: i32,
    delta: f64,
) -> (CellIndex, CellIndex) {
    if delta <= 0.0 {
        return (CellIndex::new(-n_x, -n_y), CellIndex::new(n_x, n_y));
    }
    let i_min = ((x_min / delta).floor() as i32).clamp(-n_x, n_x);
    let i_max = ((x_max / delta).ceil() as i32).clamp(-n_x, n_x);
    let j_min = ((y_min / delta).floor() as i32).clamp(-n_y, n_y);
    let j_max = ((y_max / delta).ceil() as i32).clamp(-n_y, n_y);
    (CellIndex::new(i_min, j_min), CellIndex::new(i_max, j_max))
}

/// Componentwise inverse, with near-zero components replaced by a large
/// sentinel rather than producing `inf`/`NaN`.
pub fn safe_inverse(v: DVec3) -> DVec3 {
    DVec3::new(safe_recip(v.x), safe_recip(v.y), safe_recip(v.z))
}

fn safe_recip(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        if x.is_sign_negative() {
            -SLAB_INV_SENTINEL
        } else {
            SLAB_INV_SENTINEL
        }
    } else {
        1.0 / x
    }
}

/// Ray-vs-oriented-box slab test (Kay-Kajiya).
///
/// `ray_origin_body` is the ray origin expressed in the box's local
/// (body) frame; `inv_dir_body` is the precomputed inverse ray direction
/// in that same frame (shared across all cells in a step, since every
/// ray is vertical in the SCM frame).
pub fn ray_hits_obox(ray_origin_body: DVec3, inv_dir_body: DVec3, obox: &OrientedBox) -> bool {
    let lo = obox.center - obox.half_dims;
    let hi = obox.center + obox.half_dims;

    let mut t_min = f64::NEG_INFINITY;
    let mut t_max = f64::INFINITY;

    for axis in 0..3 {
        let o = ray_origin_body[axis];
        let inv_d = inv_dir_body[axis];
        let mut t1 = (lo[axis] - o) * inv_d;
        let mut t2 = (hi[axis] - o) * inv_d;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
    }

    t_max >= t_min.max(0.0)
}

/// The implicit default domain: wraps the collision world's global AABB.
pub fn default_domain_cell_range(
    collision: &dyn CollisionService,
    config: &ScmConfig,
    n_x: i32,
    n_y: i32,
    delta: f64,
) -> (CellIndex, CellIndex) {
    let (world_min, world_max) = collision.world_bounds();
    let to_scm = config.reference_frame.inverse();

    let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for corner in aabb_corners(world_min, world_max) {
        let scm = to_scm.transform_point3(corner);
        x_min = x_min.min(scm.x);
        x_max = x_max.max(scm.x);
        y_min = y_min.min(scm.y);
        y_max = y_max.max(scm.y);
    }

    snap_to_cell_range(x_min, x_max, y_min, y_max, n_x, n_y, delta)
}

fn aabb_corners(min: DVec3, max: DVec3) -> [DVec3; 8] {
    [
        DVec3::new(min.x, min.y, min.z),
        DVec3::new(max.x, min.y, min.z),
        DVec3::new(min.x, max.y, min.z),
        DVec3::new(max.x, max.y, min.z),
        DVec3::new(min.x, min.y, max.z),
        DVec3::new(max.x, min.y, max.z),
        DVec3::new(min.x, max.y, max.z),
        DVec3::new(max.x, max.y, max.z),
    ]
}
