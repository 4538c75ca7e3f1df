//! Physical defaults and numerical guard thresholds.
//!
//! Mirrors typical loose-sand Bekker/Janosi-Hanamoto parameters used in the
//! terramechanics literature; embedders are expected to override these via
//! [`crate::config::SoilParameters`] for their own soil.

/// Pressure-sinkage cohesive modulus, Bekker law (Pa/m^(n+1)).
pub const DEFAULT_KC: f64 = 0.2e4;
/// Pressure-sinkage frictional modulus, Bekker law (Pa/m^(n+1)).
pub const DEFAULT_KPHI: f64 = 0.2e6;
/// Bekker sinkage exponent.
pub const DEFAULT_N: f64 = 1.1;
/// Mohr-Coulomb cohesion (Pa).
pub const DEFAULT_COHESION: f64 = 0.0;
/// Internal friction angle (degrees).
pub const DEFAULT_FRICTION_ANGLE_DEG: f64 = 30.0;
/// Janosi-Hanamoto shear deformation modulus (m).
pub const DEFAULT_JANOSI_SHEAR: f64 = 0.01;
/// Elastic stiffness of the normal contact spring (Pa/m).
pub const DEFAULT_ELASTIC_K: f64 = 3.0e7;
/// Viscous damping coefficient of the normal contact (Pa*s/m).
pub const DEFAULT_DAMPING_R: f64 = 0.0;

/// Default bulldozing slope-repose angle (degrees).
pub const DEFAULT_EROSION_ANGLE_DEG: f64 = 40.0;
/// Default bulldozing boundary-raise scale factor.
pub const DEFAULT_FLOW_FACTOR: f64 = 1.0;
/// Default bulldozing smoothing passes per step.
pub const DEFAULT_EROSION_ITERATIONS: u32 = 3;
/// Default bulldozing erosion-domain dilation radius, in 4-connected hops.
pub const DEFAULT_EROSION_PROPAGATIONS: u32 = 10;

/// Patch hull area below which the Bekker shape factor is forced to zero
/// rather than dividing by a near-zero area.
pub const MIN_PATCH_AREA: f64 = 1.0e-6;

/// Sentinel substituted for a near-zero ray-direction component in the
/// ray-vs-OBB slab test.
pub const SLAB_INV_SENTINEL: f64 = 1.0e10;

/// Sentinel `hit_level` for a cell that received no ray hit this step.
pub const NO_HIT_SENTINEL: f64 = f64::INFINITY;
