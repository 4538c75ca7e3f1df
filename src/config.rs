//! Global configuration: soil parameters, bulldozing parameters, and the
//! reference-frame / boundary settings threaded through every stage.
//!
//! One `Copy` config struct passed by reference through the pipeline, with
//! builder-style `with_*` setters for the embedder-facing upward API.

use glam::{DAffine3, DVec3};

use crate::constants::*;

/// Bekker pressure-sinkage + Janosi-Hanamoto shear soil parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoilParameters {
    /// Bekker frictional modulus `K_phi`.
    pub kphi: f64,
    /// Bekker cohesive modulus `K_c`.
    pub kc: f64,
    /// Bekker sinkage exponent `n`.
    pub n: f64,
    /// Mohr-Coulomb cohesion `c`.
    pub cohesion: f64,
    /// Internal friction angle, degrees.
    pub friction_angle_deg: f64,
    /// Janosi-Hanamoto shear modulus `J`.
    pub janosi_shear: f64,
    /// Elastic normal stiffness `K`.
    pub elastic_k: f64,
    /// Viscous normal damping `R`.
    pub damping_r: f64,
}

impl Default for SoilParameters {
    fn default() -> Self {
        Self {
            kphi: DEFAULT_KPHI,
            kc: DEFAULT_KC,
            n: DEFAULT_N,
            cohesion: DEFAULT_COHESION,
            friction_angle_deg: DEFAULT_FRICTION_ANGLE_DEG,
            janosi_shear: DEFAULT_JANOSI_SHEAR,
            elastic_k: DEFAULT_ELASTIC_K,
            damping_r: DEFAULT_DAMPING_R,
        }
    }
}

impl SoilParameters {
    /// Mohr-Coulomb friction coefficient `mu = tan(phi)`.
    pub fn mu(&self) -> f64 {
        self.friction_angle_deg.to_radians().tan()
    }
}

/// Bulldozing (lateral material flow) parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BulldozingParameters {
    /// Slope-of-repose angle, degrees, beyond which material is diffused.
    pub erosion_angle_deg: f64,
    /// Boundary-raise scale factor applied to displaced plastic volume.
    pub flow_factor: f64,
    /// Number of smoothing passes per step.
    pub iterations: u32,
    /// Number of 4-connected dilation hops from the patch boundary.
    pub propagations: u32,
}

impl Default for BulldozingParameters {
    fn default() -> Self {
        Self {
            erosion_angle_deg: DEFAULT_EROSION_ANGLE_DEG,
            flow_factor: DEFAULT_FLOW_FACTOR,
            iterations: DEFAULT_EROSION_ITERATIONS,
            propagations: DEFAULT_EROSION_PROPAGATIONS,
        }
    }
}

/// Axis-aligned rectangular boundary in the SCM `(x, y)` plane, used to
/// reject cells outside a user-configured region.
///
/// An inverted boundary (`min > max` on some axis) is accepted but silently
/// ignored rather than rejected.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Boundary2D {
    pub min: glam::DVec2,
    pub max: glam::DVec2,
}

impl Boundary2D {
    /// `true` if `min <= max` on both axes; an inverted boundary is
    /// documented as silently ignored rather than rejected at construction.
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        if !self.is_valid() {
            // Inverted boundary: treat as "no boundary".
            return true;
        }
        x >= self.min.x && x <= self.max.x && y >= self.min.y && y <= self.max.y
    }
}

/// Top-level configuration bundle threaded through the pipeline by
/// reference.
#[derive(Clone, Debug)]
pub struct ScmConfig {
    /// Rigid transform from the SCM frame to world space.
    pub reference_frame: DAffine3,
    /// Optional rectangular boundary in the SCM plane; `None` means
    /// unbounded.
    pub boundary: Option<Boundary2D>,
    /// Ray start offset above the current cell height, along local +z.
    pub test_up: f64,
    /// Ray length below `test_up`, along local +z.
    pub test_down: f64,
    pub soil: SoilParameters,
    pub bulldozing_enabled: bool,
    pub bulldozing: BulldozingParameters,
    pub cosimulation: bool,
}

impl Default for ScmConfig {
    fn default() -> Self {
        Self {
            reference_frame: DAffine3::IDENTITY,
            boundary: None,
            test_up: 0.1,
            test_down: 0.3,
            soil: SoilParameters::default(),
            bulldozing_enabled: false,
            bulldozing: BulldozingParameters::default(),
            cosimulation: false,
        }
    }
}

impl ScmConfig {
    pub fn with_reference_frame(mut self, frame: DAffine3) -> Self {
        self.reference_frame = frame;
        self
    }

    pub fn with_boundary(mut self, boundary: Boundary2D) -> Self {
        self.boundary = Some(boundary);
        self
    }

    pub fn with_test_height(mut self, up: f64, down: f64) -> Self {
        self.test_up = up;
        self.test_down = down;
        self
    }

    /// Transform a point from the SCM frame to world space.
    pub fn scm_to_world(&self, p: DVec3) -> DVec3 {
        self.reference_frame.transform_point3(p)
    }

    /// Transform a direction from the SCM frame to world space (no
    /// translation).
    pub fn scm_to_world_dir(&self, d: DVec3) -> DVec3 {
        self.reference_frame.transform_vector3(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;

    #[test]
    fn mu_matches_tan_of_friction_angle() {
        let soil = SoilParameters {
            friction_angle_deg: 45.0,
            ..Default::default()
        };
        assert!((soil.mu() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn inverted_boundary_is_ignored() {
        let b = Boundary2D {
            min: DVec2::new(5.0, 5.0),
            max: DVec2::new(-5.0, -5.0),
        };
        assert!(!b.is_valid());
        assert!(b.contains(100.0, 100.0));
    }

    #[test]
    fn valid_boundary_rejects_outside_points() {
        let b = Boundary2D {
            min: DVec2::new(-1.0, -1.0),
            max: DVec2::new(1.0, 1.0),
        };
        assert!(b.contains(0.0, 0.0));
        assert!(!b.contains(2.0, 0.0));
    }
}
