//! Per-cell constitutive update: Bekker pressure-sinkage with Krenn &
//! Hirzinger elastic-plastic normal response, and Janosi-Hanamoto shear.

use crate::config::SoilParameters;
use crate::grid::node::NodeRecord;
use crate::types::ContactableData;

/// Result of updating one node this step, handed to the force distributor
/// (C7).
#[derive(Clone, Copy, Debug, Default)]
pub struct ConstitutiveOutput {
    pub sigma: f64,
    pub tau: f64,
}

/// Everything the update needs beyond the node's own persisted state.
#[derive(Clone, Copy, Debug)]
pub struct CellInputs {
    /// Height of this step's ray intersection below `level_initial`;
    /// `level_initial - hit_level`, clamped to non-negative.
    pub total_sinkage: f64,
    /// Bekker shape factor for the patch this cell belongs to.
    pub oob: f64,
    pub dt: f64,
    /// Rate of penetration, positive when sinking further (used for the
    /// viscous damping term).
    pub normal_velocity: f64,
    /// Magnitude of tangential slip speed this step.
    pub tangential_speed: f64,
    pub soil_override: Option<ContactableData>,
}

/// Decompose a contact-point velocity into its tangential unit direction,
/// tangential speed, and normal penetration rate (positive when sinking
/// further), for feeding [`CellInputs`].
pub fn slip_decompose(normal: glam::DVec3, velocity: glam::DVec3) -> (glam::DVec3, f64, f64) {
    let v_n = velocity.dot(normal);
    let v_t = velocity - normal * v_n;
    let speed = v_t.length();
    let tangent = if speed > 1e-9 { v_t / speed } else { glam::DVec3::ZERO };
    (tangent, speed, -v_n)
}

/// Bekker pressure-sinkage law: `(Kc/b + Kphi) * s^n`, with `oob = 1/b`.
fn bekker_pressure(s: f64, soil: &SoilParameters, oob: f64) -> f64 {
    if s <= 0.0 {
        return 0.0;
    }
    (soil.kc * oob + soil.kphi) * s.powf(soil.n)
}

fn blended_shear_params(soil: &SoilParameters, over: Option<ContactableData>) -> (f64, f64, f64) {
    match over {
        Some(o) => {
            let w = o.area_fraction.clamp(0.0, 1.0);
            let c = soil.cohesion * (1.0 - w) + o.cohesion * w;
            let mu = soil.mu() * (1.0 - w) + o.friction_angle_deg.to_radians().tan() * w;
            let j = soil.janosi_shear * (1.0 - w) + o.janosi_shear * w;
            (c, mu, j)
        }
        None => (soil.cohesion, soil.mu(), soil.janosi_shear),
    }
}

/// Update a hit node's normal and shear state for the current step. Only
/// meaningful for cells with a ray hit this step; the caller is responsible
/// for skipping unhit cells.
pub fn update_node(node: &mut NodeRecord, soil: &SoilParameters, inputs: CellInputs) -> ConstitutiveOutput {
    let total_sinkage = inputs.total_sinkage.max(0.0);
    let sinkage_plastic_prev = node.sinkage_plastic;

    let sigma_trial = soil.elastic_k * (total_sinkage - sinkage_plastic_prev).max(0.0);
    let sigma_yield_at_total = bekker_pressure(total_sinkage, soil, inputs.oob);

    let (sinkage_plastic, sinkage_elastic, mut sigma) = if total_sinkage > sinkage_plastic_prev
        && sigma_trial >= sigma_yield_at_total
    {
        // Loading past the prior maximum sinkage: follow the Bekker curve.
        // The yield pressure still unloads elastically, so only
        // s - sigma/K of the total sinkage is retained as plastic.
        let sinkage_elastic = sigma_yield_at_total / soil.elastic_k;
        (total_sinkage - sinkage_elastic, sinkage_elastic, sigma_yield_at_total)
    } else {
        // Unload/reload: linear elastic response below the yield surface.
        let elastic = (total_sinkage - sinkage_plastic_prev).max(0.0);
        (sinkage_plastic_prev, elastic, soil.elastic_k * elastic)
    };

    sigma += soil.damping_r * inputs.normal_velocity;
    sigma = sigma.max(0.0);

    node.step_plastic_flow = sinkage_plastic - sinkage_plastic_prev;
    node.sinkage = total_sinkage;
    node.sinkage_elastic = sinkage_elastic;
    node.sinkage_plastic = sinkage_plastic;
    node.sigma = sigma;
    node.sigma_yield = bekker_pressure(sinkage_plastic, soil, inputs.oob);

    let (cohesion, mu, janosi_j) = blended_shear_params(soil, inputs.soil_override);
    node.kshear += inputs.tangential_speed.abs() * inputs.dt;
    let tau_max = (cohesion + sigma * mu).max(0.0);
    let tau = if janosi_j > 0.0 {
        tau_max * (1.0 - (-node.kshear / janosi_j).exp())
    } else {
        tau_max
    };
    node.tau = tau;

    ConstitutiveOutput { sigma, tau }
}
