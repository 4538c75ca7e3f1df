//! scm_terrain - deformable-terrain soil contact model, engine-independent
//!
//! A per-step algorithm converting multibody-world state (rigid bodies, FEA
//! triangles) into sinkage-dependent pressure/shear forces and an updated
//! heightfield, using Bekker pressure-sinkage and Janosi-Hanamoto shear laws
//! augmented with a Krenn & Hirzinger elastic-plastic normal response.
//! Lateral material flow ("bulldozing") is an optional extra stage.
//!
//! # Pipeline
//!
//! ```text
//! ┌───────────┐   ┌───────────┐   ┌────────┐   ┌──────────────┐   ┌────────┐   ┌────────────┐   ┌───────────────┐
//! │ Active-   ├──►│ Ray-cast  ├──►│ Patch  ├──►│ Constitutive ├──►│ Force  ├──►│ Bulldozing ├──►│ Visualization │
//! │ domain     │   │ dispatch  │   │ segment│   │ update       │   │ distr. │   │ (optional) │   │ bridge        │
//! │ resolve    │   │ (rayon)   │   │        │   │              │   │        │   │            │   │               │
//! └───────────┘   └───────────┘   └────────┘   └──────────────┘   └────────┘   └────────────┘   └───────────────┘
//!      C3              C4             C5              C6               C7           C8               C9
//! ```
//!
//! Only C4 (ray-cast dispatch) runs in parallel; every other stage runs on
//! the calling thread over the merged hit set (see [`threading`]).
//!
//! The collision world, rigid-body integrator, FEA mesh, and visualization
//! renderer are all external collaborators: this crate only defines the
//! trait boundary ([`external`]) they must satisfy.

pub mod bulldozing;
pub mod config;
pub mod constants;
pub mod constitutive;
pub mod domain;
pub mod error;
pub mod external;
pub mod forces;
pub mod grid;
pub mod init;
pub mod metrics;
pub mod patch;
pub mod raycast;
pub mod threading;
pub mod types;
pub mod visualization;

use std::collections::HashMap;

use glam::DVec3;

pub use config::{Boundary2D, BulldozingParameters, ScmConfig, SoilParameters};
pub use error::SCMError;
pub use metrics::StepStats;
pub use types::{ContactableId, ContactableData};

use domain::{ActiveDomain, OrientedBox};
use external::{CollisionService, SoilParametersCallback, World};
use grid::{BaseHeightfield, Grid};
use metrics::{ScopedTimer, Stage};
use patch::ContactPatch;
use raycast::RayCastHit;
use types::CellIndex;

/// The soil contact model core: owns the grid/node store and per-run
/// configuration, orchestrates one step's worth of work across C1-C9.
pub struct Scm<H: BaseHeightfield> {
    grid: Grid<H>,
    config: ScmConfig,
    active_domains: HashMap<ContactableId, ActiveDomain>,
    soil_callback: Option<Box<dyn SoilParametersCallback>>,
    thread_pool: threading::ScmThreadPool,
    last_stats: StepStats,
    last_rigid_body_forces: HashMap<u64, (DVec3, DVec3)>,
    last_fea_forces: HashMap<u64, [DVec3; 3]>,
}

impl<H: BaseHeightfield> Scm<H> {
    /// Wrap an already-initialized base heightfield (one of [`init`]'s three
    /// constructors) with default configuration.
    pub fn new(base: H) -> Self {
        Self {
            grid: Grid::new(base),
            config: ScmConfig::default(),
            active_domains: HashMap::new(),
            soil_callback: None,
            thread_pool: threading::ScmThreadPool::shared(),
            last_stats: StepStats::default(),
            last_rigid_body_forces: HashMap::new(),
            last_fea_forces: HashMap::new(),
        }
    }

    pub fn set_soil_parameters(&mut self, soil: SoilParameters) {
        self.config.soil = soil;
    }

    pub fn enable_bulldozing(&mut self, enabled: bool) {
        self.config.bulldozing_enabled = enabled;
    }

    pub fn set_bulldozing_parameters(&mut self, params: BulldozingParameters) {
        self.config.bulldozing = params;
    }

    pub fn set_reference_frame(&mut self, frame: glam::DAffine3) {
        self.config.reference_frame = frame;
    }

    pub fn set_boundary(&mut self, boundary: Boundary2D) {
        self.config.boundary = Some(boundary);
    }

    pub fn set_test_height(&mut self, up: f64, down: f64) {
        self.config.test_up = up;
        self.config.test_down = down;
    }

    pub fn set_cosimulation_mode(&mut self, enabled: bool) {
        self.config.cosimulation = enabled;
    }

    pub fn register_soil_parameters_callback(&mut self, callback: Box<dyn SoilParametersCallback>) {
        self.soil_callback = Some(callback);
    }

    pub fn set_thread_pool(&mut self, pool: threading::ScmThreadPool) {
        self.thread_pool = pool;
    }

    /// Register a body's monitored footprint, restricting ray-cast dispatch
    /// to its vicinity.
    pub fn add_active_domain(&mut self, body: ContactableId, obox: OrientedBox) {
        self.active_domains.insert(body, ActiveDomain::new(body, obox));
    }

    pub fn get_height(&self, cell: CellIndex) -> f64 {
        self.grid.height(cell)
    }

    pub fn get_normal(&self, cell: CellIndex) -> DVec3 {
        self.grid.normal(cell)
    }

    pub fn get_init_height(&self, cell: CellIndex) -> f64 {
        match self.grid.get(cell) {
            Some(n) => n.level_initial,
            None => self.grid.height(cell),
        }
    }

    pub fn get_init_normal(&self, cell: CellIndex) -> DVec3 {
        match self.grid.get(cell) {
            Some(n) => n.normal,
            None => self.grid.normal(cell),
        }
    }

    pub fn get_node_info(&self, cell: CellIndex) -> Option<&grid::NodeRecord> {
        self.grid.get(cell)
    }

    pub fn get_modified_nodes(&self, all: bool) -> Vec<(CellIndex, f64)> {
        if all {
            self.grid.all_levels()
        } else {
            self.grid.modified_levels()
        }
    }

    pub fn set_modified_nodes(&mut self, entries: &[(CellIndex, f64)]) {
        self.grid.set_levels(entries);
    }

    pub fn last_stats(&self) -> StepStats {
        self.last_stats
    }

    /// Last step's accumulated `(force, torque)` on a rigid-body contactable;
    /// available whether or not co-simulation mode is enabled.
    pub fn get_contact_force_body(&self, id: ContactableId) -> Option<(DVec3, DVec3)> {
        self.last_rigid_body_forces.get(&id.0).copied()
    }

    /// Last step's accumulated force on one node (`0..3`) of an FEA-triangle
    /// contactable.
    pub fn get_contact_force_node(&self, id: ContactableId, node_index: usize) -> Option<DVec3> {
        self.last_fea_forces.get(&id.0).and_then(|f| f.get(node_index).copied())
    }

    /// Run one simulation step: resolve active domains, dispatch rays,
    /// segment patches, update the constitutive state of every hit cell,
    /// distribute forces, optionally bulldoze, and record stats.
    pub fn step(&mut self, dt: f64, collision: &dyn CollisionService, world: &dyn World) -> StepStats {
        let mut stats = StepStats::default();
        self.grid.begin_step();

        {
            let _timer = ScopedTimer::start(&mut stats, Stage::ActiveDomainResolve);
            self.resolve_active_domains(world);
        }

        let hits = self.dispatch_all(collision, world, &mut stats);

        let patches = {
            let _timer = ScopedTimer::start(&mut stats, Stage::PatchSegment);
            patch::segment(&hits, self.grid.delta())
        };
        stats.contact_patches = patches.len() as u64;
        let patch_by_cell = build_cell_patch_lookup(&patches);

        let tangents = {
            let _timer = ScopedTimer::start(&mut stats, Stage::ConstitutiveUpdate);
            self.update_constitutive(&hits, &patch_by_cell, dt, world)
        };

        let mut forces = forces::ForceDistributor::new(self.config.cosimulation);
        {
            let _timer = ScopedTimer::start(&mut stats, Stage::ForceDistribute);
            self.distribute_forces(&hits, &tangents, world, &mut forces);
        }

        let (bodies, triangles) = forces.snapshot();
        self.last_rigid_body_forces = bodies;
        self.last_fea_forces = triangles;
        forces.submit(|key| world.contactable(external::ContactableRef(key)));

        if self.config.bulldozing_enabled {
            self.bulldoze(&patches, &mut stats);
        }

        stats.erosion_nodes = self
            .grid
            .modified_this_step()
            .filter(|c| self.grid.get(*c).map(|n| n.erosion).unwrap_or(false))
            .count() as u64;

        self.last_stats = stats;
        stats
    }

    fn resolve_active_domains(&mut self, world: &dyn World) {
        let n_x = self.grid.n_x();
        let n_y = self.grid.n_y();
        let delta = self.grid.delta();

        for (id, domain) in self.active_domains.iter_mut() {
            if let Some(body) = world.body_for_domain(*id) {
                domain.resolve(body, &self.config, n_x, n_y, delta);
            }
        }
    }

    fn dispatch_all(&mut self, collision: &dyn CollisionService, world: &dyn World, stats: &mut StepStats) -> HashMap<CellIndex, RayCastHit> {
        let _timer = ScopedTimer::start(stats, Stage::RayCastDispatch);
        let n_x = self.grid.n_x();
        let n_y = self.grid.n_y();
        let delta = self.grid.delta();
        let mut merged = HashMap::new();
        let mut ray_casts = 0u64;
        let mut ray_hits = 0u64;

        if self.active_domains.is_empty() {
            let range = domain::default_domain_cell_range(collision, &self.config, n_x, n_y, delta);
            let grid = &self.grid;
            let config = &self.config;
            let (hits, counts) = self.thread_pool.install(|| raycast::dispatch(grid, config, collision, None, range));
            ray_casts += counts.ray_casts;
            ray_hits += counts.ray_hits;
            merged.extend(raycast::merge_hits(&mut self.grid, &hits));
        } else {
            let ids: Vec<ContactableId> = self.active_domains.keys().copied().collect();
            for id in ids {
                let Some(body) = world.body_for_domain(id) else { continue };
                let Some(active_domain) = self.active_domains.get(&id) else { continue };
                let Some(range) = active_domain.cell_range else { continue };
                let grid = &self.grid;
                let config = &self.config;
                let (hits, counts) = self
                    .thread_pool
                    .install(|| raycast::dispatch(grid, config, collision, Some((active_domain, body)), range));
                ray_casts += counts.ray_casts;
                ray_hits += counts.ray_hits;
                merged.extend(raycast::merge_hits(&mut self.grid, &hits));
            }
        }

        stats.ray_casts = ray_casts;
        stats.ray_hits = ray_hits;
        merged
    }

    /// Updates every hit cell's normal/shear state and returns the
    /// per-cell sliding-tangent direction the force distributor needs to
    /// apply shear along.
    fn update_constitutive(
        &mut self,
        hits: &HashMap<CellIndex, RayCastHit>,
        patch_by_cell: &HashMap<CellIndex, f64>,
        dt: f64,
        world: &dyn World,
    ) -> HashMap<CellIndex, DVec3> {
        let mut tangents = HashMap::with_capacity(hits.len());

        for (&cell, hit) in hits {
            let level_initial = self
                .grid
                .get(cell)
                .map(|n| n.level_initial)
                .unwrap_or_else(|| self.grid.height(cell));
            let normal = self.grid.normal(cell);
            let ca = normal.z;
            let total_sinkage = (ca * (level_initial - hit.world_point.z)).max(0.0);
            let oob = patch_by_cell.get(&cell).copied().unwrap_or(0.0);

            let contactable = world.contactable(hit.contactable);
            let (tangent, tangential_speed, normal_velocity) = match &contactable {
                Some(external::Contactable::RigidBody { body, .. }) => {
                    let velocity = body.get_contact_point_speed(hit.world_point);
                    constitutive::slip_decompose(normal, velocity)
                }
                _ => (DVec3::ZERO, 0.0, 0.0),
            };
            tangents.insert(cell, tangent);

            let soil_override = match &contactable {
                Some(external::Contactable::RigidBody { body, .. }) => body.contactable_data(),
                _ => None,
            };

            let soil = match &self.soil_callback {
                Some(cb) => match cb.get(hit.world_point) {
                    Some([kphi, kc, n, c, phi, j, k, r]) => SoilParameters {
                        kphi,
                        kc,
                        n,
                        cohesion: c,
                        friction_angle_deg: phi,
                        janosi_shear: j,
                        elastic_k: k,
                        damping_r: r,
                    },
                    None => self.config.soil,
                },
                None => self.config.soil,
            };

            let Some(node) = self.grid.get_mut(cell) else { continue };
            node.hit_level = hit.world_point.z;
            let output = constitutive::update_node(
                node,
                &soil,
                constitutive::CellInputs {
                    total_sinkage,
                    oob,
                    dt,
                    normal_velocity,
                    tangential_speed,
                    soil_override,
                },
            );
            if output.sigma <= 0.0 {
                continue;
            }
            node.level = hit.world_point.z;
            self.grid.mark_modified(cell);
        }

        tangents
    }

    fn distribute_forces(
        &mut self,
        hits: &HashMap<CellIndex, RayCastHit>,
        tangents: &HashMap<CellIndex, DVec3>,
        world: &dyn World,
        forces: &mut forces::ForceDistributor,
    ) {
        let delta = self.grid.delta();
        let cell_area = delta * delta;

        for (&cell, hit) in hits {
            let Some(node) = self.grid.get(cell) else { continue };
            if node.sigma <= 0.0 {
                continue;
            }
            let tangent = tangents.get(&cell).copied().unwrap_or(DVec3::ZERO);
            let cell_force = forces::CellForce {
                contactable: hit.contactable,
                world_point: hit.world_point,
                normal: node.normal,
                tangent,
                sigma: node.sigma,
                tau: node.tau,
                cell_area,
            };

            match world.contactable(hit.contactable) {
                Some(external::Contactable::RigidBody { com, .. }) => {
                    forces.accumulate(cell_force, Some(com), None, false);
                }
                Some(external::Contactable::FeaTriangle(tri)) => {
                    if let Some(uv) = tri.compute_uv_from_p(hit.world_point) {
                        forces.accumulate(cell_force, None, Some([uv.0, uv.1, uv.2]), true);
                    }
                }
                Some(external::Contactable::LoadableSurface(_)) => {
                    forces.accumulate(cell_force, None, None, false);
                }
                None => {}
            }
        }
    }

    fn bulldoze(&mut self, patches: &[ContactPatch], stats: &mut StepStats) {
        let delta = self.grid.delta();
        let flow_factor = self.config.bulldozing.flow_factor;
        let propagations = self.config.bulldozing.propagations;
        let erosion_angle_deg = self.config.bulldozing.erosion_angle_deg;
        let iterations = self.config.bulldozing.iterations;

        let touched = {
            let _timer = ScopedTimer::start(stats, Stage::BulldozeBoundaryRaise);
            bulldozing::boundary_raise(&mut self.grid, patches, flow_factor)
        };
        let domain = {
            let _timer = ScopedTimer::start(stats, Stage::BulldozeDilate);
            bulldozing::dilate_domain(&mut self.grid, &touched, propagations)
        };
        {
            let _timer = ScopedTimer::start(stats, Stage::BulldozeSmooth);
            bulldozing::smooth_domain(&mut self.grid, &domain, delta, erosion_angle_deg, iterations);
        }
    }

    /// Push this step's modified cells to a visualization mesh.
    pub fn update_visualization_mesh(
        &mut self,
        mesh: &mut dyn external::VisualizationMesh,
        colormap: &dyn external::Colormap,
        field: visualization::VisualizationField,
        vmin: f64,
        vmax: f64,
        vertex_index: impl Fn(CellIndex) -> usize,
    ) {
        let mut stats = self.last_stats;
        let _timer = ScopedTimer::start(&mut stats, Stage::VisualizationBridge);
        visualization::update(&self.grid, mesh, colormap, field, vmin, vmax, vertex_index);
        self.last_stats = stats;
    }
}

fn build_cell_patch_lookup(patches: &[ContactPatch]) -> HashMap<CellIndex, f64> {
    let mut lookup = HashMap::new();
    for patch in patches {
        for &cell in &patch.cells {
            lookup.insert(cell, patch.oob);
        }
    }
    lookup
}

#[cfg(test)]
mod tests {
    use super::*;
    use external::{Body, CollisionService, Contactable, RayHit, World};
    use init::DenseHeightfield;

    struct FlatBody {
        com: DVec3,
    }

    impl Body for FlatBody {
        fn frame_ref_to_abs(&self, local: DVec3) -> DVec3 {
            self.com + local
        }
        fn transform_point_parent_to_local(&self, world_point: DVec3) -> DVec3 {
            world_point - self.com
        }
        fn transform_direction_parent_to_local(&self, world_dir: DVec3) -> DVec3 {
            world_dir
        }
        fn get_contact_point_speed(&self, _world_point: DVec3) -> DVec3 {
            DVec3::ZERO
        }
        fn get_pos(&self) -> DVec3 {
            self.com
        }
        fn apply_load(&self, _force: DVec3, _torque: DVec3) {}
    }

    struct SingleSphereCollision;
    impl CollisionService for SingleSphereCollision {
        fn ray_hit(&self, _from: DVec3, to: DVec3) -> Option<RayHit> {
            Some(RayHit {
                hit_model: external::ContactableRef(7),
                world_point: DVec3::new(to.x, to.y, -0.02),
            })
        }
        fn world_bounds(&self) -> (DVec3, DVec3) {
            (DVec3::splat(-5.0), DVec3::splat(5.0))
        }
    }

    struct OneBodyWorld {
        body: FlatBody,
    }
    impl World for OneBodyWorld {
        fn contactable(&self, id: external::ContactableRef) -> Option<Contactable<'_>> {
            if id.0 == 7 {
                Some(Contactable::RigidBody { com: self.body.com, body: &self.body })
            } else {
                None
            }
        }
        fn body_for_domain(&self, _id: ContactableId) -> Option<&dyn Body> {
            None
        }
    }

    #[test]
    fn flat_terrain_no_contact_produces_no_hits() {
        struct NoHitCollision;
        impl CollisionService for NoHitCollision {
            fn ray_hit(&self, _from: DVec3, _to: DVec3) -> Option<RayHit> {
                None
            }
            fn world_bounds(&self) -> (DVec3, DVec3) {
                (DVec3::splat(-1.0), DVec3::splat(1.0))
            }
        }
        let mut scm = Scm::new(DenseHeightfield::flat(1.0, 1.0, 0.1).unwrap());
        let world = OneBodyWorld { body: FlatBody { com: DVec3::ZERO } };
        let stats = scm.step(1.0 / 60.0, &NoHitCollision, &world);
        assert_eq!(stats.ray_hits, 0);
        assert_eq!(stats.contact_patches, 0);
    }

    #[test]
    fn resting_sphere_produces_a_sinkage_and_a_patch() {
        let mut scm = Scm::new(DenseHeightfield::flat(1.0, 1.0, 0.1).unwrap());
        let world = OneBodyWorld { body: FlatBody { com: DVec3::ZERO } };
        let stats = scm.step(1.0 / 60.0, &SingleSphereCollision, &world);
        assert!(stats.ray_hits > 0);
        assert!(stats.contact_patches > 0);

        let any_cell = CellIndex::new(0, 0);
        assert!(scm.get_height(any_cell) < 0.0);
    }

    #[test]
    fn cosimulation_mode_exposes_force_without_submitting() {
        let mut scm = Scm::new(DenseHeightfield::flat(1.0, 1.0, 0.1).unwrap());
        scm.set_cosimulation_mode(true);
        let world = OneBodyWorld { body: FlatBody { com: DVec3::ZERO } };
        scm.step(1.0 / 60.0, &SingleSphereCollision, &world);

        let (force, _torque) = scm.get_contact_force_body(ContactableId(7)).unwrap();
        assert!(force.z > 0.0);
    }
}
