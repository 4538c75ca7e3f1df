//! Per-step and per-stage benchmarks.
//!
//! Compares one full `Scm::step` against its two most expensive stages in
//! isolation (ray-cast dispatch, the one parallel region; bulldozing's
//! slope-limited smoothing pass) across a few grid sizes.

use std::collections::HashSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::DVec3;

use scm_terrain::bulldozing::smooth_domain;
use scm_terrain::external::{Body, CollisionService, Contactable, ContactableRef, RayHit, World};
use scm_terrain::grid::Grid;
use scm_terrain::init::DenseHeightfield;
use scm_terrain::raycast;
use scm_terrain::types::{CellIndex, ContactableId};
use scm_terrain::{config::ScmConfig, Scm};

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

struct SphereCollision {
    radius: f64,
}

impl CollisionService for SphereCollision {
    fn ray_hit(&self, _from: DVec3, to: DVec3) -> Option<RayHit> {
        let r = to.x * to.x + to.y * to.y;
        if r.sqrt() <= self.radius {
            Some(RayHit {
                hit_model: ContactableRef(1),
                world_point: DVec3::new(to.x, to.y, -0.02),
            })
        } else {
            None
        }
    }
    fn world_bounds(&self) -> (DVec3, DVec3) {
        (DVec3::new(-self.radius, -self.radius, -1.0), DVec3::new(self.radius, self.radius, 1.0))
    }
}

struct OneBodyWorld {
    body: FlatBody,
}

impl World for OneBodyWorld {
    fn contactable(&self, id: ContactableRef) -> Option<Contactable<'_>> {
        if id.0 == 1 {
            Some(Contactable::RigidBody { com: self.body.com, body: &self.body })
        } else {
            None
        }
    }
    fn body_for_domain(&self, _id: ContactableId) -> Option<&dyn Body> {
        None
    }
}

fn bench_full_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/full_step");
    for &half_extent in &[5.0, 20.0, 50.0] {
        group.bench_with_input(BenchmarkId::from_parameter(half_extent), &half_extent, |b, &half_extent| {
            let mut scm = Scm::new(DenseHeightfield::flat(half_extent * 2.0, half_extent * 2.0, 0.1).unwrap());
            let world = OneBodyWorld { body: FlatBody { com: DVec3::ZERO } };
            let collision = SphereCollision { radius: half_extent * 0.3 };
            b.iter(|| black_box(scm.step(1.0 / 60.0, &collision, &world)))
        });
    }
    group.finish();
}

fn bench_raycast_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("isolated/raycast_dispatch");
    for &half_extent in &[5, 20, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(half_extent), &half_extent, |b, &half_extent| {
            let grid = Grid::new(DenseHeightfield::flat(half_extent as f64 * 2.0, half_extent as f64 * 2.0, 0.1).unwrap());
            let config = ScmConfig::default();
            let collision = SphereCollision { radius: half_extent as f64 * 0.3 };
            let range = (CellIndex::new(-half_extent, -half_extent), CellIndex::new(half_extent, half_extent));
            b.iter(|| black_box(raycast::dispatch(&grid, &config, &collision, None, range)))
        });
    }
    group.finish();
}

fn bench_bulldozing_smoothing(c: &mut Criterion) {
    let mut group = c.benchmark_group("isolated/bulldozing_smooth");
    for &side in &[10, 30, 60] {
        group.bench_with_input(BenchmarkId::from_parameter(side), &side, |b, &side| {
            b.iter_batched(
                || {
                    let mut grid = Grid::new(DenseHeightfield::flat(side as f64, side as f64, 1.0).unwrap());
                    let mut domain = HashSet::new();
                    for i in -side / 2..side / 2 {
                        for j in -side / 2..side / 2 {
                            let cell = CellIndex::new(i, j);
                            let height = if (i + j) % 3 == 0 { 2.0 } else { 0.0 };
                            grid.get_or_create(cell).level = height;
                            domain.insert(cell);
                        }
                    }
                    (grid, domain)
                },
                |(mut grid, domain)| {
                    smooth_domain(&mut grid, &domain, 1.0, 35.0, 3);
                    black_box(&grid);
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(pipeline, bench_full_step, bench_raycast_dispatch, bench_bulldozing_smoothing);
criterion_main!(pipeline);
