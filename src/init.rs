//! Base heightfield initializers: flat, heightmap, and triangle mesh.
//!
//! Image decoding and OBJ file I/O are out of scope; the
//! heightmap and mesh constructors take already-decoded data, leaving the
//! embedder responsible for turning a file into pixels/vertices.

use glam::DVec3;

use crate::error::SCMError;
use crate::grid::BaseHeightfield;

/// Dense `(2*n_x+1) x (2*n_y+1)` base-heightfield array, indexed by cell
/// `(i, j)` with `i, j in [-n, n]`.
#[derive(Clone, Debug)]
pub struct DenseHeightfield {
    n_x: i32,
    n_y: i32,
    delta: f64,
    /// Row-major, row = j + n_y, col = i + n_x.
    heights: Vec<f64>,
}

impl DenseHeightfield {
    fn new_filled(n_x: i32, n_y: i32, delta: f64, fill: f64) -> Self {
        let cols = (2 * n_x + 1) as usize;
        let rows = (2 * n_y + 1) as usize;
        Self {
            n_x,
            n_y,
            delta,
            heights: vec![fill; cols * rows],
        }
    }

    fn index(&self, i: i32, j: i32) -> usize {
        let i = Self::clamp_index(self.n_x, i);
        let j = Self::clamp_index(self.n_y, j);
        let col = (i + self.n_x) as usize;
        let row = (j + self.n_y) as usize;
        row * (2 * self.n_x as usize + 1) + col
    }

    fn set(&mut self, i: i32, j: i32, h: f64) {
        let idx = self.index(i, j);
        self.heights[idx] = h;
    }

    /// Derive `(n_x, n_y, actual_delta)` for half-sizes `(sx, sy)` at a
    /// target spacing `target_delta`.
    fn resolve_dims(sx: f64, sy: f64, target_delta: f64) -> (i32, i32, f64) {
        let n_x = (sx / (2.0 * target_delta)).ceil().max(1.0) as i32;
        let n_y = (sy / (2.0 * target_delta)).ceil().max(1.0) as i32;
        let delta = sx / (2.0 * n_x as f64);
        (n_x, n_y, delta)
    }

    /// Flat terrain: base height zero everywhere.
    pub fn flat(sx: f64, sy: f64, target_delta: f64) -> Result<Self, SCMError> {
        if !(target_delta.is_finite() && target_delta > 0.0) {
            return Err(SCMError::DegenerateSpacing(target_delta));
        }
        let (n_x, n_y, delta) = Self::resolve_dims(sx, sy, target_delta);
        Ok(Self::new_filled(n_x, n_y, delta, 0.0))
    }

    /// Heightmap-derived terrain.
    ///
    /// `heightmap` is already-decoded single-channel image data; image
    /// decoding itself is an out-of-scope embedder responsibility.
    pub fn from_heightmap(
        heightmap: &GrayscaleHeightmap,
        sx: f64,
        sy: f64,
        h_min: f64,
        h_max: f64,
        target_delta: f64,
    ) -> Result<Self, SCMError> {
        if !(target_delta.is_finite() && target_delta > 0.0) {
            return Err(SCMError::DegenerateSpacing(target_delta));
        }
        if heightmap.width < 2 || heightmap.height < 2 || heightmap.samples.is_empty() {
            return Err(SCMError::UnreadableHeightmap(
                "heightmap must be at least 2x2".to_string(),
            ));
        }

        let (n_x, n_y, delta) = Self::resolve_dims(sx, sy, target_delta);
        let mut field = Self::new_filled(n_x, n_y, delta, 0.0);

        for j in -n_y..=n_y {
            for i in -n_x..=n_x {
                // Grid vertex in [0,1] x [0,1], bottom-left origin.
                let u = (i + n_x) as f64 / (2.0 * n_x as f64);
                let v = (j + n_y) as f64 / (2.0 * n_y as f64);

                // Image has top-left origin: flip v.
                let img_x = u * (heightmap.width as f64 - 1.0);
                let img_y = (1.0 - v) * (heightmap.height as f64 - 1.0);

                let gray = heightmap.bilinear_sample(img_x, img_y);
                let h = h_min + gray * (h_max - h_min);
                field.set(i, j, h);
            }
        }

        Ok(field)
    }

    /// Triangle-mesh-derived terrain.
    ///
    /// Cells never covered by a triangle retain `z_min + z_base` (the
    /// documented policy for the region outside the mesh footprint).
    pub fn from_triangle_mesh(
        mesh: &TriangleMesh,
        target_delta: f64,
        z_base: f64,
    ) -> Result<Self, SCMError> {
        if !(target_delta.is_finite() && target_delta > 0.0) {
            return Err(SCMError::DegenerateSpacing(target_delta));
        }
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(SCMError::UnreadableMesh("mesh has no triangles".to_string()));
        }

        let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let mut z_min = f64::INFINITY;
        for v in &mesh.vertices {
            x_min = x_min.min(v.x);
            x_max = x_max.max(v.x);
            y_min = y_min.min(v.y);
            y_max = y_max.max(v.y);
            z_min = z_min.min(v.z);
        }

        let sx = x_max - x_min;
        let sy = y_max - y_min;
        let (n_x, n_y, delta) = Self::resolve_dims(sx.max(target_delta), sy.max(target_delta), target_delta);
        let floor = z_min + z_base;
        let mut field = Self::new_filled(n_x, n_y, delta, floor);

        // Center the mesh's (x,y) range on the grid origin.
        let cx = (x_min + x_max) * 0.5;
        let cy = (y_min + y_max) * 0.5;

        for tri in &mesh.indices {
            let [a, b, c] = *tri;
            let (va, vb, vc) = (mesh.vertices[a as usize], mesh.vertices[b as usize], mesh.vertices[c as usize]);

            let (tx_min, tx_max) = (va.x.min(vb.x).min(vc.x), va.x.max(vb.x).max(vc.x));
            let (ty_min, ty_max) = (va.y.min(vb.y).min(vc.y), va.y.max(vb.y).max(vc.y));

            let i_min = (((tx_min - cx) / delta).floor() as i32).max(-n_x);
            let i_max = (((tx_max - cx) / delta).ceil() as i32).min(n_x);
            let j_min = (((ty_min - cy) / delta).floor() as i32).max(-n_y);
            let j_max = (((ty_max - cy) / delta).ceil() as i32).min(n_y);

            for j in j_min..=j_max {
                for i in i_min..=i_max {
                    let px = cx + i as f64 * delta;
                    let py = cy + j as f64 * delta;
                    if let Some((w_a, w_b, w_c)) = barycentric_2d(px, py, va, vb, vc) {
                        // Degenerate (near-zero-area) triangles are skipped:
                        // barycentric_2d returns None.
                        let z = w_a * va.z + w_b * vb.z + w_c * vc.z;
                        field.set(i, j, z);
                    }
                }
            }
        }

        Ok(field)
    }
}

impl BaseHeightfield for DenseHeightfield {
    fn n_x(&self) -> i32 {
        self.n_x
    }

    fn n_y(&self) -> i32 {
        self.n_y
    }

    fn delta(&self) -> f64 {
        self.delta
    }

    fn height(&self, i: i32, j: i32) -> f64 {
        let idx = self.index(i, j);
        self.heights[idx]
    }
}

/// Already-decoded single-channel heightmap image data.
#[derive(Clone, Debug)]
pub struct GrayscaleHeightmap {
    pub width: u32,
    pub height: u32,
    /// Row-major, top-left origin, values in `[0, 1]`.
    pub samples: Vec<f64>,
}

impl GrayscaleHeightmap {
    fn sample(&self, x: i64, y: i64) -> f64 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.samples[y * self.width as usize + x]
    }

    fn bilinear_sample(&self, x: f64, y: f64) -> f64 {
        let x0 = x.floor() as i64;
        let y0 = y.floor() as i64;
        let fx = x - x0 as f64;
        let fy = y - y0 as f64;

        let h00 = self.sample(x0, y0);
        let h10 = self.sample(x0 + 1, y0);
        let h01 = self.sample(x0, y0 + 1);
        let h11 = self.sample(x0 + 1, y0 + 1);

        let top = h00 * (1.0 - fx) + h10 * fx;
        let bottom = h01 * (1.0 - fx) + h11 * fx;
        top * (1.0 - fy) + bottom * fy
    }
}

/// Already-loaded triangle mesh.
#[derive(Clone, Debug)]
pub struct TriangleMesh {
    pub vertices: Vec<DVec3>,
    pub indices: Vec<[u32; 3]>,
}

/// 2D barycentric inclusion test + weights for point `(px, py)` against
/// triangle `(a, b, c)`, using only their `(x, y)` components. Returns
/// `None` for a degenerate (near-zero-area) triangle or a point outside
/// the triangle.
fn barycentric_2d(px: f64, py: f64, a: DVec3, b: DVec3, c: DVec3) -> Option<(f64, f64, f64)> {
    let denom = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    if denom.abs() < 1e-12 {
        return None;
    }
    let w_a = ((b.y - c.y) * (px - c.x) + (c.x - b.x) * (py - c.y)) / denom;
    let w_b = ((c.y - a.y) * (px - c.x) + (a.x - c.x) * (py - c.y)) / denom;
    let w_c = 1.0 - w_a - w_b;

    let eps = -1e-9;
    if w_a >= eps && w_b >= eps && w_c >= eps {
        Some((w_a, w_b, w_c))
    } else {
        None
    }
}
