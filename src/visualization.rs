//! Visualization bridge: push modified-cell state out to an embedder-owned
//! mesh, colored by a chosen scalar field.

use crate::external::{Colormap, VisualizationMesh};
use crate::grid::{BaseHeightfield, Grid};
use crate::types::CellIndex;

/// Scalar field the colormap is driven by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisualizationField {
    Sinkage,
    PressureSigma,
    ShearTau,
    Erosion,
}

/// A grid cell's world position is addressed by `(i, j)`; the embedder owns
/// the mapping from cell to mesh vertex index.
pub fn update<H: BaseHeightfield>(
    grid: &Grid<H>,
    mesh: &mut dyn VisualizationMesh,
    colormap: &dyn Colormap,
    field: VisualizationField,
    vmin: f64,
    vmax: f64,
    vertex_index: impl Fn(CellIndex) -> usize,
) {
    for cell in grid.modified_this_step() {
        let Some(node) = grid.get(cell) else { continue };
        let index = vertex_index(cell);

        let x = cell.i as f64 * grid.delta();
        let y = cell.j as f64 * grid.delta();
        mesh.set_vertex(index, glam::DVec3::new(x, y, node.level));
        mesh.set_normal(index, node.normal);

        let value = match field {
            VisualizationField::Sinkage => node.sinkage,
            VisualizationField::PressureSigma => node.sigma,
            VisualizationField::ShearTau => node.tau,
            VisualizationField::Erosion => {
                if node.erosion {
                    1.0
                } else {
                    0.0
                }
            }
        };
        mesh.set_color(index, colormap.get(value, vmin, vmax));
    }
}
