//! Basic procedural mesh generation routines.
use crate::config::RectangleDomain;
use crate::connectivity::Tri3d2Connectivity;
use crate::mesh::TriangleMesh2d;
use crate::Real;
use nalgebra::{Point2, Vector2};

/// Generates a structured triangle mesh of the rectangle with `nx × ny` grid squares.
///
/// Vertices are numbered row by row starting from the lower-left corner. Each grid square
/// with corners `a = (i, j)`, `b = (i + 1, j)`, `c = (i + 1, j + 1)`, `d = (i, j + 1)` is split
/// along its diagonal into the counter-clockwise triangles `[a, b, c]` and `[a, c, d]`.
///
/// Returns an empty mesh if `nx` or `ny` is zero.
pub fn create_rectangular_uniform_tri_mesh_2d<T: Real>(
    domain: &RectangleDomain<T>,
    nx: usize,
    ny: usize,
) -> TriangleMesh2d<T> {
    if nx == 0 || ny == 0 {
        return TriangleMesh2d::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }

    let to_t = |n: usize| T::from_usize(n).expect("Must be able to fit usize in T");
    let cell_size = Vector2::new(domain.width() / to_t(nx), domain.height() / to_t(ny));

    let num_vertices_x = nx + 1;
    let to_global_vertex_index = |i: usize, j: usize| num_vertices_x * j + i;

    let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            // Snap the last row/column exactly to the domain boundary
            let x = if i == nx {
                domain.upper_right.x
            } else {
                domain.lower_left.x + to_t(i) * cell_size.x
            };
            let y = if j == ny {
                domain.upper_right.y
            } else {
                domain.lower_left.y + to_t(j) * cell_size.y
            };
            vertices.push(Point2::new(x, y));
        }
    }

    let mut cells = Vec::with_capacity(2 * nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let a = to_global_vertex_index(i, j);
            let b = to_global_vertex_index(i + 1, j);
            let c = to_global_vertex_index(i + 1, j + 1);
            let d = to_global_vertex_index(i, j + 1);
            cells.push(Tri3d2Connectivity([a, b, c]));
            cells.push(Tri3d2Connectivity([a, c, d]));
        }
    }

    TriangleMesh2d::from_vertices_and_connectivity(vertices, cells)
}

pub fn create_unit_square_uniform_tri_mesh_2d<T: Real>(cells_per_dim: usize) -> TriangleMesh2d<T> {
    create_rectangular_uniform_tri_mesh_2d(&RectangleDomain::unit_square(), cells_per_dim, cells_per_dim)
}
