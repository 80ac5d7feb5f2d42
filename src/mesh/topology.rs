//! Edge enumeration and cell-edge connectivity for triangle meshes.
use crate::connectivity::Connectivity;
use crate::fem_error::FemError;
use crate::mesh::Mesh2d;
use nalgebra::Scalar;
use rustc_hash::FxHashMap;
use std::cmp::{max, min};

/// The unique undirected edges of a triangle mesh together with cell-edge connectivity.
///
/// Edges are numbered in the order they are first encountered when traversing cells and their
/// local edges. Local edge `k` of a cell joins its local vertices `k` and `k + 1 (mod 3)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshEdges {
    edges: Vec<[usize; 2]>,
    cell_edges: Vec<[usize; 3]>,
    edge_cells: Vec<[usize; 2]>,
    edge_cell_counts: Vec<u8>,
}

impl MeshEdges {
    /// Enumerates the edges of a triangle mesh.
    ///
    /// Only the first three nodes of each cell are considered, so the same edges are obtained
    /// for a linear mesh and its quadratic counterpart.
    ///
    /// Fails if an edge is shared by more than two cells.
    pub fn from_mesh<T, C>(mesh: &Mesh2d<T, C>) -> Result<Self, FemError>
    where
        T: Scalar,
        C: Connectivity,
    {
        Self::from_triangles(mesh.connectivity().iter().map(|cell| {
            let v = cell.vertex_indices();
            [v[0], v[1], v[2]]
        }))
    }

    pub fn from_triangles(triangles: impl IntoIterator<Item = [usize; 3]>) -> Result<Self, FemError> {
        let mut edge_lookup: FxHashMap<[usize; 2], usize> = FxHashMap::default();
        let mut edges = Vec::new();
        let mut cell_edges = Vec::new();
        let mut edge_cells: Vec<[usize; 2]> = Vec::new();
        let mut edge_cell_counts: Vec<u8> = Vec::new();

        for (cell_index, vertices) in triangles.into_iter().enumerate() {
            let mut local_edges = [0; 3];
            for k in 0..3 {
                let (a, b) = (vertices[k], vertices[(k + 1) % 3]);
                let key = [min(a, b), max(a, b)];
                let edge_index = *edge_lookup.entry(key).or_insert_with(|| {
                    edges.push([a, b]);
                    edge_cells.push([cell_index, usize::MAX]);
                    edge_cell_counts.push(0);
                    edges.len() - 1
                });

                let count = &mut edge_cell_counts[edge_index];
                match *count {
                    0 => {}
                    1 => edge_cells[edge_index][1] = cell_index,
                    _ => {
                        return Err(FemError::InvalidMesh(format!(
                            "edge ({a}, {b}) is shared by more than two cells"
                        )))
                    }
                }
                *count += 1;
                local_edges[k] = edge_index;
            }
            cell_edges.push(local_edges);
        }

        Ok(Self {
            edges,
            cell_edges,
            edge_cells,
            edge_cell_counts,
        })
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_cells(&self) -> usize {
        self.cell_edges.len()
    }

    /// The two vertices of the edge, in the order of the first cell that references it.
    ///
    /// Panics if the edge index is out of bounds.
    pub fn edge_vertices(&self, edge: usize) -> [usize; 2] {
        self.edges[edge]
    }

    /// The global indices of the three local edges of the cell.
    pub fn cell_edges(&self, cell: usize) -> [usize; 3] {
        self.cell_edges[cell]
    }

    /// The one (boundary) or two (interior) cells sharing the edge.
    pub fn edge_cells(&self, edge: usize) -> &[usize] {
        let count = self.edge_cell_counts[edge] as usize;
        &self.edge_cells[edge][..count]
    }

    pub fn is_boundary_edge(&self, edge: usize) -> bool {
        self.edge_cell_counts[edge] == 1
    }

    /// The local index of `edge` within `cell`, if the cell contains it.
    pub fn local_edge_index(&self, cell: usize, edge: usize) -> Option<usize> {
        self.cell_edges[cell].iter().position(|&e| e == edge)
    }

    pub fn boundary_edges(&self) -> impl '_ + Iterator<Item = usize> {
        (0..self.num_edges()).filter(move |&e| self.is_boundary_edge(e))
    }

    pub fn interior_edges(&self) -> impl '_ + Iterator<Item = usize> {
        (0..self.num_edges()).filter(move |&e| !self.is_boundary_edge(e))
    }
}
