//! Uniform and marked-edge refinement of triangle meshes.
//!
//! [`refine_uniformly`] splits every triangle into four. [`refine_marked_edges`] bisects a
//! given set of edges and closes the set so that the refined mesh stays conforming.
use crate::connectivity::Tri3d2Connectivity;
use crate::fem_error::FemError;
use crate::geometry::LineSegment2d;
use crate::mesh::topology::MeshEdges;
use crate::mesh::TriangleMesh2d;
use crate::Real;
use log::debug;
use nalgebra::Point2;
use rustc_hash::FxHashMap;
use std::cmp::{max, min};

/// Identifies the midpoint of an edge independently of the edge's orientation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EdgeMidpointLabel([usize; 2]);

impl EdgeMidpointLabel {
    pub fn new(a: usize, b: usize) -> Self {
        Self([min(a, b), max(a, b)])
    }

    pub fn construct_vertex<T: Real>(&self, vertices: &[Point2<T>]) -> Point2<T> {
        let [a, b] = self.0;
        LineSegment2d::new(vertices[a], vertices[b]).midpoint()
    }
}

/// Apply one round of uniform (red) refinement: every triangle is split into four.
///
/// Existing vertices keep their indices. Edge midpoints are appended in the order their
/// edges are first encountered.
pub fn refine_uniformly<T: Real>(mesh: &TriangleMesh2d<T>) -> TriangleMesh2d<T> {
    let mut vertices = mesh.vertices().to_vec();
    let mut midpoints: FxHashMap<EdgeMidpointLabel, usize> = FxHashMap::default();
    let mut midpoint_index = |a: usize, b: usize, vertices: &mut Vec<Point2<T>>| {
        let label = EdgeMidpointLabel::new(a, b);
        *midpoints.entry(label).or_insert_with(|| {
            let midpoint = label.construct_vertex(vertices);
            vertices.push(midpoint);
            vertices.len() - 1
        })
    };

    let mut connectivity = Vec::with_capacity(4 * mesh.connectivity().len());
    for &Tri3d2Connectivity([a, b, c]) in mesh.connectivity() {
        let d = midpoint_index(a, b, &mut vertices);
        let e = midpoint_index(b, c, &mut vertices);
        let f = midpoint_index(c, a, &mut vertices);
        connectivity.extend_from_slice(&[
            Tri3d2Connectivity([a, d, f]),
            Tri3d2Connectivity([d, b, e]),
            Tri3d2Connectivity([f, e, c]),
            Tri3d2Connectivity([d, e, f]),
        ]);
    }

    TriangleMesh2d::from_vertices_and_connectivity(vertices, connectivity)
}

/// Repeatedly applies uniform mesh refinement to the given mesh.
pub fn refine_uniformly_repeat<T: Real>(mesh: &TriangleMesh2d<T>, repeat_times: usize) -> TriangleMesh2d<T> {
    let mut mesh = mesh.clone();
    for _ in 0..repeat_times {
        mesh = refine_uniformly(&mesh);
    }
    mesh
}

/// The result of marked-edge refinement.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinedMesh<T: Real> {
    pub mesh: TriangleMesh2d<T>,
    /// The edges (indices into the [`MeshEdges`] of the old mesh) that were bisected, after
    /// closure. Sorted and without duplicates.
    pub split_edges: Vec<usize>,
    /// The index of the old cell each new cell was created from.
    pub parent_cells: Vec<usize>,
}

/// The global index of the longest edge of every cell. Ties resolve to the lowest global
/// edge index, so that cells sharing an edge agree on the choice.
fn find_longest_edges<T: Real>(mesh: &TriangleMesh2d<T>, mesh_edges: &MeshEdges) -> Vec<usize> {
    mesh.cell_iter()
        .enumerate()
        .map(|(cell_index, triangle)| {
            let lengths = triangle.sides().map(|side| side.norm_squared());
            let edges = mesh_edges.cell_edges(cell_index);
            let mut longest = 0;
            for k in 1..3 {
                let is_longer = lengths[k] > lengths[longest];
                let is_tie_with_lower_index = lengths[k] == lengths[longest] && edges[k] < edges[longest];
                if is_longer || is_tie_with_lower_index {
                    longest = k;
                }
            }
            edges[longest]
        })
        .collect()
}

/// Refines the mesh by bisecting the given edges.
///
/// `edges` index into `mesh_edges`, which must describe `mesh`. Duplicate indices are
/// tolerated and collapse into a single split.
///
/// To keep the mesh conforming, the marked set is closed first: whenever a cell has a marked
/// edge, its longest edge is marked as well, until nothing changes. Each split edge then gets
/// a new midpoint vertex, appended after the existing vertices in ascending edge order.
/// A cell with `k` marked edges is replaced by `k + 1` children: it is bisected from the
/// midpoint of its longest edge to the opposite vertex, and each half that contains another
/// marked edge is bisected once more through that edge's midpoint. Children keep the
/// orientation of their parent.
///
/// # Errors
///
/// Returns [`FemError::Refinement`] if `edges` is empty or contains an out-of-range index,
/// or if `mesh_edges` does not describe `mesh`.
pub fn refine_marked_edges<T: Real>(
    mesh: &TriangleMesh2d<T>,
    edges: &[usize],
    mesh_edges: &MeshEdges,
) -> Result<RefinedMesh<T>, FemError> {
    if edges.is_empty() {
        return Err(FemError::Refinement("no edges were marked for refinement".to_string()));
    }
    if mesh_edges.num_cells() != mesh.connectivity().len() {
        return Err(FemError::Refinement(format!(
            "edge topology describes {} cells, but the mesh has {}",
            mesh_edges.num_cells(),
            mesh.connectivity().len()
        )));
    }
    let num_edges = mesh_edges.num_edges();
    let mut marked = vec![false; num_edges];
    for &edge in edges {
        if edge >= num_edges {
            return Err(FemError::Refinement(format!(
                "edge index {edge} is out of range for a mesh with {num_edges} edges"
            )));
        }
        marked[edge] = true;
    }

    let longest_edges = find_longest_edges(mesh, mesh_edges);
    let mut closure_passes = 0;
    loop {
        closure_passes += 1;
        let mut changed = false;
        for (cell_index, &longest) in longest_edges.iter().enumerate() {
            let has_marked_edge = mesh_edges
                .cell_edges(cell_index)
                .iter()
                .any(|&e| marked[e]);
            if has_marked_edge && !marked[longest] {
                marked[longest] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let split_edges: Vec<usize> = (0..num_edges).filter(|&e| marked[e]).collect();
    let mut vertices = mesh.vertices().to_vec();
    let mut midpoints = vec![None; num_edges];
    for &edge in &split_edges {
        let [a, b] = mesh_edges.edge_vertices(edge);
        midpoints[edge] = Some(vertices.len());
        vertices.push(EdgeMidpointLabel::new(a, b).construct_vertex(mesh.vertices()));
    }

    let mut connectivity = Vec::with_capacity(mesh.connectivity().len() + 2 * split_edges.len());
    let mut parent_cells = Vec::with_capacity(connectivity.capacity());
    for (cell_index, cell) in mesh.connectivity().iter().enumerate() {
        let cell_edges = mesh_edges.cell_edges(cell_index);
        if !cell_edges.iter().any(|&e| marked[e]) {
            connectivity.push(*cell);
            parent_cells.push(cell_index);
            continue;
        }

        // Rotate the cell so that its longest edge joins local vertices 0 and 1
        let k = cell_edges
            .iter()
            .position(|&e| e == longest_edges[cell_index])
            .expect("Longest edge must be one of the cell's edges");
        let v = [cell[k], cell[(k + 1) % 3], cell[(k + 2) % 3]];
        let midpoint = |local_edge: usize| midpoints[cell_edges[(k + local_edge) % 3]];

        let m01 = midpoint(0).expect("Closure guarantees that the longest edge is split");
        let mut children = Vec::with_capacity(4);
        match midpoint(2) {
            Some(m20) => children.extend([[v[0], m01, m20], [m20, m01, v[2]]]),
            None => children.push([v[0], m01, v[2]]),
        }
        match midpoint(1) {
            Some(m12) => children.extend([[m01, v[1], m12], [m01, m12, v[2]]]),
            None => children.push([m01, v[1], v[2]]),
        }

        for child in children {
            connectivity.push(Tri3d2Connectivity(child));
            parent_cells.push(cell_index);
        }
    }

    debug!(
        "Refined {} cells into {} cells: {} marked edges, {} split after {} closure passes",
        mesh.connectivity().len(),
        connectivity.len(),
        edges.len(),
        split_edges.len(),
        closure_passes
    );

    Ok(RefinedMesh {
        mesh: TriangleMesh2d::from_vertices_and_connectivity(vertices, connectivity),
        split_edges,
        parent_cells,
    })
}
