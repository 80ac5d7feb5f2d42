use crate::connectivity::{Tri3d2Connectivity, Tri6d2Connectivity};
use crate::mesh::refinement::EdgeMidpointLabel;
use crate::mesh::{Tri6Mesh2d, TriangleMesh2d};
use crate::Real;
use itertools::izip;
use rustc_hash::FxHashMap;

impl<'a, T: Real> From<&'a TriangleMesh2d<T>> for Tri6Mesh2d<T> {
    /// Adds a node at the midpoint of every edge.
    ///
    /// The vertices of the linear mesh keep their indices. Midpoint nodes follow in the order
    /// their edges are first encountered, which is the numbering used by
    /// [`MeshEdges`](crate::mesh::topology::MeshEdges): the
    /// node on edge `e` has index `num_vertices + e`.
    fn from(initial_mesh: &'a TriangleMesh2d<T>) -> Self {
        let mut vertices = initial_mesh.vertices().to_vec();
        let mut edge_node_map: FxHashMap<EdgeMidpointLabel, usize> = FxHashMap::default();

        let mut new_connectivity = Vec::with_capacity(initial_mesh.connectivity().len());
        for &Tri3d2Connectivity([a, b, c]) in initial_mesh.connectivity() {
            let mut tri6_node_indices = [a, b, c, 0, 0, 0];
            for ((from, to), node_index) in izip!([(a, b), (b, c), (c, a)], &mut tri6_node_indices[3..]) {
                let label = EdgeMidpointLabel::new(from, to);
                *node_index = *edge_node_map.entry(label).or_insert_with(|| {
                    vertices.push(label.construct_vertex(initial_mesh.vertices()));
                    vertices.len() - 1
                });
            }
            new_connectivity.push(Tri6d2Connectivity(tri6_node_indices));
        }

        Tri6Mesh2d::from_vertices_and_connectivity(vertices, new_connectivity)
    }
}

impl<T: Real> From<TriangleMesh2d<T>> for Tri6Mesh2d<T> {
    fn from(initial_mesh: TriangleMesh2d<T>) -> Self {
        Self::from(&initial_mesh)
    }
}

impl<'a, T: Real> From<&'a Tri6Mesh2d<T>> for TriangleMesh2d<T> {
    /// Drops the midpoint nodes.
    ///
    /// Assumes that vertex nodes come before all midpoint nodes, as produced by the conversion
    /// from a linear mesh.
    fn from(mesh: &'a Tri6Mesh2d<T>) -> Self {
        let connectivity: Vec<_> = mesh.connectivity().iter().map(Tri3d2Connectivity::from).collect();
        let num_vertices = connectivity
            .iter()
            .flat_map(|cell| cell.0)
            .max()
            .map(|max_index| max_index + 1)
            .unwrap_or(0);
        TriangleMesh2d::from_vertices_and_connectivity(mesh.vertices()[..num_vertices].to_vec(), connectivity)
    }
}
