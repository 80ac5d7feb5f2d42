use crate::connectivity::{CellConnectivity, Connectivity, Tri3d2Connectivity, Tri6d2Connectivity};
use crate::fem_error::FemError;
use crate::Real;
use nalgebra::{Point2, Scalar, Vector2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod procedural;
pub mod refinement;
pub mod topology;

/// Index-based data structure for conforming triangle meshes (i.e. no hanging nodes).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(bound(
    serialize = "T: Serialize, Connectivity: Serialize",
    deserialize = "T: Deserialize<'de>, Connectivity: Deserialize<'de>"
))]
pub struct Mesh2d<T: Scalar, Connectivity> {
    vertices: Vec<Point2<T>>,
    connectivity: Vec<Connectivity>,
}

pub type TriangleMesh2d<T> = Mesh2d<T, Tri3d2Connectivity>;
pub type Tri6Mesh2d<T> = Mesh2d<T, Tri6d2Connectivity>;

impl<T: Scalar, Connectivity> Mesh2d<T, Connectivity> {
    pub fn vertices(&self) -> &[Point2<T>] {
        &self.vertices
    }

    pub fn connectivity(&self) -> &[Connectivity] {
        &self.connectivity
    }

    /// Construct a mesh from vertices and connectivity.
    ///
    /// The connectivity is expected to only reference in-bounds vertex indices. Mesh queries
    /// panic when they encounter an out-of-bounds index, so meshes coming from outside the
    /// crate should be checked with [`Mesh2d::validate`].
    pub fn from_vertices_and_connectivity(vertices: Vec<Point2<T>>, connectivity: Vec<Connectivity>) -> Self {
        Self { vertices, connectivity }
    }

    pub fn into_parts(self) -> (Vec<Point2<T>>, Vec<Connectivity>) {
        (self.vertices, self.connectivity)
    }
}

impl<T, C> Mesh2d<T, C>
where
    T: Scalar,
    C: Connectivity,
{
    /// Checks that every cell only references existing vertices, and no vertex twice.
    pub fn validate(&self) -> Result<(), FemError> {
        let num_vertices = self.vertices.len();
        for (cell_index, cell) in self.connectivity.iter().enumerate() {
            let indices = cell.vertex_indices();
            if let Some(&invalid) = indices.iter().find(|&&v| v >= num_vertices) {
                return Err(FemError::InvalidMesh(format!(
                    "cell {cell_index} references vertex {invalid}, but the mesh only has {num_vertices} vertices"
                )));
            }
            for (i, a) in indices.iter().enumerate() {
                if indices[i + 1..].contains(a) {
                    return Err(FemError::InvalidMesh(format!(
                        "cell {cell_index} references vertex {a} more than once"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Finds cells that have at least one boundary face.
    pub fn find_boundary_cells(&self) -> Vec<usize> {
        let mut cells: Vec<_> = self
            .find_boundary_faces()
            .into_iter()
            .map(|(_, cell_index, _)| cell_index)
            .collect();
        cells.sort_unstable();
        cells.dedup();
        cells
    }

    /// Finds faces which are only connected to exactly one cell, along with the connected cell
    /// index and the local index of the face within that cell.
    pub fn find_boundary_faces(&self) -> Vec<(C::FaceConnectivity, usize, usize)> {
        // Faces are identified by their sorted vertex indices. A BTreeMap keeps the output
        // deterministic.
        let mut face_counts: BTreeMap<Vec<usize>, ((C::FaceConnectivity, usize, usize), usize)> = BTreeMap::new();
        for (cell_index, cell_conn) in self.connectivity.iter().enumerate() {
            for local_index in 0..cell_conn.num_faces() {
                let face_conn = cell_conn
                    .get_face_connectivity(local_index)
                    .expect("Local face index is in bounds");
                let mut key = face_conn.vertex_indices().to_vec();
                key.sort_unstable();
                face_counts
                    .entry(key)
                    .and_modify(|(_, count)| *count += 1)
                    .or_insert(((face_conn, cell_index, local_index), 1));
            }
        }

        face_counts
            .into_values()
            .filter(|(_, count)| *count == 1)
            .map(|(face, _)| face)
            .collect()
    }

    /// Returns a sorted list of vertices that are determined to be on the boundary.
    ///
    /// A vertex is considered to be a part of the boundary if it belongs to a boundary face.
    pub fn find_boundary_vertices(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        for (connectivity, _, _) in self.find_boundary_faces() {
            indices.extend_from_slice(connectivity.vertex_indices());
        }
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

impl<T, C> Mesh2d<T, C>
where
    T: Scalar,
    C: CellConnectivity<T>,
{
    pub fn get_cell(&self, index: usize) -> Option<C::Cell> {
        self.connectivity()
            .get(index)
            .and_then(|conn| conn.cell(self.vertices()))
    }

    pub fn cell_iter(&self) -> impl '_ + Iterator<Item = C::Cell> {
        self.connectivity().iter().map(move |connectivity| {
            connectivity
                .cell(&self.vertices)
                .expect("Mesh2d is not allowed to contain cells with indices out of bounds.")
        })
    }
}

impl<T: Real, C> Mesh2d<T, C> {
    /// Translates all vertices of the mesh by the given translation vector.
    pub fn translate(&mut self, translation: &Vector2<T>) {
        self.transform_vertices(|p| *p += translation);
    }

    /// Transform all vertices of the mesh by the given transformation function.
    pub fn transform_vertices<F>(&mut self, mut transformation: F)
    where
        F: FnMut(&mut Point2<T>),
    {
        for p in &mut self.vertices {
            transformation(p);
        }
    }

    /// Returns the lower-left and upper-right corners of the axis-aligned bounding box,
    /// or `None` if the mesh has no vertices.
    pub fn bounding_box(&self) -> Option<(Point2<T>, Point2<T>)> {
        let (first, rest) = self.vertices.split_first()?;
        Some(rest.iter().fold((*first, *first), |(min, max), p| {
            (min.inf(p), max.sup(p))
        }))
    }
}

impl<T: Real> TriangleMesh2d<T> {
    /// Area of every cell, in cell order.
    pub fn cell_areas(&self) -> Vec<T> {
        self.cell_iter().map(|triangle| triangle.area()).collect()
    }

    pub fn total_area(&self) -> T {
        self.cell_iter()
            .map(|triangle| triangle.area())
            .fold(T::zero(), |a, b| a + b)
    }
}
