//! Export of meshes and nodal/cell fields as VTK unstructured grids.
use crate::connectivity::{Connectivity, Segment2d2Connectivity, Tri3d2Connectivity, Tri6d2Connectivity};
use crate::fem_error::FemError;
use crate::mesh::Mesh2d;
use crate::Real;
use nalgebra::{Scalar, Vector2};
use num::ToPrimitive;
use std::path::Path;
use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, DataSet, ElementType, IOBuffer, Piece,
    UnstructuredGridPiece, Version, VertexNumbers, Vtk,
};

/// Represents connectivity that is supported by VTK.
pub trait VtkCellConnectivity: Connectivity {
    fn num_nodes(&self) -> usize {
        self.vertex_indices().len()
    }

    fn cell_type(&self) -> CellType;

    /// Panics if `connectivity.len() != self.num_nodes()`.
    fn write_vtk_connectivity(&self, connectivity: &mut [usize]) {
        assert_eq!(connectivity.len(), self.vertex_indices().len());
        connectivity.clone_from_slice(self.vertex_indices());
    }
}

impl VtkCellConnectivity for Segment2d2Connectivity {
    fn cell_type(&self) -> CellType {
        CellType::Line
    }
}

impl VtkCellConnectivity for Tri3d2Connectivity {
    fn cell_type(&self) -> CellType {
        CellType::Triangle
    }
}

impl VtkCellConnectivity for Tri6d2Connectivity {
    // The node order [v0, v1, v2, m01, m12, m20] is also the VTK order
    fn cell_type(&self) -> CellType {
        CellType::QuadraticTriangle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeLocation {
    Point,
    Cell,
}

#[derive(Debug, Clone)]
struct PendingAttribute {
    location: AttributeLocation,
    name: String,
    num_components: usize,
    data: Vec<f64>,
}

fn to_f64<T: ToPrimitive>(value: &T) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// Builds a VTK data set from a mesh and attached fields.
#[derive(Debug, Clone)]
pub struct FiniteElementMeshDataSetBuilder<'a, T: Scalar, C> {
    mesh: &'a Mesh2d<T, C>,
    // Only used for exporting directly to file
    title: Option<String>,
    attributes: Vec<PendingAttribute>,
}

impl<'a, T: Scalar, C> FiniteElementMeshDataSetBuilder<'a, T, C> {
    pub fn from_mesh(mesh: &'a Mesh2d<T, C>) -> Self {
        Self {
            mesh,
            title: None,
            attributes: Vec::new(),
        }
    }
}

impl<'a, T, C> FiniteElementMeshDataSetBuilder<'a, T, C>
where
    T: Real + ToPrimitive,
{
    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..self
        }
    }

    /// One value per mesh vertex.
    pub fn with_point_scalar_attributes(mut self, name: impl Into<String>, values: &[T]) -> Self {
        self.attributes.push(PendingAttribute {
            location: AttributeLocation::Point,
            name: name.into(),
            num_components: 1,
            data: values.iter().map(to_f64).collect(),
        });
        self
    }

    /// One value per cell.
    pub fn with_cell_scalar_attributes(mut self, name: impl Into<String>, values: &[T]) -> Self {
        self.attributes.push(PendingAttribute {
            location: AttributeLocation::Cell,
            name: name.into(),
            num_components: 1,
            data: values.iter().map(to_f64).collect(),
        });
        self
    }

    /// One vector per mesh vertex. VTK vectors are three-dimensional, so the z component is 0.
    pub fn with_point_vector_attributes(mut self, name: impl Into<String>, vectors: &[Vector2<T>]) -> Self {
        self.attributes.push(PendingAttribute {
            location: AttributeLocation::Point,
            name: name.into(),
            num_components: 3,
            data: vectors
                .iter()
                .flat_map(|v| [to_f64(&v.x), to_f64(&v.y), 0.0])
                .collect(),
        });
        self
    }

    fn build_attributes(&self) -> Result<Attributes, FemError> {
        let mut attributes = Attributes::new();
        for attribute in &self.attributes {
            let expected_len = match attribute.location {
                AttributeLocation::Point => self.mesh.vertices().len(),
                AttributeLocation::Cell => self.mesh.connectivity().len(),
            };
            let len = attribute.data.len() / attribute.num_components;
            if len != expected_len {
                return Err(FemError::Io(format!(
                    "attribute '{}' has {len} entries, but {expected_len} are required",
                    attribute.name
                )));
            }

            let elem = match attribute.num_components {
                1 => ElementType::Scalars {
                    num_comp: 1,
                    lookup_table: None,
                },
                _ => ElementType::Vectors,
            };
            let array = Attribute::DataArray(DataArray {
                name: attribute.name.clone(),
                elem,
                data: IOBuffer::F64(attribute.data.clone()),
            });
            match attribute.location {
                AttributeLocation::Point => attributes.point.push(array),
                AttributeLocation::Cell => attributes.cell.push(array),
            }
        }
        Ok(attributes)
    }

    pub fn try_build(&self) -> Result<DataSet, FemError>
    where
        C: VtkCellConnectivity,
    {
        let points: Vec<f64> = self
            .mesh
            .vertices()
            .iter()
            .flat_map(|v| [to_f64(&v.x), to_f64(&v.y), 0.0])
            .collect();

        let to_u32 = |n: usize| {
            u32::try_from(n).map_err(|_| FemError::Io(format!("index {n} does not fit into VTK's 32-bit indices")))
        };

        // Legacy layout: N, i_1, i_2, ... i_N for every cell
        let mut vertices = Vec::new();
        let mut cell_types = Vec::new();
        let mut vertex_indices = Vec::new();
        for cell in self.mesh.connectivity() {
            vertices.push(to_u32(cell.num_nodes())?);

            vertex_indices.clear();
            vertex_indices.resize(cell.num_nodes(), 0);
            cell.write_vtk_connectivity(&mut vertex_indices);

            for &idx in &vertex_indices {
                vertices.push(to_u32(idx)?);
            }
            cell_types.push(cell.cell_type());
        }

        let piece = UnstructuredGridPiece {
            points: IOBuffer::F64(points),
            cells: Cells {
                cell_verts: VertexNumbers::Legacy {
                    num_cells: to_u32(self.mesh.connectivity().len())?,
                    vertices,
                },
                types: cell_types,
            },
            data: self.build_attributes()?,
        };

        Ok(DataSet::UnstructuredGrid {
            meta: None,
            pieces: vec![Piece::Inline(Box::new(piece))],
        })
    }

    /// Exports the data set to a file, creating missing parent directories. The format
    /// follows the extension: `.vtu` gives XML, `.vtk` the legacy format.
    pub fn try_export(&self, filename: impl AsRef<Path>) -> Result<(), FemError>
    where
        C: VtkCellConnectivity,
    {
        let filepath = filename.as_ref();
        let fallback_title = filepath
            .file_stem()
            .map(|os_str| os_str.to_string_lossy().to_string())
            .unwrap_or_else(|| "untitled".to_string());
        let dataset = self.try_build()?;
        if let Some(parent) = filepath.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Vtk {
            version: Version { major: 4, minor: 1 },
            // Without a title, the file stem is used
            title: self.title.clone().unwrap_or(fallback_title),
            byte_order: ByteOrder::BigEndian,
            data: dataset,
            file_path: None,
        }
        .export(filepath)
        .map_err(|err| FemError::Io(format!("failed to write {}: {err}", filepath.display())))
    }
}
