//! Output of meshes and fields for visualization in external tools.
pub mod series;
pub mod vtk;
