use nalgebra::RealField;

pub mod adapt;
pub mod assembly;
pub mod config;
pub mod connectivity;
pub mod element;
pub mod error;
pub mod estimate;
pub mod fem_error;
pub mod geometry;
pub mod io;
pub mod mesh;
pub mod poisson;
pub mod quadrature;
pub mod solve;
pub mod space;
pub mod stokes;

#[cfg(feature = "proptest")]
pub mod proptest;

mod mesh_convert;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
pub extern crate vtkio;

pub use fem_error::FemError;

/// Scalar type used by the generic numerical routines.
///
/// Used as a trait alias, so that e.g. `f32` and `f64` both qualify.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}
