//! Assembly of global finite element matrices and vectors.
//!
//! Element-local contributions are provided by implementors of the traits in [`local`], and
//! accumulated into global sparse matrices and dense vectors by the assemblers in [`global`].
//! Everything is indexed by degrees of freedom, so mixed problems can lay out several fields
//! in one system.
pub mod global;
pub mod local;
