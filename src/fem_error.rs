//! Error type shared by all fallible operations in the crate.
use thiserror::Error;

/// Errors produced while assembling, solving, estimating or refining.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FemError {
    /// The discrete system could not be assembled, or its inputs are inconsistent.
    #[error("assembly failed: {0}")]
    Assembly(String),
    /// The factorization failed or the system is singular.
    #[error("linear solve failed: {0}")]
    Solve(String),
    /// Marked-edge refinement received invalid input.
    #[error("refinement failed: {0}")]
    Refinement(String),
    /// The adaptive loop exhausted its iteration budget before reaching the threshold.
    #[error("adaptive loop did not converge after {iterations} iterations (total residual {residual:e})")]
    NonConvergence { iterations: usize, residual: f64 },
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for FemError {
    fn from(err: std::io::Error) -> Self {
        FemError::Io(err.to_string())
    }
}
