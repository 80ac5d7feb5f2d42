//! Linear solvers for assembled systems.
use crate::fem_error::FemError;
use crate::Real;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CscMatrix, CsrMatrix};

fn check_dimensions(nrows: usize, ncols: usize, rhs_len: usize) -> Result<(), FemError> {
    if nrows != ncols {
        return Err(FemError::Solve(format!("matrix is not square ({nrows}x{ncols})")));
    }
    if rhs_len != nrows {
        return Err(FemError::Solve(format!(
            "right-hand side has length {rhs_len}, but the matrix has {nrows} rows"
        )));
    }
    Ok(())
}

fn check_finite<T: Real>(solution: DVector<T>) -> Result<DVector<T>, FemError> {
    if solution.iter().all(|x| x.is_finite()) {
        Ok(solution)
    } else {
        Err(FemError::Solve("solution contains non-finite values".to_string()))
    }
}

/// Solves a sparse symmetric positive definite system with a sparse Cholesky factorization.
pub fn solve_spd<T: Real>(matrix: &CsrMatrix<T>, rhs: &DVector<T>) -> Result<DVector<T>, FemError> {
    check_dimensions(matrix.nrows(), matrix.ncols(), rhs.len())?;
    let csc = CscMatrix::from(matrix);
    let cholesky = CscCholesky::factor(&csc).map_err(|err| FemError::Solve(format!("Cholesky factorization failed: {err:?}")))?;
    let b = DMatrix::from_column_slice(rhs.len(), 1, rhs.as_slice());
    let solution = cholesky.solve(&b);
    check_finite(solution.column(0).into_owned())
}

/// Solves a general (possibly indefinite) system with a dense LU factorization.
pub fn solve_lu<T: Real>(matrix: DMatrix<T>, rhs: &DVector<T>) -> Result<DVector<T>, FemError> {
    check_dimensions(matrix.nrows(), matrix.ncols(), rhs.len())?;
    let solution = matrix
        .lu()
        .solve(rhs)
        .ok_or_else(|| FemError::Solve("matrix is singular".to_string()))?;
    check_finite(solution)
}
