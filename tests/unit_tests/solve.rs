use adaptive_fem::solve::{solve_lu, solve_spd};
use adaptive_fem::FemError;
use matrixcompare::assert_matrix_eq;
use nalgebra::{dmatrix, dvector, DMatrix};
use nalgebra_sparse::CsrMatrix;

fn tridiagonal_laplacian(n: usize) -> DMatrix<f64> {
    DMatrix::from_fn(n, n, |i, j| match (i as isize - j as isize).abs() {
        0 => 2.0,
        1 => -1.0,
        _ => 0.0,
    })
}

#[test]
fn solve_spd_matches_dense_solution() {
    let dense = tridiagonal_laplacian(6);
    let rhs = dvector![1.0, 0.0, -2.0, 3.0, 0.5, 1.0];
    let solution = solve_spd(&CsrMatrix::from(&dense), &rhs).unwrap();
    let expected = dense.clone().lu().solve(&rhs).unwrap();
    assert_matrix_eq!(solution, expected, comp = abs, tol = 1e-12);
    assert_matrix_eq!(&dense * &solution, rhs, comp = abs, tol = 1e-12);
}

#[test]
fn solve_spd_rejects_indefinite_matrix() {
    let dense = dmatrix![1.0, 2.0; 2.0, 1.0];
    let result = solve_spd(&CsrMatrix::from(&dense), &dvector![1.0, 1.0]);
    assert!(matches!(result, Err(FemError::Solve(_))));
}

#[test]
fn solvers_reject_mismatched_dimensions() {
    let dense = tridiagonal_laplacian(3);
    let rhs = dvector![1.0, 2.0];
    assert!(matches!(solve_spd(&CsrMatrix::from(&dense), &rhs), Err(FemError::Solve(_))));
    assert!(matches!(solve_lu(dense, &rhs), Err(FemError::Solve(_))));
}

#[test]
fn solve_lu_handles_indefinite_systems() {
    // A small saddle point system
    let matrix = dmatrix![2.0, 0.0, 1.0;
                          0.0, 2.0, -1.0;
                          1.0, -1.0, 0.0];
    let rhs = dvector![1.0, 1.0, 0.0];
    let solution = solve_lu(matrix.clone(), &rhs).unwrap();
    assert_matrix_eq!(&matrix * &solution, rhs, comp = abs, tol = 1e-13);
}

#[test]
fn solve_lu_rejects_singular_matrix() {
    let matrix = dmatrix![1.0, 2.0; 2.0, 4.0];
    assert!(matches!(solve_lu(matrix, &dvector![1.0, 0.0]), Err(FemError::Solve(_))));
}
