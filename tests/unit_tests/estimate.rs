use adaptive_fem::config::RectangleDomain;
use adaptive_fem::estimate::{compute_residual_indicators, total_residual};
use adaptive_fem::mesh::procedural::create_rectangular_uniform_tri_mesh_2d;
use adaptive_fem::mesh::topology::MeshEdges;
use adaptive_fem::mesh::{Tri6Mesh2d, TriangleMesh2d};
use adaptive_fem::poisson::{solve_poisson, PoissonProblem};
use adaptive_fem::space::DiscreteFunction;
use adaptive_fem::FemError;
use matrixcompare::assert_scalar_eq;
use nalgebra::{dvector, DVector, Point2};

fn square_mesh(res: usize) -> TriangleMesh2d<f64> {
    create_rectangular_uniform_tri_mesh_2d(&RectangleDomain::default(), res, res)
}

fn zero(_: &Point2<f64>) -> f64 {
    0.0
}

#[test]
fn cell_residual_of_zero_field() {
    let mesh = square_mesh(2);
    let mesh_edges = MeshEdges::from_mesh(&mesh).unwrap();
    let u_h = DiscreteFunction::zeros(&mesh);
    let indicators = compute_residual_indicators(&u_h, |_: &Point2<f64>| 1.0, &mesh_edges).unwrap();

    // area(T) · ∫_T 1² = 0.5 · 0.5 for every cell
    assert_eq!(indicators.len(), 8);
    for &eta in indicators.iter() {
        assert_scalar_eq!(eta, 0.25, comp = abs, tol = 1e-14);
    }
    assert_scalar_eq!(total_residual(&indicators), 2.0, comp = abs, tol = 1e-13);
}

#[test]
fn gradient_jumps_are_shared_by_both_cells() {
    // |x| has a kink along x = 0, where the normal derivative jumps by 2
    let mesh = square_mesh(2);
    let mesh_edges = MeshEdges::from_mesh(&mesh).unwrap();
    let u_h = DiscreteFunction::interpolate(&mesh, |x: &Point2<f64>| x.x.abs());
    let indicators = compute_residual_indicators(&u_h, zero, &mesh_edges).unwrap();

    // ½ h_E ∫_E 2² with h_E = √0.5 and |E| = 1
    let edge_contribution = 2.0 * 0.5f64.sqrt();
    let nonzero: Vec<usize> = (0..indicators.len())
        .filter(|&i| indicators[i] > 1e-12)
        .collect();
    assert_eq!(nonzero.len(), 4);
    for &cell in &nonzero {
        assert_scalar_eq!(indicators[cell], edge_contribution, comp = abs, tol = 1e-12);
    }
    assert_scalar_eq!(total_residual(&indicators), 4.0 * edge_contribution, comp = abs, tol = 1e-12);
}

#[test]
fn linear_harmonic_field_has_vanishing_indicators() {
    let mesh = square_mesh(4);
    let mesh_edges = MeshEdges::from_mesh(&mesh).unwrap();
    let u_h = DiscreteFunction::interpolate(&mesh, |x: &Point2<f64>| 3.0 * x.x - x.y + 2.0);
    let indicators = compute_residual_indicators(&u_h, zero, &mesh_edges).unwrap();
    assert!(indicators.amax() <= 1e-24);
}

#[test]
fn quadratic_solution_has_vanishing_p2_indicators() {
    // u = -x² / 2 solves -Δu = 1 and has a continuous gradient, so Δu_h + f vanishes while
    // Δu_h - f would not
    let mesh = Tri6Mesh2d::from(square_mesh(3));
    let mesh_edges = MeshEdges::from_mesh(&mesh).unwrap();
    let u_h = DiscreteFunction::interpolate(&mesh, |x: &Point2<f64>| -0.5 * x.x * x.x);
    let indicators = compute_residual_indicators(&u_h, |_: &Point2<f64>| 1.0, &mesh_edges).unwrap();
    assert_eq!(indicators.len(), 18);
    assert!(indicators.amax() <= 1e-20);
}

#[test]
fn indicators_of_discrete_solution_are_positive() {
    let mesh = square_mesh(4);
    let mesh_edges = MeshEdges::from_mesh(&mesh).unwrap();
    let source = |x: &Point2<f64>| 20.0 * (-x.coords.norm_squared() / 0.02).exp();
    let u_h = solve_poisson(&mesh, &PoissonProblem::new(source)).unwrap();
    let indicators = compute_residual_indicators(&u_h, source, &mesh_edges).unwrap();
    assert!(indicators.iter().all(|&eta| eta > 0.0 && eta.is_finite()));
    assert_scalar_eq!(
        total_residual(&indicators),
        indicators.iter().sum::<f64>(),
        comp = abs,
        tol = 1e-14
    );
}

fn gaussian_bump(x: &Point2<f64>) -> f64 {
    20.0 * (-x.coords.norm_squared() / 0.02).exp()
}

fn assert_bitwise_eq(a: &DVector<f64>, b: &DVector<f64>) {
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        assert_eq!(x.to_bits(), y.to_bits(), "indicator {i} differs: {x} vs {y}");
    }
}

#[test]
fn repeated_p1_estimates_are_identical() {
    let mesh = square_mesh(6);
    let mesh_edges = MeshEdges::from_mesh(&mesh).unwrap();
    let u_h = solve_poisson(&mesh, &PoissonProblem::new(gaussian_bump)).unwrap();
    let first = compute_residual_indicators(&u_h, gaussian_bump, &mesh_edges).unwrap();
    let second = compute_residual_indicators(&u_h, gaussian_bump, &mesh_edges).unwrap();
    assert_bitwise_eq(&first, &second);
    assert_eq!(total_residual(&first).to_bits(), total_residual(&second).to_bits());
}

#[test]
fn repeated_p2_estimates_are_identical() {
    let mesh = Tri6Mesh2d::from(square_mesh(4));
    let mesh_edges = MeshEdges::from_mesh(&mesh).unwrap();
    let u_h = solve_poisson(&mesh, &PoissonProblem::new(gaussian_bump)).unwrap();
    let boundary_dofs = adaptive_fem::space::locate_boundary_dofs(&mesh);
    assert!(boundary_dofs.iter().all(|&dof| u_h.coefficients()[dof] == 0.0));

    let first = compute_residual_indicators(&u_h, gaussian_bump, &mesh_edges).unwrap();
    let second = compute_residual_indicators(&u_h, gaussian_bump, &mesh_edges).unwrap();
    assert_bitwise_eq(&first, &second);
}

#[test]
fn mismatched_topology_is_rejected() {
    let mesh = square_mesh(2);
    let other_edges = MeshEdges::from_mesh(&square_mesh(3)).unwrap();
    let u_h = DiscreteFunction::zeros(&mesh);
    let result = compute_residual_indicators(&u_h, zero, &other_edges);
    assert!(matches!(result, Err(FemError::InvalidMesh(_))));
}

#[test]
fn total_residual_of_empty_indicators_is_zero() {
    assert_eq!(total_residual(&DVector::<f64>::zeros(0)), 0.0);
    assert_eq!(total_residual(&dvector![0.5, 0.25]), 0.75);
}
