use super::data_output_path;
use adaptive_fem::config::RectangleDomain;
use adaptive_fem::error::{estimate_H1_seminorm_error, estimate_L2_error};
use adaptive_fem::io::vtk::FiniteElementMeshDataSetBuilder;
use adaptive_fem::mesh::procedural::create_rectangular_uniform_tri_mesh_2d;
use adaptive_fem::mesh::Tri6Mesh2d;
use adaptive_fem::poisson::{solve_poisson, BoundarySelection, PoissonProblem};
use adaptive_fem::quadrature::triangle_strength5;
use adaptive_fem::space::DiscreteFunction;
use nalgebra::{vector, Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs::File;

/// For serializing to JSON for subsequent analysis/plots
#[derive(Serialize, Deserialize)]
#[allow(non_snake_case)]
struct ErrorSummary {
    element_name: String,
    L2_errors: Vec<f64>,
    H1_seminorm_errors: Vec<f64>,
    resolutions: Vec<f64>,
}

impl ErrorSummary {
    fn rates(errors: &[f64]) -> Vec<f64> {
        errors.windows(2).map(|e| (e[0] / e[1]).log2()).collect()
    }
}

fn u_exact(x: &Point2<f64>) -> f64 {
    (PI * x.x).sin() * (PI * x.y).sin()
}

fn u_exact_grad(x: &Point2<f64>) -> Vector2<f64> {
    PI * vector![(PI * x.x).cos() * (PI * x.y).sin(), (PI * x.x).sin() * (PI * x.y).cos()]
}

fn source(x: &Point2<f64>) -> f64 {
    2.0 * PI * PI * u_exact(x)
}

const RESOLUTIONS: [usize; 3] = [4, 8, 16];

fn write_summary(summary: &ErrorSummary) -> eyre::Result<()> {
    std::fs::create_dir_all(data_output_path())?;
    let path = data_output_path().join(format!("poisson_convergence_{}.json", summary.element_name));
    serde_json::to_writer_pretty(File::create(path)?, summary)?;
    Ok(())
}

#[test]
#[allow(non_snake_case)]
fn poisson_p1_converges_at_optimal_rates() -> eyre::Result<()> {
    let mut summary = ErrorSummary {
        element_name: "tri3".to_string(),
        L2_errors: vec![],
        H1_seminorm_errors: vec![],
        resolutions: vec![],
    };
    for res in RESOLUTIONS {
        let mesh = create_rectangular_uniform_tri_mesh_2d(&RectangleDomain::unit_square(), res, res);
        let u_h = solve_poisson(&mesh, &PoissonProblem::new(source))?;
        summary.L2_errors.push(estimate_L2_error(&u_h, u_exact, triangle_strength5())?);
        summary.H1_seminorm_errors.push(estimate_H1_seminorm_error(&u_h, u_exact_grad, triangle_strength5())?);
        summary.resolutions.push(1.0 / res as f64);

        if res == 16 {
            FiniteElementMeshDataSetBuilder::from_mesh(&mesh)
                .with_point_scalar_attributes("u_h", u_h.coefficients().as_slice())
                .try_export(data_output_path().join("poisson_p1_solution.vtu"))?;
        }
    }
    write_summary(&summary)?;

    let L2_rate = *ErrorSummary::rates(&summary.L2_errors).last().unwrap();
    let H1_rate = *ErrorSummary::rates(&summary.H1_seminorm_errors).last().unwrap();
    assert!(L2_rate > 1.8, "L2 rate {L2_rate}");
    assert!(H1_rate > 0.9, "H1 rate {H1_rate}");
    Ok(())
}

#[test]
#[allow(non_snake_case)]
fn poisson_p2_converges_at_optimal_rates() -> eyre::Result<()> {
    let mut summary = ErrorSummary {
        element_name: "tri6".to_string(),
        L2_errors: vec![],
        H1_seminorm_errors: vec![],
        resolutions: vec![],
    };
    for res in RESOLUTIONS {
        let mesh = Tri6Mesh2d::from(create_rectangular_uniform_tri_mesh_2d(&RectangleDomain::unit_square(), res, res));
        let u_h = solve_poisson(&mesh, &PoissonProblem::new(source))?;
        summary.L2_errors.push(estimate_L2_error(&u_h, u_exact, triangle_strength5())?);
        summary.H1_seminorm_errors.push(estimate_H1_seminorm_error(&u_h, u_exact_grad, triangle_strength5())?);
        summary.resolutions.push(1.0 / res as f64);
    }
    write_summary(&summary)?;

    let L2_rate = *ErrorSummary::rates(&summary.L2_errors).last().unwrap();
    let H1_rate = *ErrorSummary::rates(&summary.H1_seminorm_errors).last().unwrap();
    assert!(L2_rate > 2.7, "L2 rate {L2_rate}");
    assert!(H1_rate > 1.8, "H1 rate {H1_rate}");
    Ok(())
}

#[test]
fn interpolant_error_is_zero_for_exact_fields() -> eyre::Result<()> {
    let mesh = Tri6Mesh2d::from(create_rectangular_uniform_tri_mesh_2d(&RectangleDomain::unit_square(), 3, 3));
    let u = |x: &Point2<f64>| x.x * x.y - x.y * x.y;
    let u_grad = |x: &Point2<f64>| vector![x.y, x.x - 2.0 * x.y];
    let u_h = DiscreteFunction::interpolate(&mesh, u);
    assert!(estimate_L2_error(&u_h, u, triangle_strength5())? <= 1e-13);
    assert!(estimate_H1_seminorm_error(&u_h, u_grad, triangle_strength5())? <= 1e-12);
    Ok(())
}

#[test]
fn partial_dirichlet_boundary_gives_one_dimensional_solution() -> eyre::Result<()> {
    // -u'' = 2 with u = 0 at x = 0 and x = 1 and natural conditions at the top and bottom
    let domain = RectangleDomain::unit_square();
    let mesh = Tri6Mesh2d::from(create_rectangular_uniform_tri_mesh_2d(&domain, 4, 3));
    let dirichlet =
        BoundarySelection::Predicate(Box::new(move |x: &Point2<f64>| domain.is_on_left_side(x) || domain.is_on_right_side(x)));
    let problem = PoissonProblem::new(|_: &Point2<f64>| 2.0).with_dirichlet_boundary(dirichlet);
    let u_h = solve_poisson(&mesh, &problem)?;

    for (x, &u) in mesh.vertices().iter().zip(u_h.coefficients().iter()) {
        assert!((u - x.x * (1.0 - x.x)).abs() <= 1e-10, "u({x}) = {u}");
    }
    Ok(())
}
