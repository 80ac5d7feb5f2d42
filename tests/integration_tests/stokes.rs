use super::data_output_path;
use adaptive_fem::config::{RectangleDomain, StokesConfig, StokesFlow};
use adaptive_fem::fem_error::FemError;
use adaptive_fem::io::vtk::FiniteElementMeshDataSetBuilder;
use adaptive_fem::mesh::TriangleMesh2d;
use adaptive_fem::stokes::solve_stokes;
use nalgebra::Point2;

fn cavity_config() -> StokesConfig {
    StokesConfig::default()
        .with_resolution(8, 8)
        .with_flow(StokesFlow::LidDrivenCavity { lid_velocity: 1.0 })
}

fn channel_config() -> StokesConfig {
    StokesConfig::default()
        .with_domain(RectangleDomain::new(Point2::new(0.0, 0.0), Point2::new(2.0, 1.0)))
        .with_resolution(8, 4)
        .with_flow(StokesFlow::Channel { inflow_peak: 1.0 })
}

#[test]
fn lid_driven_cavity_satisfies_boundary_conditions() -> eyre::Result<()> {
    let config = cavity_config();
    let solution = solve_stokes(&config)?;
    let domain = &config.domain;

    assert_eq!(solution.num_vertices, 81);
    assert_eq!(solution.pressure.len(), 81);
    assert_eq!(solution.velocity.len(), solution.space.vertices().len());
    // One velocity node per vertex and per edge: 81 + 208
    assert_eq!(solution.velocity.len(), 17 * 17);
    // The pressure is pinned at the lower left corner
    assert!(solution.pressure[0].abs() <= 1e-12);

    for (x, u) in solution.space.vertices().iter().zip(&solution.velocity) {
        if domain.is_on_top_side(x) {
            assert!((u.x - 1.0).abs() <= 1e-12 && u.y.abs() <= 1e-12, "u({x}) = {u}");
        } else if domain.is_on_boundary(x) {
            assert!(u.norm() <= 1e-12, "u({x}) = {u}");
        }
    }

    // The lid moves at unit speed and the recirculation inside is slower
    let max_speed = solution.max_speed();
    assert!(max_speed >= 1.0 - 1e-12 && max_speed <= 1.1, "max speed {max_speed}");
    Ok(())
}

#[test]
fn lid_driven_cavity_is_discretely_divergence_free() -> eyre::Result<()> {
    let solution = solve_stokes(&cavity_config())?;
    let moments = solution.divergence_moments()?;
    assert_eq!(moments.len(), solution.num_vertices);
    assert!(moments.amax() <= 1e-10, "max divergence moment {}", moments.amax());

    // The velocity is only weakly divergence free and the lid corners are singular, so the
    // net flow through a vertical grid line is a discretization error of about 0.021 at 8x8
    let flux = solution.flux_through_vertical_line(0.5);
    assert!(flux.abs() <= 3e-2, "flux {flux}");

    let vertex_velocities = solution.vertex_velocities();
    assert_eq!(vertex_velocities.len(), solution.num_vertices);
    let mesh = TriangleMesh2d::from(&solution.space);
    FiniteElementMeshDataSetBuilder::from_mesh(&mesh)
        .with_point_vector_attributes("velocity", vertex_velocities)
        .with_point_scalar_attributes("pressure", solution.pressure.as_slice())
        .try_export(data_output_path().join("stokes_cavity.vtu"))?;
    Ok(())
}

#[test]
fn channel_flow_reproduces_poiseuille_solution() -> eyre::Result<()> {
    let solution = solve_stokes(&channel_config())?;

    // u = (4 U y (1 - y), 0) and p = 8 U (2 - x) lie in the Taylor-Hood space
    for (x, u) in solution.space.vertices().iter().zip(&solution.velocity) {
        let expected = 4.0 * x.y * (1.0 - x.y);
        assert!((u.x - expected).abs() <= 1e-8, "u_x({x}) = {}, expected {expected}", u.x);
        assert!(u.y.abs() <= 1e-8, "u_y({x}) = {}", u.y);
    }
    let vertices = &solution.space.vertices()[..solution.num_vertices];
    for (x, &p) in vertices.iter().zip(solution.pressure.iter()) {
        let expected = 8.0 * (2.0 - x.x);
        assert!((p - expected).abs() <= 1e-6, "p({x}) = {p}, expected {expected}");
    }

    let flux = solution.flux_through_vertical_line(1.0);
    assert!((flux - 2.0 / 3.0).abs() <= 1e-8, "flux {flux}");
    assert!(solution.divergence_moments()?.amax() <= 1e-10);
    Ok(())
}

#[test]
fn solve_stokes_rejects_invalid_configuration() {
    let config = cavity_config().with_resolution(0, 4);
    assert!(matches!(solve_stokes(&config), Err(FemError::Assembly(_))));

    let config = cavity_config().with_domain(RectangleDomain::new(Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)));
    assert!(solve_stokes(&config).is_err());
}
