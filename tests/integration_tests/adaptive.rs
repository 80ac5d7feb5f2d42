use super::data_output_path;
use adaptive_fem::adapt::{AdaptivePoissonSolver, SolvedState};
use adaptive_fem::config::{AdaptiveConfig, ElementDegree, GaussianBump};
use adaptive_fem::io::series::SnapshotSeries;
use adaptive_fem::io::vtk::FiniteElementMeshDataSetBuilder;
use adaptive_fem::mesh::procedural::create_rectangular_uniform_tri_mesh_2d;
use adaptive_fem::FemError;
use std::fs;

#[test]
fn reference_run_converges() -> eyre::Result<()> {
    let config = AdaptiveConfig::reference();
    let solver = AdaptivePoissonSolver::new(config.clone())?;

    let mut observed_residuals = Vec::new();
    let outcome = solver.run(|state| {
        observed_residuals.push(state.total_residual);
        Ok(())
    })?;

    assert!(outcome.total_residual() <= config.threshold);
    assert!(outcome.num_iterations() >= 2 && outcome.num_iterations() <= 20);
    assert_eq!(observed_residuals.len(), outcome.num_iterations());

    let history = &outcome.history;
    assert_eq!(history[0].iteration, 0);
    assert_eq!(history[0].num_cells, 128);
    assert_eq!(history[0].num_vertices, 81);
    assert_eq!(history[0].num_marked, 7);
    for (k, record) in history.iter().enumerate() {
        assert_eq!(record.iteration, k);
        assert_eq!(record.total_residual, observed_residuals[k]);
    }
    let last = history.last().unwrap();
    assert_eq!(last.num_marked, 0);
    assert!(history[..history.len() - 1]
        .iter()
        .all(|record| record.total_residual > config.threshold));
    // Meshes only grow
    assert!(history.windows(2).all(|w| w[1].num_cells > w[0].num_cells));
    assert!(last.total_residual < history[0].total_residual);

    // The homogeneous boundary condition holds exactly on the final mesh
    let mesh = outcome.mesh();
    let solution = outcome.solution();
    for v in mesh.find_boundary_vertices() {
        assert_eq!(solution[v], 0.0);
    }
    assert_eq!(outcome.indicators().len(), mesh.connectivity().len());
    assert!(outcome.indicators().iter().all(|&eta| eta >= 0.0));

    let path = data_output_path().join("reference_run_history.json");
    fs::create_dir_all(data_output_path())?;
    fs::write(path, serde_json::to_string_pretty(history)?)?;
    Ok(())
}

#[test]
fn refinement_concentrates_near_the_source() -> eyre::Result<()> {
    let outcome = AdaptivePoissonSolver::new(AdaptiveConfig::reference())?.run(|_| Ok(()))?;
    let mesh = outcome.mesh();
    let areas = mesh.cell_areas();
    let near_center = mesh
        .cell_iter()
        .zip(&areas)
        .filter(|(triangle, _)| triangle.centroid().coords.norm() < 0.2)
        .map(|(_, &area)| area)
        .fold(f64::INFINITY, f64::min);
    let far_away = mesh
        .cell_iter()
        .zip(&areas)
        .filter(|(triangle, _)| triangle.centroid().coords.norm() > 0.9)
        .map(|(_, &area)| area)
        .fold(0.0, f64::max);
    assert!(near_center < far_away);
    Ok(())
}

#[test]
fn quadratic_run_converges() -> eyre::Result<()> {
    let config = AdaptiveConfig::reference().with_degree(ElementDegree::Quadratic);
    let outcome = AdaptivePoissonSolver::new(config.clone())?.run(|_| Ok(()))?;
    assert!(outcome.total_residual() <= config.threshold);
    assert_eq!(outcome.final_state.space.degree(), ElementDegree::Quadratic);
    assert_eq!(outcome.solution().len(), outcome.final_state.space.num_dofs());
    assert!(outcome.solution().len() > outcome.mesh().vertices().len());
    Ok(())
}

#[test]
fn iteration_budget_is_enforced() -> eyre::Result<()> {
    let config = AdaptiveConfig::reference().with_max_iterations(Some(2));
    let result = AdaptivePoissonSolver::new(config)?.run(|_| Ok(()));
    match result {
        Err(FemError::NonConvergence { iterations, residual }) => {
            assert_eq!(iterations, 2);
            assert!(residual > 5e-2);
        }
        other => panic!("expected non-convergence, got {other:?}"),
    }
    Ok(())
}

#[test]
fn observer_errors_abort_the_loop() -> eyre::Result<()> {
    let solver = AdaptivePoissonSolver::new(AdaptiveConfig::reference())?;
    let mut calls = 0;
    let result = solver.run(|_| {
        calls += 1;
        Err(FemError::Io("disk full".to_string()))
    });
    assert_eq!(result.unwrap_err(), FemError::Io("disk full".to_string()));
    assert_eq!(calls, 1);
    Ok(())
}

#[test]
fn invalid_config_is_rejected() {
    let config = AdaptiveConfig::reference().with_fraction(0.0);
    assert!(AdaptivePoissonSolver::new(config).is_err());
}

#[test]
fn stages_can_be_driven_by_hand() -> eyre::Result<()> {
    let config = AdaptiveConfig::reference();
    let source = GaussianBump::default();
    let mesh = create_rectangular_uniform_tri_mesh_2d(&config.domain, 8, 8);

    let solved = SolvedState::solve(0, 0, mesh, ElementDegree::Linear, &source)?;
    assert_eq!(solved.solution.len(), 81);

    let estimated = solved.estimate(&source)?;
    assert_eq!(estimated.indicators.len(), 128);
    assert_eq!(estimated.vertex_values().len(), 81);
    assert!(!estimated.has_converged(config.threshold));
    let total: f64 = estimated.indicators.iter().sum();
    assert_eq!(estimated.total_residual, total);

    let marked = estimated.mark(config.fraction);
    assert_eq!(marked.marked_cells.len(), 7);
    assert_eq!(marked.marked_edges.len(), 21);

    let refined = marked.refine()?;
    assert_eq!(refined.generation, 1);
    assert!(refined.refined.mesh.connectivity().len() > 128);
    assert!(refined.refined.split_edges.len() >= 7);

    let next = refined.solve(&source)?;
    assert_eq!(next.iteration, 1);
    assert_eq!(next.generation, 1);
    assert_eq!(next.solution.len(), next.space.mesh().vertices().len());
    Ok(())
}

#[test]
fn snapshots_of_every_iteration_are_written() -> eyre::Result<()> {
    let directory = data_output_path().join("snapshots_of_every_iteration_are_written");
    let _ = fs::remove_dir_all(&directory);
    let mut series = SnapshotSeries::new(&directory, "poisson_amr")?;

    let outcome = AdaptivePoissonSolver::new(AdaptiveConfig::reference())?.run(|state| {
        let data_set = FiniteElementMeshDataSetBuilder::from_mesh(state.mesh())
            .with_point_scalar_attributes("u", state.vertex_values())
            .with_cell_scalar_attributes("indicator", state.indicators.as_slice());
        series.write_snapshot(state.iteration as f64, &data_set)?;
        Ok(())
    })?;

    assert_eq!(series.len(), outcome.num_iterations());
    assert!(series.snapshot_paths().iter().all(|path| path.exists()));
    let collection = fs::read_to_string(series.pvd_path())?;
    assert_eq!(collection.matches("<DataSet").count(), outcome.num_iterations());
    Ok(())
}
