//! Runs the adaptive Poisson loop with the reference parameters and writes every mesh
//! generation to `data/poisson_amr/`.
//!
//! Change `DEGREE` to `ElementDegree::Quadratic` to run with P2 elements.
use adaptive_fem::adapt::AdaptivePoissonSolver;
use adaptive_fem::config::{AdaptiveConfig, ElementDegree};
use adaptive_fem::io::series::SnapshotSeries;
use adaptive_fem::io::vtk::FiniteElementMeshDataSetBuilder;
use std::fs;

const DEGREE: ElementDegree = ElementDegree::Linear;

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt::init();

    let config = AdaptiveConfig::reference().with_degree(DEGREE);
    let solver = AdaptivePoissonSolver::new(config)?;

    let mut series = SnapshotSeries::new("data/poisson_amr", "poisson_amr")?;
    let outcome = solver.run(|state| {
        let data_set = FiniteElementMeshDataSetBuilder::from_mesh(state.mesh())
            .with_title(format!("Adaptive Poisson, iteration {}", state.iteration))
            .with_point_scalar_attributes("u", state.vertex_values())
            .with_cell_scalar_attributes("indicator", state.indicators.as_slice());
        series.write_snapshot(state.iteration as f64, &data_set)?;
        Ok(())
    })?;

    println!(
        "Converged after {} iterations: {} cells, total residual {:.4e}",
        outcome.num_iterations(),
        outcome.mesh().connectivity().len(),
        outcome.total_residual()
    );

    let history_path = series.directory().join("history.json");
    fs::write(&history_path, serde_json::to_string_pretty(&outcome.history)?)?;
    let config_path = series.directory().join("config.json");
    fs::write(&config_path, serde_json::to_string_pretty(solver.config())?)?;
    println!("Results written to {}", series.pvd_path().display());
    Ok(())
}
