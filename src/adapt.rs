//! The adaptive SOLVE → ESTIMATE → MARK → REFINE loop for the Poisson problem.
//!
//! Each stage of the loop is an explicit record that is consumed by the next transition:
//! [`SolvedState`] → [`EstimatedState`] → [`MarkedState`] → [`RefinedState`] → [`SolvedState`].
//! No state outlives its stage. In particular, a solution is never carried over to a refined
//! mesh; it is recomputed from scratch.
//!
//! [`AdaptivePoissonSolver`] drives the records until the total residual reaches the configured
//! threshold.
use crate::config::{AdaptiveConfig, ElementDegree, GaussianBump};
use crate::estimate::{compute_residual_indicators, total_residual};
use crate::fem_error::FemError;
use crate::mesh::procedural::create_rectangular_uniform_tri_mesh_2d;
use crate::mesh::refinement::{refine_marked_edges, RefinedMesh};
use crate::mesh::topology::MeshEdges;
use crate::mesh::{Tri6Mesh2d, TriangleMesh2d};
use crate::poisson::{solve_poisson, PoissonProblem};
use crate::space::DiscreteFunction;
use log::{info, warn};
use nalgebra::{DVector, Point2};
use serde::{Deserialize, Serialize};

pub mod marking;

use marking::{collect_marked_edges, mark_cells};

/// The Lagrange space of the current mesh generation.
#[derive(Debug, Clone, PartialEq)]
pub enum PoissonSpace {
    /// P1: the triangle mesh is the space.
    Linear(TriangleMesh2d<f64>),
    /// P2: the triangle mesh with a midpoint node on every edge.
    Quadratic {
        mesh: TriangleMesh2d<f64>,
        space: Tri6Mesh2d<f64>,
    },
}

impl PoissonSpace {
    pub fn new(mesh: TriangleMesh2d<f64>, degree: ElementDegree) -> Self {
        match degree {
            ElementDegree::Linear => Self::Linear(mesh),
            ElementDegree::Quadratic => {
                let space = Tri6Mesh2d::from(&mesh);
                Self::Quadratic { mesh, space }
            }
        }
    }

    pub fn degree(&self) -> ElementDegree {
        match self {
            Self::Linear(_) => ElementDegree::Linear,
            Self::Quadratic { .. } => ElementDegree::Quadratic,
        }
    }

    /// The triangle mesh that is refined.
    pub fn mesh(&self) -> &TriangleMesh2d<f64> {
        match self {
            Self::Linear(mesh) => mesh,
            Self::Quadratic { mesh, .. } => mesh,
        }
    }

    pub fn into_mesh(self) -> TriangleMesh2d<f64> {
        match self {
            Self::Linear(mesh) => mesh,
            Self::Quadratic { mesh, .. } => mesh,
        }
    }

    pub fn num_dofs(&self) -> usize {
        match self {
            Self::Linear(mesh) => mesh.vertices().len(),
            Self::Quadratic { space, .. } => space.vertices().len(),
        }
    }

    /// Solves `-Δu = f` with `u = 0` on the whole boundary.
    fn solve(&self, source: &GaussianBump) -> Result<DVector<f64>, FemError> {
        let problem = PoissonProblem::new(|x: &Point2<f64>| source.evaluate(x));
        let solution = match self {
            Self::Linear(mesh) => solve_poisson(mesh, &problem)?.into_coefficients(),
            Self::Quadratic { space, .. } => solve_poisson(space, &problem)?.into_coefficients(),
        };
        Ok(solution)
    }

    fn residual_indicators(
        &self,
        solution: DVector<f64>,
        source: &GaussianBump,
        mesh_edges: &MeshEdges,
    ) -> Result<(DVector<f64>, DVector<f64>), FemError> {
        let f = |x: &Point2<f64>| source.evaluate(x);
        match self {
            Self::Linear(mesh) => {
                let u_h = DiscreteFunction::new(mesh, solution)?;
                let indicators = compute_residual_indicators(&u_h, f, mesh_edges)?;
                Ok((u_h.into_coefficients(), indicators))
            }
            Self::Quadratic { space, .. } => {
                let u_h = DiscreteFunction::new(space, solution)?;
                let indicators = compute_residual_indicators(&u_h, f, mesh_edges)?;
                Ok((u_h.into_coefficients(), indicators))
            }
        }
    }
}

/// The current mesh generation has a solution.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedState {
    pub iteration: usize,
    /// Number of refinements that produced the current mesh.
    pub generation: usize,
    pub space: PoissonSpace,
    /// Nodal values of the solution. Vertex nodes come first.
    pub solution: DVector<f64>,
}

impl SolvedState {
    /// Solves the Poisson problem on a fresh mesh generation.
    pub fn solve(
        iteration: usize,
        generation: usize,
        mesh: TriangleMesh2d<f64>,
        degree: ElementDegree,
        source: &GaussianBump,
    ) -> Result<Self, FemError> {
        let space = PoissonSpace::new(mesh, degree);
        let solution = space.solve(source)?;
        Ok(Self {
            iteration,
            generation,
            space,
            solution,
        })
    }

    pub fn estimate(self, source: &GaussianBump) -> Result<EstimatedState, FemError> {
        let mesh_edges = MeshEdges::from_mesh(self.space.mesh())?;
        let (solution, indicators) = self
            .space
            .residual_indicators(self.solution, source, &mesh_edges)?;
        let total_residual = total_residual(&indicators);
        Ok(EstimatedState {
            iteration: self.iteration,
            generation: self.generation,
            space: self.space,
            solution,
            mesh_edges,
            indicators,
            total_residual,
        })
    }
}

/// The solution of the current generation has per-cell indicators.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatedState {
    pub iteration: usize,
    pub generation: usize,
    pub space: PoissonSpace,
    pub solution: DVector<f64>,
    pub mesh_edges: MeshEdges,
    /// One non-negative indicator per cell.
    pub indicators: DVector<f64>,
    pub total_residual: f64,
}

impl EstimatedState {
    pub fn mesh(&self) -> &TriangleMesh2d<f64> {
        self.space.mesh()
    }

    /// Solution values at the vertices of the triangle mesh.
    pub fn vertex_values(&self) -> &[f64] {
        &self.solution.as_slice()[..self.mesh().vertices().len()]
    }

    pub fn has_converged(&self, threshold: f64) -> bool {
        self.total_residual <= threshold
    }

    /// Marks the highest-ranked fraction of cells and collects their edges.
    ///
    /// The solution is dropped, since it is invalid on the refined mesh.
    pub fn mark(self, fraction: f64) -> MarkedState {
        let marked_cells = mark_cells(&self.indicators, fraction);
        let marked_edges = collect_marked_edges(&marked_cells, &self.mesh_edges);
        MarkedState {
            iteration: self.iteration,
            generation: self.generation,
            degree: self.space.degree(),
            mesh: self.space.into_mesh(),
            mesh_edges: self.mesh_edges,
            total_residual: self.total_residual,
            marked_cells,
            marked_edges,
        }
    }
}

/// Cells and edges selected for refinement.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkedState {
    pub iteration: usize,
    pub generation: usize,
    pub degree: ElementDegree,
    pub mesh: TriangleMesh2d<f64>,
    pub mesh_edges: MeshEdges,
    pub total_residual: f64,
    /// Marked cells in rank order.
    pub marked_cells: Vec<usize>,
    /// All edges of the marked cells, with duplicates.
    pub marked_edges: Vec<usize>,
}

impl MarkedState {
    pub fn refine(self) -> Result<RefinedState, FemError> {
        let refined = refine_marked_edges(&self.mesh, &self.marked_edges, &self.mesh_edges)?;
        Ok(RefinedState {
            iteration: self.iteration,
            generation: self.generation + 1,
            degree: self.degree,
            refined,
        })
    }
}

/// A new mesh generation without a solution.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinedState {
    /// The iteration that produced this generation.
    pub iteration: usize,
    pub generation: usize,
    pub degree: ElementDegree,
    pub refined: RefinedMesh<f64>,
}

impl RefinedState {
    /// Solves from scratch on the new mesh, starting the next iteration.
    pub fn solve(self, source: &GaussianBump) -> Result<SolvedState, FemError> {
        SolvedState::solve(self.iteration + 1, self.generation, self.refined.mesh, self.degree, source)
    }
}

/// Summary of one iteration of the loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub num_cells: usize,
    pub num_vertices: usize,
    /// Zero for the final, converged iteration.
    pub num_marked: usize,
    pub total_residual: f64,
}

impl IterationRecord {
    fn new(iteration: usize, mesh: &TriangleMesh2d<f64>, num_marked: usize, total_residual: f64) -> Self {
        Self {
            iteration,
            num_cells: mesh.connectivity().len(),
            num_vertices: mesh.vertices().len(),
            num_marked,
            total_residual,
        }
    }
}

/// The converged state together with the history of all iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveOutcome {
    pub final_state: EstimatedState,
    pub history: Vec<IterationRecord>,
}

impl AdaptiveOutcome {
    pub fn mesh(&self) -> &TriangleMesh2d<f64> {
        self.final_state.mesh()
    }

    pub fn solution(&self) -> &DVector<f64> {
        &self.final_state.solution
    }

    pub fn indicators(&self) -> &DVector<f64> {
        &self.final_state.indicators
    }

    pub fn total_residual(&self) -> f64 {
        self.final_state.total_residual
    }

    /// Number of estimates made, including the converged one.
    pub fn num_iterations(&self) -> usize {
        self.history.len()
    }
}

/// Adaptive solver for `-Δu = f` on a rectangle with `u = 0` on the boundary.
#[derive(Debug, Clone)]
pub struct AdaptivePoissonSolver {
    config: AdaptiveConfig,
}

impl AdaptivePoissonSolver {
    pub fn new(config: AdaptiveConfig) -> Result<Self, FemError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    pub fn initial_mesh(&self) -> TriangleMesh2d<f64> {
        let [nx, ny] = self.config.resolution;
        create_rectangular_uniform_tri_mesh_2d(&self.config.domain, nx, ny)
    }

    /// Runs the loop until the total residual is at or below the threshold.
    ///
    /// `observer` is called with every estimated state, including the converged one, and may
    /// abort the loop by returning an error.
    ///
    /// # Errors
    ///
    /// Returns [`FemError::NonConvergence`] if `max_iterations` estimates are made without
    /// reaching the threshold, and propagates any failure of the individual stages.
    pub fn run<O>(&self, mut observer: O) -> Result<AdaptiveOutcome, FemError>
    where
        O: FnMut(&EstimatedState) -> Result<(), FemError>,
    {
        let config = &self.config;
        let source = &config.source;
        let mut history = Vec::new();
        let mut solved = SolvedState::solve(0, 0, self.initial_mesh(), config.degree, source)?;
        let mut previous_residual: Option<f64> = None;

        loop {
            let estimated = solved.estimate(source)?;
            let residual = estimated.total_residual;
            info!(
                "Iteration {}: {} cells, total residual {:.6e}",
                estimated.iteration,
                estimated.mesh().connectivity().len(),
                residual
            );
            if let Some(previous) = previous_residual {
                if residual > previous {
                    warn!(
                        "Total residual increased from {:.6e} to {:.6e} in iteration {}",
                        previous, residual, estimated.iteration
                    );
                }
            }
            previous_residual = Some(residual);
            observer(&estimated)?;

            if estimated.has_converged(config.threshold) {
                history.push(IterationRecord::new(estimated.iteration, estimated.mesh(), 0, residual));
                info!(
                    "Converged after {} iterations with {} cells (total residual {:.6e} <= {:.6e})",
                    history.len(),
                    estimated.mesh().connectivity().len(),
                    residual,
                    config.threshold
                );
                return Ok(AdaptiveOutcome {
                    final_state: estimated,
                    history,
                });
            }

            let iterations = estimated.iteration + 1;
            if config.max_iterations.is_some_and(|max| iterations >= max) {
                return Err(FemError::NonConvergence { iterations, residual });
            }

            let marked = estimated.mark(config.fraction);
            history.push(IterationRecord::new(
                marked.iteration,
                &marked.mesh,
                marked.marked_cells.len(),
                residual,
            ));
            solved = marked.refine()?.solve(source)?;
        }
    }
}
