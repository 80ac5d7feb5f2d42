//! The Poisson problem `-Δu = f` with homogeneous Dirichlet conditions.
use crate::assembly::global::{
    apply_homogeneous_dirichlet_bc_csr, apply_homogeneous_dirichlet_bc_rhs, CsrAssembler, VectorAssembler,
};
use crate::assembly::local::{ElementLaplaceAssembler, ElementSourceAssembler};
use crate::connectivity::Connectivity;
use crate::element::{ElementConnectivity, ElementForConnectivity};
use crate::fem_error::FemError;
use crate::geometry::LineSegment2d;
use crate::mesh::Mesh2d;
use crate::quadrature::CanonicalStiffnessQuadrature;
use crate::solve::solve_spd;
use crate::space::{locate_boundary_dofs, DiscreteFunction};
use crate::Real;
use log::debug;
use nalgebra::{Point2, Scalar};
use std::collections::BTreeSet;
use std::fmt;

/// Selects the boundary facets that carry the condition `u = 0`.
pub enum BoundarySelection<T: Scalar> {
    /// Every boundary facet.
    AllBoundary,
    /// Boundary facets whose midpoint satisfies the predicate.
    Predicate(Box<dyn Fn(&Point2<T>) -> bool>),
}

impl<T: Scalar> fmt::Debug for BoundarySelection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllBoundary => write!(f, "AllBoundary"),
            Self::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

impl<T: Scalar> Default for BoundarySelection<T> {
    fn default() -> Self {
        Self::AllBoundary
    }
}

impl<T: Real> BoundarySelection<T> {
    /// Sorted nodes of the selected boundary facets, including facet midpoint nodes.
    pub fn locate_dofs<C: Connectivity>(&self, space: &Mesh2d<T, C>) -> Vec<usize> {
        match self {
            Self::AllBoundary => locate_boundary_dofs(space),
            Self::Predicate(predicate) => {
                let mut dofs = BTreeSet::new();
                for (face, _, _) in space.find_boundary_faces() {
                    let nodes = face.vertex_indices();
                    let (Some(&first), Some(&last)) = (nodes.first(), nodes.last()) else {
                        continue;
                    };
                    let vertices = space.vertices();
                    let midpoint = LineSegment2d::new(vertices[first], vertices[last]).midpoint();
                    if predicate(&midpoint) {
                        dofs.extend(nodes.iter().copied());
                    }
                }
                dofs.into_iter().collect()
            }
        }
    }
}

/// `-Δu = source` with `u = 0` on the selected part of the boundary.
pub struct PoissonProblem<T: Scalar, F> {
    pub source: F,
    pub dirichlet: BoundarySelection<T>,
}

impl<T, F> PoissonProblem<T, F>
where
    T: Real,
    F: Fn(&Point2<T>) -> T,
{
    /// Homogeneous conditions on the whole boundary.
    pub fn new(source: F) -> Self {
        Self {
            source,
            dirichlet: BoundarySelection::AllBoundary,
        }
    }

    pub fn with_dirichlet_boundary(self, dirichlet: BoundarySelection<T>) -> Self {
        Self { dirichlet, ..self }
    }
}

/// Assembles and solves the Poisson problem on the given Lagrange space.
///
/// The load vector is integrated with the strength-5 rule, the stiffness matrix with the
/// element's canonical stiffness rule. The returned field is exactly zero at every
/// Dirichlet node.
pub fn solve_poisson<'a, T, C, F>(
    space: &'a Mesh2d<T, C>,
    problem: &PoissonProblem<T, F>,
) -> Result<DiscreteFunction<'a, T, Mesh2d<T, C>>, FemError>
where
    T: Real,
    C: ElementConnectivity<T>,
    ElementForConnectivity<T, C>: CanonicalStiffnessQuadrature<T>,
    F: Fn(&Point2<T>) -> T,
{
    let dirichlet_dofs = problem.dirichlet.locate_dofs(space);

    let stiffness_assembler = ElementLaplaceAssembler::with_canonical_quadrature(space);
    let mut matrix = CsrAssembler::default().assemble(&stiffness_assembler)?;
    let source_assembler = ElementSourceAssembler::new(space, &problem.source);
    let mut rhs = VectorAssembler::default().assemble_vector(&source_assembler)?;
    debug!(
        "Assembled Poisson system: {} dofs, {} nonzeros, {} Dirichlet dofs",
        matrix.nrows(),
        matrix.nnz(),
        dirichlet_dofs.len()
    );

    apply_homogeneous_dirichlet_bc_csr(&mut matrix, &dirichlet_dofs);
    apply_homogeneous_dirichlet_bc_rhs(&mut rhs, &dirichlet_dofs);

    let mut solution = solve_spd(&matrix, &rhs)?;
    // The solve reproduces the zeros only up to round-off
    apply_homogeneous_dirichlet_bc_rhs(&mut solution, &dirichlet_dofs);
    DiscreteFunction::new(space, solution)
}
