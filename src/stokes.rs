//! Taylor-Hood discretization of the Stokes equations.
//!
//! The velocity is quadratic (P2) and the pressure linear (P1) on the same triangles. The
//! global unknowns are laid out as `[u_x0, u_y0, u_x1, u_y1, …, p_0, p_1, …]`: the two velocity
//! components are interleaved per P2 node and followed by one pressure value per vertex.
use crate::assembly::global::{apply_dirichlet_bc, CsrAssembler};
use crate::assembly::local::{ElementConnectivityAssembler, ElementMatrixAssembler};
use crate::config::{RectangleDomain, StokesConfig, StokesFlow};
use crate::connectivity::Connectivity;
use crate::element::{ElementConnectivity, FiniteElement, ReferenceFiniteElement, Tri3d2Element};
use crate::fem_error::FemError;
use crate::mesh::procedural::create_rectangular_uniform_tri_mesh_2d;
use crate::mesh::Tri6Mesh2d;
use crate::quadrature::{triangle_strength2, Quadrature, QuadraturePair2d};
use crate::solve::solve_lu;
use crate::space::{inverse_jacobian, locate_boundary_dofs, FiniteElementSpace};
use crate::Real;
use log::{debug, info};
use nalgebra::{DMatrix, DMatrixViewMut, DVector, Matrix2xX, Point2, Vector2};
use std::cell::RefCell;
use std::collections::BTreeSet;

/// Velocity and pressure unknowns of one element.
const ELEMENT_DOFS: usize = 15;
const PRESSURE_OFFSET: usize = 12;

#[derive(Debug, Clone)]
struct StokesWorkspace<T: Real> {
    reference_gradients: Matrix2xX<T>,
    pressure_basis: Vec<T>,
}

impl<T: Real> Default for StokesWorkspace<T> {
    fn default() -> Self {
        Self {
            reference_gradients: Matrix2xX::zeros(6),
            pressure_basis: vec![T::zero(); 3],
        }
    }
}

/// Assembles the symmetric saddle-point matrix
///
/// ```text
/// [ A  Bᵀ ]    A = ∫ ∇u : ∇v dx,
/// [ B  0  ]    B = -∫ q div u dx,
/// ```
///
/// with unit viscosity.
#[derive(Debug)]
pub struct StokesElementAssembler<'a, T: Real> {
    space: &'a Tri6Mesh2d<T>,
    num_vertices: usize,
    quadrature: QuadraturePair2d<T>,
    pressure_element: Tri3d2Element<T>,
    workspace: RefCell<StokesWorkspace<T>>,
}

impl<'a, T: Real> StokesElementAssembler<'a, T> {
    /// `num_vertices` is the number of vertex nodes of `space`, which must be numbered before
    /// all edge nodes.
    pub fn new(space: &'a Tri6Mesh2d<T>, num_vertices: usize) -> Self {
        Self {
            space,
            num_vertices,
            // Exact for the P2 stiffness and the P2 × P1 coupling on affine elements
            quadrature: triangle_strength2(),
            pressure_element: Tri3d2Element::reference(),
            workspace: RefCell::default(),
        }
    }

    pub fn num_velocity_dofs(&self) -> usize {
        2 * self.space.vertices().len()
    }

    /// The global index of the pressure at the given vertex.
    pub fn pressure_dof(&self, vertex: usize) -> usize {
        self.num_velocity_dofs() + vertex
    }

    /// Visits every quadrature point of an element with the weight (including the Jacobian
    /// determinant), the physical velocity basis gradients and the pressure basis values.
    fn for_each_quadrature_point(
        &self,
        element_index: usize,
        mut f: impl FnMut(T, &Matrix2xX<T>, &[T]),
    ) -> Result<(), FemError> {
        let element = self
            .space
            .get_connectivity(element_index)
            .and_then(|conn| conn.element(self.space.vertices()))
            .ok_or_else(|| FemError::Assembly(format!("element {element_index} is out of bounds")))?;
        let j_inv_t = inverse_jacobian(&element, element_index)?.transpose();
        let abs_det_j = element.reference_jacobian(&Point2::origin()).determinant().abs();

        let ws = &mut *self.workspace.borrow_mut();
        for (&w, xi) in self.quadrature.weights().iter().zip(self.quadrature.points()) {
            element.populate_basis_gradients(&mut ws.reference_gradients, xi);
            self.pressure_element.populate_basis(&mut ws.pressure_basis, xi);
            let gradients = j_inv_t * &ws.reference_gradients;
            f(w * abs_det_j, &gradients, &ws.pressure_basis);
        }
        Ok(())
    }

    /// `∫ q_i div u_h dx` for every vertex pressure basis function `q_i`.
    ///
    /// Zero (up to round-off) for a discretely divergence-free velocity.
    pub fn divergence_moments(&self, velocity: &[Vector2<T>]) -> Result<DVector<T>, FemError> {
        if velocity.len() != self.space.vertices().len() {
            return Err(FemError::Assembly(format!(
                "expected {} nodal velocities, got {}",
                self.space.vertices().len(),
                velocity.len()
            )));
        }
        let mut moments = DVector::zeros(self.num_vertices);
        for (element_index, conn) in self.space.connectivity().iter().enumerate() {
            self.for_each_quadrature_point(element_index, |weight, gradients, psi| {
                let divergence = conn
                    .iter()
                    .enumerate()
                    .fold(T::zero(), |acc, (a, &node)| acc + gradients.column(a).dot(&velocity[node]));
                for (b, &vertex) in conn[..3].iter().enumerate() {
                    moments[vertex] += weight * psi[b] * divergence;
                }
            })?;
        }
        Ok(moments)
    }
}

impl<'a, T: Real> ElementConnectivityAssembler for StokesElementAssembler<'a, T> {
    fn num_elements(&self) -> usize {
        self.space.connectivity().len()
    }

    fn num_dofs(&self) -> usize {
        self.num_velocity_dofs() + self.num_vertices
    }

    fn element_dof_count(&self, _element_index: usize) -> usize {
        ELEMENT_DOFS
    }

    fn populate_element_dofs(&self, output: &mut [usize], element_index: usize) {
        assert_eq!(output.len(), ELEMENT_DOFS, "Incompatible slice length for dof population");
        let conn = &self.space.connectivity()[element_index];
        for (a, &node) in conn.iter().enumerate() {
            output[2 * a] = 2 * node;
            output[2 * a + 1] = 2 * node + 1;
        }
        for (b, &vertex) in conn[..3].iter().enumerate() {
            output[PRESSURE_OFFSET + b] = self.pressure_dof(vertex);
        }
    }
}

impl<'a, T: Real> ElementMatrixAssembler<T> for StokesElementAssembler<'a, T> {
    fn assemble_element_matrix_into(&self, element_index: usize, mut output: DMatrixViewMut<T>) -> Result<(), FemError> {
        self.for_each_quadrature_point(element_index, |weight, gradients, psi| {
            for a in 0..6 {
                for b in 0..6 {
                    let stiffness = weight * gradients.column(a).dot(&gradients.column(b));
                    output[(2 * a, 2 * b)] += stiffness;
                    output[(2 * a + 1, 2 * b + 1)] += stiffness;
                }
                for c in 0..2 {
                    for (b, &psi_b) in psi.iter().enumerate() {
                        let coupling = -weight * psi_b * gradients[(c, a)];
                        output[(2 * a + c, PRESSURE_OFFSET + b)] += coupling;
                        output[(PRESSURE_OFFSET + b, 2 * a + c)] += coupling;
                    }
                }
            }
        })
    }

    fn as_connectivity_assembler(&self) -> &dyn ElementConnectivityAssembler {
        self
    }
}

/// Velocity on the P2 nodes and pressure on the vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct StokesSolution<T: Real> {
    pub space: Tri6Mesh2d<T>,
    pub num_vertices: usize,
    pub velocity: Vec<Vector2<T>>,
    pub pressure: DVector<T>,
}

impl<T: Real> StokesSolution<T> {
    /// Velocities of the vertex nodes, matching the pressure ordering.
    pub fn vertex_velocities(&self) -> &[Vector2<T>] {
        &self.velocity[..self.num_vertices]
    }

    pub fn max_speed(&self) -> T {
        self.velocity
            .iter()
            .map(|u| u.norm())
            .fold(T::zero(), |max, speed| max.max(speed))
    }

    pub fn divergence_moments(&self) -> Result<DVector<T>, FemError> {
        StokesElementAssembler::new(&self.space, self.num_vertices).divergence_moments(&self.velocity)
    }

    /// `∫ u_x dy` along the mesh edges that lie on the vertical line through `x`.
    ///
    /// The line must be covered by mesh edges, as is the case for the grid lines of a
    /// structured mesh. Simpson's rule integrates the quadratic velocity exactly.
    pub fn flux_through_vertical_line(&self, x: T) -> T {
        let tolerance = T::from_f64(1e-10).expect("Literal must fit in T") * (T::one() + x.abs());
        let on_line = |node: usize| (self.space.vertices()[node].x - x).abs() <= tolerance;
        let six = T::from_f64(6.0).expect("Literal must fit in T");
        let four = T::from_f64(4.0).expect("Literal must fit in T");

        let mut visited = BTreeSet::new();
        let mut flux = T::zero();
        for conn in self.space.connectivity() {
            for k in 0..conn.num_faces() {
                let face = conn.get_face_connectivity(k).expect("Triangles have three faces");
                let [start, mid, end] = face.0;
                if !(on_line(start) && on_line(end)) || !visited.insert((start.min(end), start.max(end))) {
                    continue;
                }
                let length = (self.space.vertices()[end].y - self.space.vertices()[start].y).abs();
                let u = |node: usize| self.velocity[node].x;
                flux += length / six * (u(start) + four * u(mid) + u(end));
            }
        }
        flux
    }
}

/// Prescribed nodal velocities: the constrained velocity dofs and their values.
fn velocity_boundary_conditions(
    space: &Tri6Mesh2d<f64>,
    domain: &RectangleDomain<f64>,
    flow: &StokesFlow,
) -> (Vec<usize>, Vec<f64>) {
    let mut dofs = Vec::new();
    let mut values = Vec::new();
    for node in locate_boundary_dofs(space) {
        let x = &space.vertices()[node];
        let velocity = match *flow {
            StokesFlow::LidDrivenCavity { lid_velocity } => {
                if domain.is_on_top_side(x) {
                    Vector2::new(lid_velocity, 0.0)
                } else {
                    Vector2::zeros()
                }
            }
            StokesFlow::Channel { inflow_peak } => {
                if domain.is_on_left_side(x) {
                    let (y0, y1) = (domain.lower_left.y, domain.upper_right.y);
                    let height = domain.height();
                    Vector2::new(4.0 * inflow_peak * (x.y - y0) * (y1 - x.y) / (height * height), 0.0)
                } else if domain.is_on_top_side(x) || domain.is_on_bottom_side(x) {
                    Vector2::zeros()
                } else {
                    // Natural outflow
                    continue;
                }
            }
        };
        dofs.extend([2 * node, 2 * node + 1]);
        values.extend([velocity.x, velocity.y]);
    }
    (dofs, values)
}

/// Solves the Stokes problem described by the configuration on a structured mesh.
///
/// The saddle-point system is factorized as a dense matrix with
/// `2 (2nx + 1)(2ny + 1) + (nx + 1)(ny + 1)` rows, so memory grows quadratically and time
/// cubically with the number of unknowns. The default 16×16 cavity has 2467 unknowns, and
/// resolutions much beyond 32×32 are impractical.
pub fn solve_stokes(config: &StokesConfig) -> Result<StokesSolution<f64>, FemError> {
    config.validate()?;
    let [nx, ny] = config.resolution;
    let mesh = create_rectangular_uniform_tri_mesh_2d(&config.domain, nx, ny);
    let num_vertices = mesh.vertices().len();
    let space = Tri6Mesh2d::from(&mesh);

    let assembler = StokesElementAssembler::new(&space, num_vertices);
    let mut matrix = CsrAssembler::default().assemble(&assembler)?;
    let mut rhs = DVector::zeros(assembler.num_dofs());

    let (mut dofs, mut values) = velocity_boundary_conditions(&space, &config.domain, &config.flow);
    if matches!(config.flow, StokesFlow::LidDrivenCavity { .. }) {
        // With velocity prescribed on the whole boundary, the pressure is only determined up
        // to a constant
        let corner = mesh
            .vertices()
            .iter()
            .position(|x| config.domain.is_on_left_side(x) && config.domain.is_on_bottom_side(x))
            .unwrap_or(0);
        dofs.push(assembler.pressure_dof(corner));
        values.push(0.0);
    }
    debug!(
        "Assembled Stokes system: {} dofs, {} nonzeros, {} constrained dofs",
        matrix.nrows(),
        matrix.nnz(),
        dofs.len()
    );

    apply_dirichlet_bc(&mut matrix, &mut rhs, &dofs, &values)?;
    let solution = solve_lu(DMatrix::from(&matrix), &rhs)?;

    let num_velocity_dofs = assembler.num_velocity_dofs();
    let velocity = solution.as_slice()[..num_velocity_dofs]
        .chunks_exact(2)
        .map(|u| Vector2::new(u[0], u[1]))
        .collect();
    let pressure = solution.rows(num_velocity_dofs, num_vertices).into_owned();

    let solution = StokesSolution {
        space,
        num_vertices,
        velocity,
        pressure,
    };
    info!(
        "Solved Stokes flow {:?}: {} velocity nodes, {} pressure nodes, max speed {:.6}",
        config.flow,
        solution.velocity.len(),
        num_vertices,
        solution.max_speed()
    );
    Ok(solution)
}
