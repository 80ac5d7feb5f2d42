use crate::element::{FiniteElement, ReferenceFiniteElement};
use crate::fem_error::FemError;
use crate::quadrature::{
    triangle_strength5, CanonicalStiffnessQuadrature, Quadrature, QuadraturePair2d,
};
use crate::space::{inverse_jacobian, ElementForSpace, FiniteElementSpace};
use crate::Real;
use nalgebra::{DMatrixViewMut, DVectorViewMut, Matrix2, Matrix2xX, Point2};
use std::cell::RefCell;

/// Describes which global degrees of freedom each element couples.
pub trait ElementConnectivityAssembler {
    fn num_elements(&self) -> usize;

    /// Total number of degrees of freedom in the global system.
    fn num_dofs(&self) -> usize;

    fn element_dof_count(&self, element_index: usize) -> usize;

    fn populate_element_dofs(&self, output: &mut [usize], element_index: usize);
}

pub trait ElementMatrixAssembler<T: Real>: ElementConnectivityAssembler {
    /// Adds the element matrix to `output`, whose rows and columns follow the order of
    /// [`populate_element_dofs`](ElementConnectivityAssembler::populate_element_dofs).
    fn assemble_element_matrix_into(&self, element_index: usize, output: DMatrixViewMut<T>) -> Result<(), FemError>;

    fn as_connectivity_assembler(&self) -> &dyn ElementConnectivityAssembler;
}

pub trait ElementVectorAssembler<T: Real>: ElementConnectivityAssembler {
    fn assemble_element_vector_into(&self, element_index: usize, output: DVectorViewMut<T>) -> Result<(), FemError>;
}

/// The element, the absolute Jacobian determinant and the inverse Jacobian.
fn element_geometry<T, S>(space: &S, element_index: usize) -> Result<(ElementForSpace<T, S>, T, Matrix2<T>), FemError>
where
    T: Real,
    S: FiniteElementSpace<T>,
{
    let element = space
        .element(element_index)
        .ok_or_else(|| FemError::Assembly(format!("element {element_index} is out of bounds")))?;
    let j_inv = inverse_jacobian(&element, element_index)?;
    let abs_det_j = element.reference_jacobian(&Point2::origin()).determinant().abs();
    Ok((element, abs_det_j, j_inv))
}

#[derive(Debug, Clone)]
struct GradientWorkspace<T: Real> {
    reference_gradients: Matrix2xX<T>,
    basis_values: Vec<T>,
}

impl<T: Real> Default for GradientWorkspace<T> {
    fn default() -> Self {
        Self {
            reference_gradients: Matrix2xX::zeros(0),
            basis_values: Vec::new(),
        }
    }
}

impl<T: Real> GradientWorkspace<T> {
    fn resize(&mut self, num_nodes: usize) {
        if self.reference_gradients.ncols() != num_nodes {
            self.reference_gradients = Matrix2xX::zeros(num_nodes);
        }
        self.basis_values.resize(num_nodes, T::zero());
    }
}

/// Assembles the stiffness matrix `A_ij = ∫ ∇φ_i · ∇φ_j dx` of a scalar space.
#[derive(Debug)]
pub struct ElementLaplaceAssembler<'a, T: Real, Space> {
    space: &'a Space,
    quadrature: QuadraturePair2d<T>,
    workspace: RefCell<GradientWorkspace<T>>,
}

impl<'a, T, Space> ElementLaplaceAssembler<'a, T, Space>
where
    T: Real,
    Space: FiniteElementSpace<T>,
{
    pub fn new(space: &'a Space, quadrature: QuadraturePair2d<T>) -> Self {
        Self {
            space,
            quadrature,
            workspace: RefCell::default(),
        }
    }

    /// Uses the quadrature that integrates the stiffness terms of the space's element exactly.
    pub fn with_canonical_quadrature(space: &'a Space) -> Self
    where
        ElementForSpace<T, Space>: CanonicalStiffnessQuadrature<T>,
    {
        Self::new(space, ElementForSpace::<T, Space>::canonical_stiffness_quadrature())
    }
}

impl<'a, T, Space> ElementConnectivityAssembler for ElementLaplaceAssembler<'a, T, Space>
where
    T: Real,
    Space: FiniteElementSpace<T>,
{
    fn num_elements(&self) -> usize {
        self.space.num_elements()
    }

    fn num_dofs(&self) -> usize {
        self.space.num_nodes()
    }

    fn element_dof_count(&self, element_index: usize) -> usize {
        self.space.element_node_count(element_index)
    }

    fn populate_element_dofs(&self, output: &mut [usize], element_index: usize) {
        self.space.populate_element_nodes(output, element_index)
    }
}

impl<'a, T, Space> ElementMatrixAssembler<T> for ElementLaplaceAssembler<'a, T, Space>
where
    T: Real,
    Space: FiniteElementSpace<T>,
{
    fn assemble_element_matrix_into(&self, element_index: usize, mut output: DMatrixViewMut<T>) -> Result<(), FemError> {
        let (element, abs_det_j, j_inv) = element_geometry(self.space, element_index)?;
        let j_inv_t = j_inv.transpose();
        let ws = &mut *self.workspace.borrow_mut();
        ws.resize(element.num_nodes());

        for (&w, xi) in self.quadrature.weights().iter().zip(self.quadrature.points()) {
            element.populate_basis_gradients(&mut ws.reference_gradients, xi);
            let g = j_inv_t * &ws.reference_gradients;
            output.gemm_tr(w * abs_det_j, &g, &g, T::one());
        }
        Ok(())
    }

    fn as_connectivity_assembler(&self) -> &dyn ElementConnectivityAssembler {
        self
    }
}

/// Assembles the load vector `b_i = ∫ f φ_i dx` for a closed-form source term `f`.
pub struct ElementSourceAssembler<'a, T: Real, Space, F> {
    space: &'a Space,
    source: F,
    quadrature: QuadraturePair2d<T>,
    workspace: RefCell<GradientWorkspace<T>>,
}

impl<'a, T, Space, F> ElementSourceAssembler<'a, T, Space, F>
where
    T: Real,
    Space: FiniteElementSpace<T>,
    F: Fn(&Point2<T>) -> T,
{
    /// Integrates with the strength-5 triangle rule.
    pub fn new(space: &'a Space, source: F) -> Self {
        Self::with_quadrature(space, source, triangle_strength5())
    }

    pub fn with_quadrature(space: &'a Space, source: F, quadrature: QuadraturePair2d<T>) -> Self {
        Self {
            space,
            source,
            quadrature,
            workspace: RefCell::default(),
        }
    }
}

impl<'a, T, Space, F> ElementConnectivityAssembler for ElementSourceAssembler<'a, T, Space, F>
where
    T: Real,
    Space: FiniteElementSpace<T>,
{
    fn num_elements(&self) -> usize {
        self.space.num_elements()
    }

    fn num_dofs(&self) -> usize {
        self.space.num_nodes()
    }

    fn element_dof_count(&self, element_index: usize) -> usize {
        self.space.element_node_count(element_index)
    }

    fn populate_element_dofs(&self, output: &mut [usize], element_index: usize) {
        self.space.populate_element_nodes(output, element_index)
    }
}

impl<'a, T, Space, F> ElementVectorAssembler<T> for ElementSourceAssembler<'a, T, Space, F>
where
    T: Real,
    Space: FiniteElementSpace<T>,
    F: Fn(&Point2<T>) -> T,
{
    fn assemble_element_vector_into(&self, element_index: usize, mut output: DVectorViewMut<T>) -> Result<(), FemError> {
        let (element, abs_det_j, _) = element_geometry(self.space, element_index)?;
        let ws = &mut *self.workspace.borrow_mut();
        ws.resize(element.num_nodes());

        for (&w, xi) in self.quadrature.weights().iter().zip(self.quadrature.points()) {
            let x = element.map_reference_coords(xi);
            let f = (self.source)(&x);
            if !f.is_finite() {
                return Err(FemError::Assembly(format!(
                    "source term is not finite at {x:?} in element {element_index}"
                )));
            }
            element.populate_basis(&mut ws.basis_values, xi);
            for (out, &phi) in output.iter_mut().zip(&ws.basis_values) {
                *out += w * abs_det_j * f * phi;
            }
        }
        Ok(())
    }
}
