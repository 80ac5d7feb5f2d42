//! Lagrange finite element spaces over triangle meshes.
//!
//! A space is a mesh whose connectivity describes an element: a [`TriangleMesh2d`] is the P1
//! space over itself, and its [`Tri6Mesh2d`] conversion is the P2 space. Nodes and degrees of
//! freedom coincide for scalar fields.
//!
//! [`TriangleMesh2d`]: crate::mesh::TriangleMesh2d
//! [`Tri6Mesh2d`]: crate::mesh::Tri6Mesh2d
use crate::connectivity::Connectivity;
use crate::element::{
    map_basis_hessian, ElementConnectivity, ElementForConnectivity, FiniteElement, ReferenceFiniteElement,
};
use crate::fem_error::FemError;
use crate::mesh::Mesh2d;
use crate::Real;
use nalgebra::{DVector, Matrix2, Matrix2xX, Point2, Vector2};

/// Index-level description of the elements of a space.
pub trait FiniteElementConnectivity {
    fn num_elements(&self) -> usize;

    fn num_nodes(&self) -> usize;

    fn element_node_count(&self, element_index: usize) -> usize;

    /// Panics if `nodes.len()` differs from the element's node count.
    fn populate_element_nodes(&self, nodes: &mut [usize], element_index: usize);
}

pub trait FiniteElementSpace<T: Real>: FiniteElementConnectivity {
    type Connectivity: ElementConnectivity<T>;

    /// Coordinates of every node, indexed by node.
    fn node_coordinates(&self) -> &[Point2<T>];

    fn get_connectivity(&self, index: usize) -> Option<&Self::Connectivity>;

    /// Returns the element with the given index, or `None` if the index is out of bounds.
    fn element(&self, index: usize) -> Option<ElementForSpace<T, Self>> {
        self.get_connectivity(index)
            .and_then(|conn| conn.element(self.node_coordinates()))
    }
}

pub type ElementForSpace<T, Space> =
    ElementForConnectivity<T, <Space as FiniteElementSpace<T>>::Connectivity>;

impl<T, C> FiniteElementConnectivity for Mesh2d<T, C>
where
    T: Real,
    C: Connectivity,
{
    fn num_elements(&self) -> usize {
        self.connectivity().len()
    }

    fn num_nodes(&self) -> usize {
        self.vertices().len()
    }

    fn element_node_count(&self, element_index: usize) -> usize {
        self.connectivity()
            .get(element_index)
            .expect("Element index out of bounds")
            .vertex_indices()
            .len()
    }

    fn populate_element_nodes(&self, nodes: &mut [usize], element_index: usize) {
        let indices = self
            .connectivity()
            .get(element_index)
            .expect("Element index out of bounds")
            .vertex_indices();
        assert_eq!(indices.len(), nodes.len(), "Incompatible slice length for node population");
        nodes.copy_from_slice(indices);
    }
}

impl<T, C> FiniteElementSpace<T> for Mesh2d<T, C>
where
    T: Real,
    C: ElementConnectivity<T>,
{
    type Connectivity = C;

    fn node_coordinates(&self) -> &[Point2<T>] {
        self.vertices()
    }

    fn get_connectivity(&self, index: usize) -> Option<&Self::Connectivity> {
        self.connectivity().get(index)
    }
}

/// Sorted indices of the nodes whose coordinates satisfy the predicate.
pub fn locate_dofs_geometrical<T, S>(space: &S, predicate: impl Fn(&Point2<T>) -> bool) -> Vec<usize>
where
    T: Real,
    S: FiniteElementSpace<T>,
{
    space
        .node_coordinates()
        .iter()
        .enumerate()
        .filter(|(_, x)| predicate(x))
        .map(|(i, _)| i)
        .collect()
}

/// Sorted indices of the nodes that lie on boundary facets, including facet midpoint nodes.
pub fn locate_boundary_dofs<T, C>(space: &Mesh2d<T, C>) -> Vec<usize>
where
    T: Real,
    C: Connectivity,
{
    space.find_boundary_vertices()
}

/// The inverse of the reference Jacobian of an affine element.
pub(crate) fn inverse_jacobian<T, E>(element: &E, element_index: usize) -> Result<Matrix2<T>, FemError>
where
    T: Real,
    E: FiniteElement<T>,
{
    element
        .reference_jacobian(&Point2::origin())
        .try_inverse()
        .ok_or_else(|| FemError::Assembly(format!("element {element_index} is degenerate")))
}

/// A scalar field in a finite element space: the space together with one coefficient per node.
#[derive(Debug, Clone)]
pub struct DiscreteFunction<'a, T: Real, S> {
    space: &'a S,
    coefficients: DVector<T>,
}

impl<'a, T, S> DiscreteFunction<'a, T, S>
where
    T: Real,
    S: FiniteElementSpace<T>,
{
    pub fn new(space: &'a S, coefficients: DVector<T>) -> Result<Self, FemError> {
        if coefficients.len() != space.num_nodes() {
            return Err(FemError::Assembly(format!(
                "expected {} coefficients, got {}",
                space.num_nodes(),
                coefficients.len()
            )));
        }
        Ok(Self { space, coefficients })
    }

    pub fn zeros(space: &'a S) -> Self {
        Self {
            space,
            coefficients: DVector::zeros(space.num_nodes()),
        }
    }

    /// Nodal interpolation of `f`.
    pub fn interpolate(space: &'a S, f: impl Fn(&Point2<T>) -> T) -> Self {
        let coefficients = DVector::from_iterator(space.num_nodes(), space.node_coordinates().iter().map(f));
        Self { space, coefficients }
    }

    pub fn space(&self) -> &'a S {
        self.space
    }

    pub fn coefficients(&self) -> &DVector<T> {
        &self.coefficients
    }

    pub fn coefficients_mut(&mut self) -> &mut DVector<T> {
        &mut self.coefficients
    }

    pub fn into_coefficients(self) -> DVector<T> {
        self.coefficients
    }

    fn element_and_coefficients(&self, element_index: usize) -> (ElementForSpace<T, S>, DVector<T>) {
        let element = self
            .space
            .element(element_index)
            .expect("Element index out of bounds");
        let mut nodes = vec![0; self.space.element_node_count(element_index)];
        self.space.populate_element_nodes(&mut nodes, element_index);
        let u_local = DVector::from_iterator(nodes.len(), nodes.iter().map(|&i| self.coefficients[i]));
        (element, u_local)
    }

    /// Value at the reference coordinates `xi` of the given element.
    pub fn evaluate_in_element(&self, element_index: usize, xi: &Point2<T>) -> T {
        let (element, u_local) = self.element_and_coefficients(element_index);
        let mut phi = vec![T::zero(); element.num_nodes()];
        element.populate_basis(&mut phi, xi);
        phi.iter().zip(u_local.iter()).fold(T::zero(), |acc, (&p, &u)| acc + p * u)
    }

    /// Physical gradient at the reference coordinates `xi` of the given element.
    pub fn gradient_in_element(&self, element_index: usize, xi: &Point2<T>) -> Result<Vector2<T>, FemError> {
        let (element, u_local) = self.element_and_coefficients(element_index);
        let j_inv = inverse_jacobian(&element, element_index)?;
        let mut gradients = Matrix2xX::zeros(element.num_nodes());
        element.populate_basis_gradients(&mut gradients, xi);
        Ok(j_inv.transpose() * (gradients * u_local))
    }

    /// Physical Laplacian at the reference coordinates `xi` of the given element.
    ///
    /// Zero for piecewise linear fields.
    pub fn laplacian_in_element(&self, element_index: usize, xi: &Point2<T>) -> Result<T, FemError> {
        let (element, u_local) = self.element_and_coefficients(element_index);
        let j_inv = inverse_jacobian(&element, element_index)?;
        let mut hessians = vec![Matrix2::zeros(); element.num_nodes()];
        element.populate_basis_hessians(&mut hessians, xi);
        let hessian = hessians
            .iter()
            .zip(u_local.iter())
            .fold(Matrix2::zeros(), |acc, (h, &u)| acc + map_basis_hessian(&j_inv, h) * u);
        Ok(hessian.trace())
    }
}
