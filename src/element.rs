use crate::connectivity::{Connectivity, Tri3d2Connectivity, Tri6d2Connectivity};
use crate::geometry::{LineSegment2d, Triangle2d};
use crate::Real;
use itertools::Itertools;
use nalgebra::allocator::Allocator;
use nalgebra::{
    distance, DefaultAllocator, DimName, Matrix1x3, Matrix1x6, Matrix2, Matrix2x3, Matrix2x6, Matrix2xX, OMatrix,
    Point2, Scalar, Vector2, U1, U2, U3, U6,
};
use numeric_literals::replace_float_literals;
use std::fmt::Debug;

pub trait ReferenceFiniteElement<T: Scalar> {
    /// Returns the number of nodes in the element.
    fn num_nodes(&self) -> usize;

    /// Evaluates each basis function at the given reference coordinates.
    ///
    /// Panics if `basis_values.len() != self.num_nodes()`.
    fn populate_basis(&self, basis_values: &mut [T], reference_coords: &Point2<T>);

    /// Populates a `2 x n` matrix whose columns are the reference gradients of each basis
    /// function.
    fn populate_basis_gradients(&self, basis_gradients: &mut Matrix2xX<T>, reference_coords: &Point2<T>);

    /// Populates the reference Hessian of each basis function.
    fn populate_basis_hessians(&self, basis_hessians: &mut [Matrix2<T>], reference_coords: &Point2<T>);
}

/// Reference finite elements with a number of nodes fixed at compile-time.
pub trait FixedNodesReferenceFiniteElement<T>
where
    T: Scalar,
    DefaultAllocator: Allocator<T, U1, Self::NodalDim> + Allocator<T, U2, Self::NodalDim>,
{
    type NodalDim: DimName;

    /// Evaluates each basis function at the given reference coordinates. The result is given
    /// in a row vector where each entry is the value of the corresponding basis function.
    fn evaluate_basis(&self, reference_coords: &Point2<T>) -> OMatrix<T, U1, Self::NodalDim>;

    /// Constructs a matrix whose columns are the gradients of each shape function.
    fn gradients(&self, reference_coords: &Point2<T>) -> OMatrix<T, U2, Self::NodalDim>;

    /// The reference Hessian of the basis function associated with the given node.
    fn hessian(&self, node: usize, reference_coords: &Point2<T>) -> Matrix2<T>;
}

macro_rules! impl_reference_finite_element_for_fixed {
    ($element:ty) => {
        impl<T: Real> ReferenceFiniteElement<T> for $element {
            fn num_nodes(&self) -> usize {
                <$element as FixedNodesReferenceFiniteElement<T>>::NodalDim::dim()
            }

            fn populate_basis(&self, result: &mut [T], reference_coords: &Point2<T>) {
                let basis_values = self.evaluate_basis(reference_coords);
                result.clone_from_slice(basis_values.as_slice());
            }

            fn populate_basis_gradients(&self, result: &mut Matrix2xX<T>, reference_coords: &Point2<T>) {
                let gradients = self.gradients(reference_coords);
                result.copy_from(&gradients);
            }

            fn populate_basis_hessians(&self, result: &mut [Matrix2<T>], reference_coords: &Point2<T>) {
                assert_eq!(result.len(), self.num_nodes());
                for (node, hessian) in result.iter_mut().enumerate() {
                    *hessian = self.hessian(node, reference_coords);
                }
            }
        }
    };
}

/// A finite element with an affine map from the reference triangle.
pub trait FiniteElement<T: Real>: ReferenceFiniteElement<T> {
    /// Compute the Jacobian of the transformation from the reference element to the given
    /// element at the given reference coordinates.
    fn reference_jacobian(&self, reference_coords: &Point2<T>) -> Matrix2<T>;

    /// Maps reference coordinates to physical coordinates in the element.
    fn map_reference_coords(&self, reference_coords: &Point2<T>) -> Point2<T>;

    /// The largest distance between any two points in the element.
    fn diameter(&self) -> T;

    /// Maps physical coordinates back to reference coordinates.
    ///
    /// Returns `None` if the element is degenerate. The map is affine, so the result is exact.
    fn map_physical_coords(&self, x: &Point2<T>) -> Option<Point2<T>> {
        let origin = Point2::origin();
        let j_inv = self.reference_jacobian(&origin).try_inverse()?;
        let x0 = self.map_reference_coords(&origin);
        Some(Point2::from(j_inv * (x - x0)))
    }
}

pub trait ElementConnectivity<T: Real>: Debug + Connectivity {
    type Element: FiniteElement<T>;

    /// Returns the finite element associated with this connectivity.
    ///
    /// The vertices passed in should be the collection of *all* vertices in the mesh.
    fn element(&self, vertices: &[Point2<T>]) -> Option<Self::Element>;
}

pub type ElementForConnectivity<T, Connectivity> = <Connectivity as ElementConnectivity<T>>::Element;

/// Maps a reference Hessian to the physical Hessian, `J^{-T} H J^{-1}`.
pub fn map_basis_hessian<T: Real>(j_inv: &Matrix2<T>, reference_hessian: &Matrix2<T>) -> Matrix2<T> {
    j_inv.transpose() * reference_hessian * j_inv
}

/// A finite element representing linear basis functions on a triangle, in two dimensions.
///
/// The reference element is chosen to be the triangle defined by the corners
/// (-1, -1), (1, -1), (-1, 1).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Tri3d2Element<T: Scalar> {
    vertices: [Point2<T>; 3],
}

impl<T: Scalar> Tri3d2Element<T> {
    pub fn from_vertices(vertices: [Point2<T>; 3]) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[Point2<T>; 3] {
        &self.vertices
    }
}

impl<T: Scalar> From<Triangle2d<T>> for Tri3d2Element<T> {
    fn from(triangle: Triangle2d<T>) -> Self {
        Self::from_vertices(triangle.0)
    }
}

impl<T: Real> Tri3d2Element<T> {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn reference() -> Self {
        Self::from_vertices([Point2::new(-1.0, -1.0), Point2::new(1.0, -1.0), Point2::new(-1.0, 1.0)])
    }
}

impl<T: Real> ElementConnectivity<T> for Tri3d2Connectivity {
    type Element = Tri3d2Element<T>;

    fn element(&self, vertices: &[Point2<T>]) -> Option<Self::Element> {
        let Self(indices) = self;
        let lookup_vertex = |local_index: usize| vertices.get(indices[local_index]).cloned();

        Some(Tri3d2Element::from_vertices([
            lookup_vertex(0)?,
            lookup_vertex(1)?,
            lookup_vertex(2)?,
        ]))
    }
}

impl<T: Real> FixedNodesReferenceFiniteElement<T> for Tri3d2Element<T> {
    type NodalDim = U3;

    #[rustfmt::skip]
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn evaluate_basis(&self, xi: &Point2<T>) -> Matrix1x3<T> {
        Matrix1x3::from_row_slice(&[
            -0.5 * xi.x - 0.5 * xi.y,
            0.5 * xi.x + 0.5,
            0.5 * xi.y + 0.5
        ])
    }

    #[rustfmt::skip]
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn gradients(&self, _: &Point2<T>) -> Matrix2x3<T> {
        Matrix2x3::from_columns(&[
            Vector2::new(-0.5, -0.5),
            Vector2::new(0.5, 0.0),
            Vector2::new(0.0, 0.5)
        ])
    }

    fn hessian(&self, _node: usize, _: &Point2<T>) -> Matrix2<T> {
        Matrix2::zeros()
    }
}

impl_reference_finite_element_for_fixed!(Tri3d2Element<T>);

impl<T: Real> FiniteElement<T> for Tri3d2Element<T> {
    #[allow(non_snake_case)]
    fn reference_jacobian(&self, xi: &Point2<T>) -> Matrix2<T> {
        let X: Matrix2x3<T> = Matrix2x3::from_fn(|i, j| self.vertices[j][i]);
        let G = self.gradients(xi);
        X * G.transpose()
    }

    #[allow(non_snake_case)]
    fn map_reference_coords(&self, xi: &Point2<T>) -> Point2<T> {
        let X: Matrix2x3<T> = Matrix2x3::from_fn(|i, j| self.vertices[j][i]);
        let N = self.evaluate_basis(xi);
        Point2::from(X * N.transpose())
    }

    fn diameter(&self) -> T {
        self.vertices
            .iter()
            .tuple_combinations()
            .map(|(x, y)| distance(x, y))
            .fold(T::zero(), |a, b| a.max(b))
    }
}

/// A finite element representing quadratic basis functions on a triangle, in two dimensions.
///
/// Uses the same reference triangle as [`Tri3d2Element`], with the edge nodes at the
/// edge midpoints in the order `[m01, m12, m20]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Tri6d2Element<T: Scalar> {
    vertices: [Point2<T>; 6],
    tri3: Tri3d2Element<T>,
}

impl<T: Scalar> Tri6d2Element<T> {
    pub fn from_vertices(vertices: [Point2<T>; 6]) -> Self {
        let v = &vertices;
        let tri = [v[0].clone(), v[1].clone(), v[2].clone()];
        Self {
            vertices,
            tri3: Tri3d2Element::from_vertices(tri),
        }
    }

    pub fn vertices(&self) -> &[Point2<T>; 6] {
        &self.vertices
    }
}

impl<'a, T: Real> From<&'a Tri3d2Element<T>> for Tri6d2Element<T> {
    fn from(tri3: &'a Tri3d2Element<T>) -> Self {
        let midpoint = |a: &Point2<T>, b: &Point2<T>| LineSegment2d::new(*a, *b).midpoint();

        let [a, b, c] = &tri3.vertices;
        Self::from_vertices([*a, *b, *c, midpoint(a, b), midpoint(b, c), midpoint(c, a)])
    }
}

impl<T: Real> Tri6d2Element<T> {
    pub fn reference() -> Self {
        Self::from(&Tri3d2Element::reference())
    }
}

impl<T: Real> ElementConnectivity<T> for Tri6d2Connectivity {
    type Element = Tri6d2Element<T>;

    fn element(&self, vertices: &[Point2<T>]) -> Option<Self::Element> {
        let Self(indices) = self;
        let lookup_vertex = |local_index: usize| vertices.get(indices[local_index]).cloned();

        Some(Tri6d2Element::from_vertices([
            lookup_vertex(0)?,
            lookup_vertex(1)?,
            lookup_vertex(2)?,
            lookup_vertex(3)?,
            lookup_vertex(4)?,
            lookup_vertex(5)?,
        ]))
    }
}

/// Pairs of Tri3 nodes spanned by the Tri6 edge nodes.
const TRI6_EDGE_NODES: [(usize, usize); 3] = [(0, 1), (1, 2), (2, 0)];

impl<T: Real> FixedNodesReferenceFiniteElement<T> for Tri6d2Element<T> {
    type NodalDim = U6;

    #[rustfmt::skip]
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn evaluate_basis(&self, xi: &Point2<T>) -> Matrix1x6<T> {
        // Tri6 basis functions are products of the Tri3 basis functions
        let psi = self.tri3.evaluate_basis(xi);
        Matrix1x6::from_row_slice(&[
            psi[0] * (2.0 * psi[0] - 1.0),
            psi[1] * (2.0 * psi[1] - 1.0),
            psi[2] * (2.0 * psi[2] - 1.0),
            4.0 * psi[0] * psi[1],
            4.0 * psi[1] * psi[2],
            4.0 * psi[2] * psi[0],
        ])
    }

    #[rustfmt::skip]
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn gradients(&self, xi: &Point2<T>) -> Matrix2x6<T> {
        let psi = self.tri3.evaluate_basis(xi);
        let g = self.tri3.gradients(xi);

        let vertex_gradient = |i: usize| g.column(i) * (4.0 * psi[i] - 1.0);
        let edge_gradient = |i: usize, j: usize|
            g.column(i) * (4.0 * psi[j]) + g.column(j) * (4.0 * psi[i]);

        Matrix2x6::from_columns(&[
            vertex_gradient(0),
            vertex_gradient(1),
            vertex_gradient(2),
            edge_gradient(0, 1),
            edge_gradient(1, 2),
            edge_gradient(2, 0)
        ])
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn hessian(&self, node: usize, xi: &Point2<T>) -> Matrix2<T> {
        let g = self.tri3.gradients(xi);
        if node < 3 {
            let gi = g.column(node);
            gi * gi.transpose() * 4.0
        } else {
            let (i, j) = TRI6_EDGE_NODES[node - 3];
            let (gi, gj) = (g.column(i), g.column(j));
            (gi * gj.transpose() + gj * gi.transpose()) * 4.0
        }
    }
}

impl_reference_finite_element_for_fixed!(Tri6d2Element<T>);

impl<T: Real> FiniteElement<T> for Tri6d2Element<T> {
    fn reference_jacobian(&self, xi: &Point2<T>) -> Matrix2<T> {
        self.tri3.reference_jacobian(xi)
    }

    fn map_reference_coords(&self, xi: &Point2<T>) -> Point2<T> {
        self.tri3.map_reference_coords(xi)
    }

    fn diameter(&self) -> T {
        self.tri3.diameter()
    }
}
