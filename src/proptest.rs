//! Proptest strategies for geometry, elements and meshes.
use crate::config::RectangleDomain;
use crate::element::Tri3d2Element;
use crate::geometry::{Orientation, Triangle, Triangle2d};
use crate::mesh::procedural::create_rectangular_uniform_tri_mesh_2d;
use crate::mesh::topology::MeshEdges;
use crate::mesh::TriangleMesh2d;
use ::proptest::collection::vec;
use ::proptest::prelude::*;
use nalgebra::Point2;

pub fn point2() -> impl Strategy<Value = Point2<f64>> {
    // A small range keeps coordinates far from magnitudes that break the geometry routines
    let range = -10.0..10.0;
    [range.clone(), range].prop_map(|[x, y]| Point2::new(x, y))
}

/// Counter-clockwise triangles whose area is not too small relative to their diameter.
pub fn nondegenerate_triangle2d() -> impl Strategy<Value = Triangle2d<f64>> {
    [point2(), point2(), point2()]
        .prop_map(|vertices| {
            let mut triangle = Triangle(vertices);
            if triangle.orientation() == Orientation::Clockwise {
                triangle.swap_vertices(1, 2);
            }
            triangle
        })
        .prop_filter("triangle must not be degenerate", |triangle| {
            let diameter = triangle.diameter();
            triangle.area() > 1e-2 * diameter * diameter
        })
}

impl Arbitrary for Tri3d2Element<f64> {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        nondegenerate_triangle2d().prop_map(Self::from).boxed()
    }
}

/// Rectangles with corners in `[-10, 10]²` and sides of at least 0.1.
pub fn rectangle_domain() -> impl Strategy<Value = RectangleDomain<f64>> {
    (point2(), 0.1..10.0, 0.1..10.0).prop_map(|(lower_left, width, height)| {
        RectangleDomain::new(lower_left, lower_left + nalgebra::Vector2::new(width, height))
    })
}

/// Structured meshes with between 1 and `max_squares` grid squares in each direction.
pub fn rectangular_uniform_mesh_strategy(max_squares: usize) -> impl Strategy<Value = TriangleMesh2d<f64>> {
    (rectangle_domain(), 1..=max_squares.max(1), 1..=max_squares.max(1))
        .prop_map(|(domain, nx, ny)| create_rectangular_uniform_tri_mesh_2d(&domain, nx, ny))
}

/// A structured mesh, its edges and a non-empty list of edge indices that may contain
/// duplicates.
pub fn marked_mesh_strategy(max_squares: usize) -> impl Strategy<Value = (TriangleMesh2d<f64>, MeshEdges, Vec<usize>)> {
    rectangular_uniform_mesh_strategy(max_squares).prop_flat_map(|mesh| {
        let mesh_edges = MeshEdges::from_mesh(&mesh).expect("Structured meshes are manifold");
        let num_edges = mesh_edges.num_edges();
        (Just(mesh), Just(mesh_edges), vec(0..num_edges, 1..=num_edges))
    })
}
