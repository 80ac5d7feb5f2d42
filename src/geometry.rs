//! Triangle and line segment primitives in two dimensions.
use crate::Real;
use nalgebra::{Point2, Scalar, Vector2};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Orientation {
    Clockwise,
    Counterclockwise,
}

/// A triangle in two dimensions, consisting of three vertices.
///
/// Mesh generation in this crate always produces counter-clockwise triangles, but the
/// triangle itself makes no such assumption: use [`Triangle::orientation`] to find out.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct Triangle<T: Scalar>(pub [Point2<T>; 3]);

pub type Triangle2d<T> = Triangle<T>;

impl<T: Scalar> Triangle<T> {
    pub fn swap_vertices(&mut self, i: usize, j: usize) {
        self.0.swap(i, j);
    }

    /// The edge joining local vertices `k` and `k + 1 (mod 3)`.
    ///
    /// Panics if `k >= 3`.
    pub fn edge(&self, k: usize) -> LineSegment2d<T> {
        assert!(k < 3, "Triangle only has three edges");
        LineSegment2d::new(self.0[k].clone(), self.0[(k + 1) % 3].clone())
    }
}

impl<T: Real> Triangle<T> {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn centroid(&self) -> Point2<T> {
        let [a, b, c] = &self.0;
        Point2::from((a.coords + b.coords + c.coords) / 3.0)
    }

    /// Returns an array of vectors corresponding to the three sides of the triangle.
    pub fn sides(&self) -> [Vector2<T>; 3] {
        let [a, b, c] = &self.0;
        [b - a, c - b, a - c]
    }

    pub fn orientation(&self) -> Orientation {
        if self.signed_area() >= T::zero() {
            Orientation::Counterclockwise
        } else {
            Orientation::Clockwise
        }
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn signed_area(&self) -> T {
        let [a, b, c] = &self.0;
        let ab = b - a;
        let ac = c - a;
        0.5 * ab.perp(&ac)
    }

    pub fn area(&self) -> T {
        self.signed_area().abs()
    }

    /// Outward unit normal of the edge joining local vertices `k` and `k + 1 (mod 3)`.
    pub fn outward_unit_normal(&self, k: usize) -> Vector2<T> {
        let normal = self.edge(k).normal_dir().normalize();
        match self.orientation() {
            Orientation::Counterclockwise => normal,
            Orientation::Clockwise => -normal,
        }
    }

    /// Local index of the longest edge. Ties resolve to the lowest local index.
    pub fn longest_edge(&self) -> usize {
        let lengths = self.sides().map(|side| side.norm_squared());
        let mut longest = 0;
        for k in 1..3 {
            if lengths[k] > lengths[longest] {
                longest = k;
            }
        }
        longest
    }

    pub fn diameter(&self) -> T {
        self.sides()
            .iter()
            .map(|side| side.norm())
            .fold(T::zero(), |a, b| a.max(b))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LineSegment2d<T: Scalar> {
    start: Point2<T>,
    end: Point2<T>,
}

impl<T: Scalar> LineSegment2d<T> {
    pub fn new(from: Point2<T>, to: Point2<T>) -> Self {
        Self { start: from, end: to }
    }

    pub fn start(&self) -> &Point2<T> {
        &self.start
    }

    pub fn end(&self) -> &Point2<T> {
        &self.end
    }

    pub fn reverse(&self) -> Self {
        Self {
            start: self.end.clone(),
            end: self.start.clone(),
        }
    }
}

impl<T: Real> LineSegment2d<T> {
    /// Returns a vector tangent to the line segment.
    ///
    /// Note that the vector is **not** normalized.
    pub fn tangent_dir(&self) -> Vector2<T> {
        self.end.coords - self.start.coords
    }

    /// Returns a vector normal to the line segment, in the direction consistent with a
    /// counter-clockwise winding order when the edge is part of a polygon.
    ///
    /// Note that the vector is **not** normalized.
    pub fn normal_dir(&self) -> Vector2<T> {
        let tangent = self.tangent_dir();
        Vector2::new(tangent.y, -tangent.x)
    }

    pub fn length(&self) -> T {
        self.tangent_dir().norm()
    }

    pub fn midpoint(&self) -> Point2<T> {
        self.point_from_parameter(T::from_f64(0.5).expect("Literal must fit in T"))
    }

    /// The point `a + t (b - a)`.
    pub fn point_from_parameter(&self, t: T) -> Point2<T> {
        Point2::from(self.start.coords + self.tangent_dir() * t)
    }
}
