//! Quadrature rules on the reference triangle and the reference segment.
//!
//! The reference triangle has vertices `(-1, -1)`, `(1, -1)` and `(-1, 1)` (area 2), and the
//! reference segment is `[-1, 1]`. Rules are tabulated on the unit simplex and mapped with
//! `xi = -1 + 2 s`.
use crate::element::{Tri3d2Element, Tri6d2Element};
use crate::Real;
use nalgebra::{Point2, Scalar};
use num::Zero;
use numeric_literals::replace_float_literals;
use std::ops::{AddAssign, Mul};

pub type QuadraturePair2d<T> = (Vec<T>, Vec<Point2<T>>);
/// Weights and points of a rule on `[-1, 1]`.
pub type QuadraturePair1d<T> = (Vec<T>, Vec<T>);

/// A quadrature rule on the reference triangle.
pub trait Quadrature<T: Scalar> {
    fn weights(&self) -> &[T];
    fn points(&self) -> &[Point2<T>];

    /// Approximates the integral of the given function using this quadrature rule.
    fn integrate<U, Function>(&self, f: Function) -> U
    where
        Function: Fn(&Point2<T>) -> U,
        U: Zero + Mul<T, Output = U> + AddAssign<U>,
    {
        let mut integral = U::zero();
        for (w, p) in self.weights().iter().zip(self.points()) {
            integral += f(p) * w.clone();
        }
        integral
    }

    fn len(&self) -> usize {
        self.weights().len()
    }

    fn is_empty(&self) -> bool {
        self.weights().is_empty()
    }
}

impl<T, A, B> Quadrature<T> for (A, B)
where
    T: Scalar,
    A: AsRef<[T]>,
    B: AsRef<[Point2<T>]>,
{
    fn weights(&self) -> &[T] {
        self.0.as_ref()
    }

    fn points(&self) -> &[Point2<T>] {
        self.1.as_ref()
    }
}

impl<T: Scalar, X: Quadrature<T>> Quadrature<T> for &X {
    fn weights(&self) -> &[T] {
        X::weights(self)
    }

    fn points(&self) -> &[Point2<T>] {
        X::points(self)
    }
}

/// Maps a rule given on the unit triangle `{s, t >= 0, s + t <= 1}` to the reference triangle.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
fn from_unit_triangle<T: Real>(rule: &[(f64, f64, f64)]) -> QuadraturePair2d<T> {
    let weights = rule.iter().map(|&(w, _, _)| 4.0 * T::from_f64(w).expect("Weight must fit in T"));
    let points = rule.iter().map(|&(_, s, t)| {
        let s = T::from_f64(s).expect("Coordinate must fit in T");
        let t = T::from_f64(t).expect("Coordinate must fit in T");
        Point2::new(-1.0 + 2.0 * s, -1.0 + 2.0 * t)
    });
    (weights.collect(), points.collect())
}

/// One-point rule at the centroid. Exact for linear polynomials.
pub fn triangle_centroid<T: Real>() -> QuadraturePair2d<T> {
    from_unit_triangle(&[(0.5, 1.0 / 3.0, 1.0 / 3.0)])
}

/// Three-point interior rule, exact for quadratic polynomials.
pub fn triangle_strength2<T: Real>() -> QuadraturePair2d<T> {
    let w = 1.0 / 6.0;
    from_unit_triangle(&[
        (w, 1.0 / 6.0, 1.0 / 6.0),
        (w, 2.0 / 3.0, 1.0 / 6.0),
        (w, 1.0 / 6.0, 2.0 / 3.0),
    ])
}

/// The seven-point Radon rule, exact for polynomials of degree 5.
pub fn triangle_strength5<T: Real>() -> QuadraturePair2d<T> {
    let sqrt15 = 15.0f64.sqrt();
    let a = (6.0 - sqrt15) / 21.0;
    let b = (6.0 + sqrt15) / 21.0;
    let wa = (155.0 - sqrt15) / 2400.0;
    let wb = (155.0 + sqrt15) / 2400.0;
    from_unit_triangle(&[
        (9.0 / 80.0, 1.0 / 3.0, 1.0 / 3.0),
        (wa, a, a),
        (wa, 1.0 - 2.0 * a, a),
        (wa, a, 1.0 - 2.0 * a),
        (wb, b, b),
        (wb, 1.0 - 2.0 * b, b),
        (wb, b, 1.0 - 2.0 * b),
    ])
}

/// The cheapest available triangle rule that integrates polynomials of total degree `strength`
/// exactly, or `None` if no such rule is tabulated.
pub fn total_order_triangle<T: Real>(strength: usize) -> Option<QuadraturePair2d<T>> {
    match strength {
        0 | 1 => Some(triangle_centroid()),
        2 => Some(triangle_strength2()),
        3..=5 => Some(triangle_strength5()),
        _ => None,
    }
}

/// Gauss-Legendre rule with the given number of points on `[-1, 1]`.
///
/// Panics unless `num_points` is 1, 2 or 3.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn gauss<T: Real>(num_points: usize) -> QuadraturePair1d<T> {
    match num_points {
        1 => (vec![2.0], vec![0.0]),
        2 => {
            let x = 1.0 / (3.0).sqrt();
            (vec![1.0, 1.0], vec![-x, x])
        }
        3 => {
            let x = (3.0 / 5.0).sqrt();
            (vec![5.0 / 9.0, 8.0 / 9.0, 5.0 / 9.0], vec![-x, 0.0, x])
        }
        _ => panic!("Gauss-Legendre rules are only tabulated for 1, 2 or 3 points"),
    }
}

/// A canonical quadrature for integrating the stiffness terms.
///
/// The quadrature exactly integrates `∫_K ∇φ_i · ∇φ_j dx` on an affine element `K`.
pub trait CanonicalStiffnessQuadrature<T: Real> {
    fn canonical_stiffness_quadrature() -> QuadraturePair2d<T>;
}

impl<T: Real> CanonicalStiffnessQuadrature<T> for Tri3d2Element<T> {
    fn canonical_stiffness_quadrature() -> QuadraturePair2d<T> {
        triangle_centroid()
    }
}

impl<T: Real> CanonicalStiffnessQuadrature<T> for Tri6d2Element<T> {
    fn canonical_stiffness_quadrature() -> QuadraturePair2d<T> {
        triangle_strength2()
    }
}
