//! Errors of discrete solutions measured against closed-form solutions.
use crate::element::FiniteElement;
use crate::fem_error::FemError;
use crate::quadrature::Quadrature;
use crate::space::{DiscreteFunction, FiniteElementSpace};
use crate::Real;
use nalgebra::{Point2, Vector2};

/// Estimate the squared $L^2$ error $\norm{u_h - u}^2_{L^2}$ on a single element.
#[allow(non_snake_case)]
pub fn estimate_element_L2_error_squared<T, S>(
    u_h: &DiscreteFunction<T, S>,
    element_index: usize,
    u: impl Fn(&Point2<T>) -> T,
    quadrature: impl Quadrature<T>,
) -> Result<T, FemError>
where
    T: Real,
    S: FiniteElementSpace<T>,
{
    let element = u_h
        .space()
        .element(element_index)
        .ok_or_else(|| FemError::Assembly(format!("element {element_index} is out of bounds")))?;
    let j_det_abs = element.reference_jacobian(&Point2::origin()).determinant().abs();

    let mut result = T::zero();
    for (&w, xi) in quadrature.weights().iter().zip(quadrature.points()) {
        let x = element.map_reference_coords(xi);
        let error = u_h.evaluate_in_element(element_index, xi) - u(&x);
        result += w * error * error * j_det_abs;
    }
    Ok(result)
}

/// Estimate the squared $H^1$ *seminorm* error $\seminorm{u_h - u}^2_{H^1}$ on a single element.
#[allow(non_snake_case)]
pub fn estimate_element_H1_seminorm_error_squared<T, S>(
    u_h: &DiscreteFunction<T, S>,
    element_index: usize,
    u_grad: impl Fn(&Point2<T>) -> Vector2<T>,
    quadrature: impl Quadrature<T>,
) -> Result<T, FemError>
where
    T: Real,
    S: FiniteElementSpace<T>,
{
    let element = u_h
        .space()
        .element(element_index)
        .ok_or_else(|| FemError::Assembly(format!("element {element_index} is out of bounds")))?;
    let j_det_abs = element.reference_jacobian(&Point2::origin()).determinant().abs();

    let mut result = T::zero();
    for (&w, xi) in quadrature.weights().iter().zip(quadrature.points()) {
        let x = element.map_reference_coords(xi);
        let error = u_h.gradient_in_element(element_index, xi)? - u_grad(&x);
        result += w * error.norm_squared() * j_det_abs;
    }
    Ok(result)
}

/// Estimate the $L^2$ error $\norm{u_h - u}_{L^2}$ over the whole space.
#[allow(non_snake_case)]
pub fn estimate_L2_error<T, S>(
    u_h: &DiscreteFunction<T, S>,
    u: impl Fn(&Point2<T>) -> T,
    quadrature: impl Quadrature<T>,
) -> Result<T, FemError>
where
    T: Real,
    S: FiniteElementSpace<T>,
{
    let mut result = T::zero();
    for i in 0..u_h.space().num_elements() {
        result += estimate_element_L2_error_squared(u_h, i, &u, &quadrature)?;
    }
    Ok(result.sqrt())
}

/// Estimate the $H^1$ *seminorm* error $\seminorm{u_h - u}_{H^1}$ over the whole space.
#[allow(non_snake_case)]
pub fn estimate_H1_seminorm_error<T, S>(
    u_h: &DiscreteFunction<T, S>,
    u_grad: impl Fn(&Point2<T>) -> Vector2<T>,
    quadrature: impl Quadrature<T>,
) -> Result<T, FemError>
where
    T: Real,
    S: FiniteElementSpace<T>,
{
    let mut result = T::zero();
    for i in 0..u_h.space().num_elements() {
        result += estimate_element_H1_seminorm_error_squared(u_h, i, &u_grad, &quadrature)?;
    }
    Ok(result.sqrt())
}
