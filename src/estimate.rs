//! Residual-based a posteriori error indicators for the Poisson problem.
//!
//! For a cell `T` the indicator is
//!
//! ```text
//! η_T = area(T) ∫_T (Δu_h + f)² dx + Σ_{E ⊂ ∂T interior} ½ h_E ∫_E [[∇u_h · n]]² ds,
//! h_E = ½ (√area(T+) + √area(T-)),
//! ```
//!
//! where `[[·]]` is the jump across the edge. The cell term uses the residual `Δu_h + f` of
//! `-Δu = f` rather than `Δu_h - f`. The two agree for P1, where `Δu_h` vanishes, and differ
//! for P2. Each interior edge contributes the same amount to
//! both of its cells. All sums are accumulated serially in cell and edge order, so the result
//! is bit-for-bit reproducible.
use crate::element::{ElementConnectivity, FiniteElement};
use crate::fem_error::FemError;
use crate::mesh::topology::MeshEdges;
use crate::mesh::Mesh2d;
use crate::quadrature::{gauss, triangle_strength5, Quadrature};
use crate::space::{DiscreteFunction, FiniteElementConnectivity, FiniteElementSpace};
use crate::Real;
use log::debug;
use nalgebra::{DVector, Point2, Vector2};
use numeric_literals::replace_float_literals;

/// Corners of the reference triangle.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
fn reference_vertex<T: Real>(local_index: usize) -> Point2<T> {
    match local_index % 3 {
        0 => Point2::new(-1.0, -1.0),
        1 => Point2::new(1.0, -1.0),
        _ => Point2::new(-1.0, 1.0),
    }
}

/// Reference coordinates of the point at parameter `s ∈ [-1, 1]` along local edge `k`.
///
/// `s = -1` is the edge's first vertex in the cell's ordering when `forward` is true, and its
/// second vertex otherwise.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
fn reference_edge_point<T: Real>(k: usize, s: T, forward: bool) -> Point2<T> {
    let (from, to) = if forward {
        (reference_vertex::<T>(k), reference_vertex::<T>(k + 1))
    } else {
        (reference_vertex::<T>(k + 1), reference_vertex::<T>(k))
    };
    let t = (1.0 + s) / 2.0;
    from + (to - from) * t
}

/// Cell areas computed from the affine element maps.
fn element_areas<T, C>(space: &Mesh2d<T, C>) -> Result<Vec<T>, FemError>
where
    T: Real,
    C: ElementConnectivity<T>,
{
    let two = T::one() + T::one();
    (0..space.num_elements())
        .map(|i| {
            let element = space
                .element(i)
                .ok_or_else(|| FemError::InvalidMesh(format!("cell {i} references missing vertices")))?;
            // The reference triangle has area 2
            Ok(two * element.reference_jacobian(&Point2::origin()).determinant().abs())
        })
        .collect()
}

/// Computes one residual indicator per cell of the space underlying `u_h`.
///
/// `mesh_edges` must describe the cells of the space. Only the first three nodes of each cell
/// (its vertices) are used to identify edges.
pub fn compute_residual_indicators<T, C>(
    u_h: &DiscreteFunction<T, Mesh2d<T, C>>,
    source: impl Fn(&Point2<T>) -> T,
    mesh_edges: &MeshEdges,
) -> Result<DVector<T>, FemError>
where
    T: Real,
    C: ElementConnectivity<T>,
{
    let space = u_h.space();
    let num_cells = space.num_elements();
    if mesh_edges.num_cells() != num_cells {
        return Err(FemError::InvalidMesh(format!(
            "edge topology describes {} cells, but the space has {num_cells}",
            mesh_edges.num_cells()
        )));
    }

    let areas = element_areas(space)?;
    let mut indicators = DVector::zeros(num_cells);

    let cell_quadrature = triangle_strength5::<T>();
    for (cell, area) in areas.iter().enumerate() {
        let element = space
            .element(cell)
            .ok_or_else(|| FemError::InvalidMesh(format!("cell {cell} references missing vertices")))?;
        let abs_det_j = element.reference_jacobian(&Point2::origin()).determinant().abs();
        let mut integral = T::zero();
        for (&w, xi) in cell_quadrature.weights().iter().zip(cell_quadrature.points()) {
            let x = element.map_reference_coords(xi);
            let residual = u_h.laplacian_in_element(cell, xi)? + source(&x);
            integral += w * abs_det_j * residual * residual;
        }
        indicators[cell] = *area * integral;
    }

    let half = T::from_f64(0.5).expect("0.5 must fit in T");
    let (edge_weights, edge_points) = gauss::<T>(2);
    for edge in mesh_edges.interior_edges() {
        let [a, b] = mesh_edges.edge_vertices(edge);
        let (x_a, x_b) = (space.vertices()[a], space.vertices()[b]);
        let tangent = x_b - x_a;
        let length = tangent.norm();
        let normal = Vector2::new(tangent.y, -tangent.x) / length;

        let cells = mesh_edges.edge_cells(edge);
        let (plus, minus) = (cells[0], cells[1]);
        let mut jump_integral = T::zero();
        for (&w, &s) in edge_weights.iter().zip(&edge_points) {
            let mut jump = T::zero();
            for (cell, sign) in [(plus, T::one()), (minus, -T::one())] {
                let k = mesh_edges
                    .local_edge_index(cell, edge)
                    .expect("Edge-cell connectivity is consistent");
                let forward = space.connectivity()[cell].vertex_indices()[k] == a;
                let xi = reference_edge_point(k, s, forward);
                jump += sign * u_h.gradient_in_element(cell, &xi)?.dot(&normal);
            }
            jump_integral += w * half * length * jump * jump;
        }

        let h_edge = half * (areas[plus].sqrt() + areas[minus].sqrt());
        let contribution = half * h_edge * jump_integral;
        indicators[plus] += contribution;
        indicators[minus] += contribution;
    }

    debug!(
        "Computed residual indicators for {} cells and {} interior edges",
        num_cells,
        mesh_edges.interior_edges().count()
    );
    Ok(indicators)
}

/// The sum of all cell indicators.
pub fn total_residual<T: Real>(indicators: &DVector<T>) -> T {
    indicators.iter().fold(T::zero(), |acc, &eta| acc + eta)
}
