//! Ranking cells by their indicators and selecting the cells and edges to refine.
use crate::mesh::topology::MeshEdges;
use crate::Real;
use nalgebra::DVector;
use std::cmp::Ordering;

fn is_nan<T: Real>(x: T) -> bool {
    x.partial_cmp(&x).is_none()
}

/// Descending order, with NaN after every number.
fn compare_descending<T: Real>(a: T, b: T) -> Ordering {
    match (is_nan(a), is_nan(b)) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Cell indices sorted by indicator value, largest first.
///
/// The sort is stable: cells with equal indicators keep their index order.
pub fn rank_cells<T: Real>(indicators: &DVector<T>) -> Vec<usize> {
    let mut ranking: Vec<usize> = (0..indicators.len()).collect();
    ranking.sort_by(|&i, &j| compare_descending(indicators[i], indicators[j]));
    ranking
}

/// `ceil(fraction · num_cells)`, capped at `num_cells`.
pub fn num_marked_cells(fraction: f64, num_cells: usize) -> usize {
    let marked = (fraction * num_cells as f64).ceil();
    if marked.is_finite() && marked > 0.0 {
        (marked as usize).min(num_cells)
    } else {
        0
    }
}

/// The highest-ranked `ceil(fraction · num_cells)` cells, in rank order.
pub fn mark_cells<T: Real>(indicators: &DVector<T>, fraction: f64) -> Vec<usize> {
    let mut ranking = rank_cells(indicators);
    ranking.truncate(num_marked_cells(fraction, indicators.len()));
    ranking
}

/// The three edges of every marked cell, in the order of `marked_cells`.
///
/// Edges shared by two marked cells appear twice. Refinement collapses the duplicates.
pub fn collect_marked_edges(marked_cells: &[usize], mesh_edges: &MeshEdges) -> Vec<usize> {
    marked_cells
        .iter()
        .flat_map(|&cell| mesh_edges.cell_edges(cell))
        .collect()
}
