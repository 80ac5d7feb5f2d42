use crate::assembly::local::{ElementConnectivityAssembler, ElementMatrixAssembler, ElementVectorAssembler};
use crate::fem_error::FemError;
use crate::Real;
use nalgebra::base::storage::Storage;
use nalgebra::{DMatrix, DVector, DVectorViewMut, Dyn, Matrix, Scalar, U1};
use nalgebra_sparse::csr::CsrRowMut;
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use std::cell::RefCell;
use std::collections::BTreeSet;

/// An assembler for CSR matrices.
#[derive(Debug, Clone)]
pub struct CsrAssembler<T: Scalar> {
    // Buffers reused across elements and across assembled matrices
    workspace: RefCell<CsrAssemblerWorkspace<T>>,
}

impl<T: Scalar> Default for CsrAssembler<T> {
    fn default() -> Self {
        Self {
            workspace: RefCell::new(CsrAssemblerWorkspace::default()),
        }
    }
}

#[derive(Debug, Clone)]
struct CsrAssemblerWorkspace<T: Scalar> {
    connectivity_permutation: Vec<usize>,
    element_global_dofs: Vec<usize>,
    element_matrix: DMatrix<T>,
}

impl<T: Scalar> Default for CsrAssemblerWorkspace<T> {
    fn default() -> Self {
        Self {
            connectivity_permutation: Vec::new(),
            element_global_dofs: Vec::new(),
            element_matrix: DMatrix::from_row_slice(0, 0, &[]),
        }
    }
}

impl<T: Scalar> CsrAssembler<T> {
    /// The union of the element couplings, as a square pattern over all degrees of freedom.
    pub fn assemble_pattern(&self, element_assembler: &dyn ElementConnectivityAssembler) -> SparsityPattern {
        // Collecting into a BTreeSet stores each entry once, even though neighboring
        // elements produce many duplicates
        let mut matrix_entries = BTreeSet::new();
        let mut element_global_dofs = Vec::new();
        for i in 0..element_assembler.num_elements() {
            element_global_dofs.resize(element_assembler.element_dof_count(i), usize::MAX);
            element_assembler.populate_element_dofs(&mut element_global_dofs, i);

            for &dof_i in &element_global_dofs {
                for &dof_j in &element_global_dofs {
                    matrix_entries.insert((dof_i, dof_j));
                }
            }
        }

        let num_rows = element_assembler.num_dofs();
        let mut offsets = Vec::with_capacity(num_rows + 1);
        let mut column_indices = Vec::with_capacity(matrix_entries.len());

        offsets.push(0);
        for (i, j) in matrix_entries {
            // A while loop, so that consecutive empty rows are handled
            while i + 1 > offsets.len() {
                offsets.push(column_indices.len());
            }
            column_indices.push(j);
        }

        while offsets.len() < (num_rows + 1) {
            offsets.push(column_indices.len());
        }

        SparsityPattern::try_from_offsets_and_indices(num_rows, num_rows, offsets, column_indices)
            .expect("Entries are sorted and in bounds by construction")
    }
}

impl<T: Real> CsrAssembler<T> {
    pub fn assemble(&self, element_assembler: &dyn ElementMatrixAssembler<T>) -> Result<CsrMatrix<T>, FemError> {
        let pattern = self.assemble_pattern(element_assembler.as_connectivity_assembler());
        let initial_matrix_values = vec![T::zero(); pattern.nnz()];
        let mut matrix = CsrMatrix::try_from_pattern_and_values(pattern, initial_matrix_values)
            .expect("Values match the pattern by construction");
        self.assemble_into_csr(&mut matrix, element_assembler)?;
        Ok(matrix)
    }

    /// Adds all element matrices to `csr`, whose pattern must contain every element coupling.
    pub fn assemble_into_csr(
        &self,
        csr: &mut CsrMatrix<T>,
        element_assembler: &dyn ElementMatrixAssembler<T>,
    ) -> Result<(), FemError> {
        let num_dofs = element_assembler.num_dofs();
        if csr.nrows() != num_dofs || csr.ncols() != num_dofs {
            return Err(FemError::Assembly(format!(
                "matrix is {}x{}, but the system has {num_dofs} degrees of freedom",
                csr.nrows(),
                csr.ncols()
            )));
        }

        let ws = &mut *self.workspace.borrow_mut();
        let connectivity_permutation = &mut ws.connectivity_permutation;
        let element_global_dofs = &mut ws.element_global_dofs;
        let element_matrix = &mut ws.element_matrix;

        for i in 0..element_assembler.num_elements() {
            let element_dof_count = element_assembler.element_dof_count(i);

            element_global_dofs.resize(element_dof_count, 0);
            element_matrix.resize_mut(element_dof_count, element_dof_count, T::zero());
            element_matrix.fill(T::zero());

            element_assembler
                .assemble_element_matrix_into(i, element_matrix.view_mut((0, 0), (element_dof_count, element_dof_count)))?;
            if element_matrix.iter().any(|x| !x.is_finite()) {
                return Err(FemError::Assembly(format!("element matrix {i} has non-finite entries")));
            }
            element_assembler.populate_element_dofs(element_global_dofs, i);

            connectivity_permutation.clear();
            connectivity_permutation.extend(0..element_dof_count);
            connectivity_permutation.sort_unstable_by_key(|i| element_global_dofs[*i]);

            for (local_row_index, &global_row_index) in element_global_dofs.iter().enumerate() {
                let mut csr_row = csr.row_mut(global_row_index);
                let a_row = element_matrix.row(local_row_index);
                add_element_row_to_csr_row(&mut csr_row, element_global_dofs, connectivity_permutation, &a_row)?;
            }
        }

        Ok(())
    }
}

/// An assembler for dense global vectors.
#[derive(Debug, Clone)]
pub struct VectorAssembler<T: Scalar> {
    workspace: RefCell<(Vec<usize>, DVector<T>)>,
}

impl<T: Scalar> Default for VectorAssembler<T> {
    fn default() -> Self {
        Self {
            workspace: RefCell::new((Vec::new(), DVector::from_vec(Vec::new()))),
        }
    }
}

impl<T: Real> VectorAssembler<T> {
    pub fn assemble_vector(&self, element_assembler: &dyn ElementVectorAssembler<T>) -> Result<DVector<T>, FemError> {
        let mut output = DVector::zeros(element_assembler.num_dofs());
        self.assemble_vector_into(&mut output, element_assembler)?;
        Ok(output)
    }

    /// Adds all element vectors to `output`.
    pub fn assemble_vector_into<'a>(
        &self,
        output: impl Into<DVectorViewMut<'a, T>>,
        element_assembler: &dyn ElementVectorAssembler<T>,
    ) -> Result<(), FemError> {
        let mut output = output.into();
        if output.len() != element_assembler.num_dofs() {
            return Err(FemError::Assembly(format!(
                "output vector has length {}, but the system has {} degrees of freedom",
                output.len(),
                element_assembler.num_dofs()
            )));
        }

        let (element_global_dofs, element_vector) = &mut *self.workspace.borrow_mut();
        for i in 0..element_assembler.num_elements() {
            let element_dof_count = element_assembler.element_dof_count(i);
            element_global_dofs.resize(element_dof_count, 0);
            element_vector.resize_vertically_mut(element_dof_count, T::zero());
            element_vector.fill(T::zero());

            element_assembler.assemble_element_vector_into(i, element_vector.rows_mut(0, element_dof_count))?;
            if element_vector.iter().any(|x| !x.is_finite()) {
                return Err(FemError::Assembly(format!("element vector {i} has non-finite entries")));
            }
            element_assembler.populate_element_dofs(element_global_dofs, i);

            for (&global_index, &value) in element_global_dofs.iter().zip(element_vector.iter()) {
                output[global_index] += value;
            }
        }
        Ok(())
    }
}

/// The first non-zero diagonal magnitude, used as a representative scale for constrained rows.
///
/// Setting 1 on the diagonal would ignore the scaling of the remaining entries and may
/// hurt the condition number.
fn dirichlet_diagonal_scale<T: Real>(matrix: &CsrMatrix<T>) -> T {
    (0..matrix.nrows().min(matrix.ncols()))
        .filter_map(|i| matrix.get_entry(i, i).map(|entry| entry.into_value()))
        .find(|x| *x != T::zero())
        .map(|x| x.abs())
        .unwrap_or_else(T::one)
}

/// Zeroes the rows and columns of the given degrees of freedom, and puts a representative
/// scale on their diagonal entries. Returns the scale.
///
/// The pattern must be structurally symmetric.
pub fn apply_homogeneous_dirichlet_bc_csr<T: Real>(matrix: &mut CsrMatrix<T>, dofs: &[usize]) -> T {
    let scale = dirichlet_diagonal_scale(matrix);

    // Zeroing column j of a Dirichlet row i means that row j must be visited later, since the
    // pattern is symmetric. This avoids scanning the whole matrix.
    let mut dirichlet_membership = vec![false; matrix.nrows()];
    let mut rows_to_visit = vec![false; matrix.nrows()];

    for &dof in dofs {
        dirichlet_membership[dof] = true;
        let mut row = matrix.row_mut(dof);
        let (cols, values) = row.cols_and_values_mut();

        for (&col_idx, val) in cols.iter().zip(values) {
            if col_idx == dof {
                *val = scale;
            } else {
                *val = T::zero();
                rows_to_visit[col_idx] = true;
            }
        }
    }

    let row_visit_iter = rows_to_visit
        .iter()
        .enumerate()
        .filter_map(|(index, &should_visit)| should_visit.then_some(index));
    for row_index in row_visit_iter {
        if !dirichlet_membership[row_index] {
            let mut row = matrix.row_mut(row_index);
            let (cols, values) = row.cols_and_values_mut();
            for (&global_idx, value) in cols.iter().zip(values) {
                if dirichlet_membership[global_idx] {
                    *value = T::zero();
                }
            }
        }
    }

    scale
}

pub fn apply_homogeneous_dirichlet_bc_rhs<'a, T: Real>(rhs: impl Into<DVectorViewMut<'a, T>>, dofs: &[usize]) {
    let mut rhs = rhs.into();
    for &dof in dofs {
        rhs[dof] = T::zero();
    }
}

/// Imposes `u[dofs[k]] = values[k]` on the system `matrix * u = rhs`.
///
/// The known values are lifted into the right-hand side before their rows and columns are
/// eliminated, so the system stays symmetric whenever it was symmetric before.
pub fn apply_dirichlet_bc<T: Real>(
    matrix: &mut CsrMatrix<T>,
    rhs: &mut DVector<T>,
    dofs: &[usize],
    values: &[T],
) -> Result<(), FemError> {
    if dofs.len() != values.len() {
        return Err(FemError::Assembly(format!(
            "{} constrained degrees of freedom, but {} prescribed values",
            dofs.len(),
            values.len()
        )));
    }
    if rhs.len() != matrix.nrows() {
        return Err(FemError::Assembly(format!(
            "right-hand side has length {}, but the matrix has {} rows",
            rhs.len(),
            matrix.nrows()
        )));
    }
    if let Some(&dof) = dofs.iter().find(|&&dof| dof >= matrix.nrows()) {
        return Err(FemError::Assembly(format!("constrained degree of freedom {dof} is out of bounds")));
    }

    let mut prescribed = vec![None; matrix.ncols()];
    for (&dof, &value) in dofs.iter().zip(values) {
        prescribed[dof] = Some(value);
    }

    for (row_index, row) in matrix.row_iter().enumerate() {
        if prescribed[row_index].is_some() {
            continue;
        }
        for (&col, &a) in row.col_indices().iter().zip(row.values()) {
            if let Some(value) = prescribed[col] {
                rhs[row_index] -= a * value;
            }
        }
    }

    let scale = apply_homogeneous_dirichlet_bc_csr(matrix, dofs);
    for (&dof, &value) in dofs.iter().zip(values) {
        rhs[dof] = scale * value;
    }
    Ok(())
}

/// Add a row of a local element matrix to the provided row of a CSR matrix.
///
/// `dof_connectivity`: The global indices of the element's degrees of freedom.
/// `sorted_permutation`: Local indices ordered such that the corresponding global indices are sorted.
fn add_element_row_to_csr_row<T, S>(
    row: &mut CsrRowMut<T>,
    dof_connectivity: &[usize],
    sorted_permutation: &[usize],
    local_row: &Matrix<T, U1, Dyn, S>,
) -> Result<(), FemError>
where
    T: Real,
    S: Storage<T, U1, Dyn>,
{
    debug_assert_eq!(dof_connectivity.len(), sorted_permutation.len());
    debug_assert_eq!(dof_connectivity.len(), local_row.ncols());

    let (column_indices, values) = row.cols_and_values_mut();
    let mut csr_col_idx_iter = column_indices.iter().copied().enumerate();

    for &local_col_idx in sorted_permutation {
        let global_col_index = dof_connectivity[local_col_idx];
        let (local_csr_col_idx, _) = csr_col_idx_iter
            .find(|(_, csr_col_idx)| *csr_col_idx == global_col_index)
            .ok_or_else(|| {
                FemError::Assembly(format!("column {global_col_index} is missing from the sparsity pattern"))
            })?;
        values[local_csr_col_idx] += local_row[local_col_idx];
    }
    Ok(())
}
