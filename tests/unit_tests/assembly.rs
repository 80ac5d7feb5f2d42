use adaptive_fem::assembly::global::{
    apply_dirichlet_bc, apply_homogeneous_dirichlet_bc_csr, apply_homogeneous_dirichlet_bc_rhs, CsrAssembler,
    VectorAssembler,
};
use adaptive_fem::assembly::local::{ElementLaplaceAssembler, ElementSourceAssembler};
use adaptive_fem::config::RectangleDomain;
use adaptive_fem::connectivity::Tri3d2Connectivity;
use adaptive_fem::mesh::procedural::create_rectangular_uniform_tri_mesh_2d;
use adaptive_fem::mesh::{Tri6Mesh2d, TriangleMesh2d};
use adaptive_fem::quadrature::triangle_strength2;
use adaptive_fem::FemError;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{dmatrix, dvector, point, DMatrix, DVector, Point2};
use nalgebra_sparse::CsrMatrix;

fn reference_triangle_mesh() -> TriangleMesh2d<f64> {
    let vertices = vec![point![-1.0, -1.0], point![1.0, -1.0], point![-1.0, 1.0]];
    TriangleMesh2d::from_vertices_and_connectivity(vertices, vec![Tri3d2Connectivity([0, 1, 2])])
}

fn unit_square_two_triangles() -> TriangleMesh2d<f64> {
    let vertices = vec![point![0.0, 0.0], point![1.0, 0.0], point![1.0, 1.0], point![0.0, 1.0]];
    let cells = vec![Tri3d2Connectivity([0, 1, 2]), Tri3d2Connectivity([0, 2, 3])];
    TriangleMesh2d::from_vertices_and_connectivity(vertices, cells)
}

#[test]
fn p1_stiffness_on_reference_triangle() {
    let mesh = reference_triangle_mesh();
    let element_assembler = ElementLaplaceAssembler::with_canonical_quadrature(&mesh);
    let matrix = CsrAssembler::default().assemble(&element_assembler).unwrap();

    #[rustfmt::skip]
    let expected = dmatrix![ 1.0, -0.5, -0.5;
                            -0.5,  0.5,  0.0;
                            -0.5,  0.0,  0.5];
    assert_matrix_eq!(DMatrix::from(&matrix), expected, comp = abs, tol = 1e-14);
}

#[test]
fn stiffness_quadrature_choice_does_not_matter_for_p1() {
    let mesh = create_rectangular_uniform_tri_mesh_2d(&RectangleDomain::default(), 3, 2);
    let assembler = CsrAssembler::default();
    let canonical = assembler
        .assemble(&ElementLaplaceAssembler::with_canonical_quadrature(&mesh))
        .unwrap();
    let strength2 = assembler
        .assemble(&ElementLaplaceAssembler::new(&mesh, triangle_strength2()))
        .unwrap();
    assert_matrix_eq!(DMatrix::from(&canonical), DMatrix::from(&strength2), comp = abs, tol = 1e-13);
}

#[test]
fn pattern_of_two_triangle_square() {
    let mesh = unit_square_two_triangles();
    let pattern = CsrAssembler::<f64>::default()
        .assemble_pattern(&ElementLaplaceAssembler::with_canonical_quadrature(&mesh));
    assert_eq!(pattern.major_dim(), 4);
    // Vertices 1 and 3 do not share a cell
    assert_eq!(pattern.nnz(), 14);
    assert_eq!(pattern.lane(1), &[0, 1, 2]);
    assert_eq!(pattern.lane(2), &[0, 1, 2, 3]);
}

#[test]
fn stiffness_matrices_annihilate_constants() {
    let mesh = create_rectangular_uniform_tri_mesh_2d(&RectangleDomain::default(), 4, 3);
    let tri6_mesh = Tri6Mesh2d::from(&mesh);
    let assembler = CsrAssembler::default();

    let p1 = assembler
        .assemble(&ElementLaplaceAssembler::with_canonical_quadrature(&mesh))
        .unwrap();
    let p2 = assembler
        .assemble(&ElementLaplaceAssembler::with_canonical_quadrature(&tri6_mesh))
        .unwrap();
    for matrix in [p1, p2] {
        let ones = DVector::repeat(matrix.ncols(), 1.0);
        let product = &matrix * &ones;
        assert!(product.amax() <= 1e-12);
        let dense = DMatrix::from(&matrix);
        assert_matrix_eq!(dense, dense.transpose(), comp = abs, tol = 1e-13);
    }
}

#[test]
fn stiffness_reproduces_dirichlet_energy() {
    // For u = x, ∫ |∇u|² = area
    let domain = RectangleDomain::new(point![0.0, 0.0], point![2.0, 1.5]);
    let mesh = Tri6Mesh2d::from(create_rectangular_uniform_tri_mesh_2d(&domain, 3, 3));
    let matrix = CsrAssembler::default()
        .assemble(&ElementLaplaceAssembler::with_canonical_quadrature(&mesh))
        .unwrap();
    let u = DVector::from_iterator(mesh.vertices().len(), mesh.vertices().iter().map(|x| x.x));
    assert_scalar_eq!(u.dot(&(&matrix * &u)), 3.0, comp = abs, tol = 1e-12);
}

#[test]
fn constant_source_integrates_to_area() {
    let mesh = create_rectangular_uniform_tri_mesh_2d(&RectangleDomain::default(), 3, 5);
    let tri6_mesh = Tri6Mesh2d::from(&mesh);
    let one = |_: &Point2<f64>| 1.0;

    let p1 = VectorAssembler::default()
        .assemble_vector(&ElementSourceAssembler::new(&mesh, one))
        .unwrap();
    assert_eq!(p1.len(), mesh.vertices().len());
    assert_scalar_eq!(p1.sum(), 4.0, comp = abs, tol = 1e-12);

    let p2 = VectorAssembler::default()
        .assemble_vector(&ElementSourceAssembler::new(&tri6_mesh, one))
        .unwrap();
    assert_eq!(p2.len(), tri6_mesh.vertices().len());
    assert_scalar_eq!(p2.sum(), 4.0, comp = abs, tol = 1e-12);
    // The vertex functions of P2 integrate to zero on every triangle
    assert!(p2.rows(0, mesh.vertices().len()).amax() <= 1e-13);
}

#[test]
fn assemble_vector_into_accumulates() {
    let mesh = reference_triangle_mesh();
    let assembler = ElementSourceAssembler::new(&mesh, |_: &Point2<f64>| 3.0);
    let mut output = dvector![1.0, 1.0, 1.0];
    VectorAssembler::default()
        .assemble_vector_into(&mut output, &assembler)
        .unwrap();
    // Each linear hat function integrates to area / 3
    assert_matrix_eq!(output, dvector![3.0, 3.0, 3.0], comp = abs, tol = 1e-13);

    let mut too_short = dvector![0.0];
    assert!(matches!(
        VectorAssembler::default().assemble_vector_into(&mut too_short, &assembler),
        Err(FemError::Assembly(_))
    ));
}

#[test]
fn non_finite_source_is_an_assembly_error() {
    let mesh = reference_triangle_mesh();
    let assembler = ElementSourceAssembler::new(&mesh, |_: &Point2<f64>| f64::NAN);
    assert!(matches!(
        VectorAssembler::default().assemble_vector(&assembler),
        Err(FemError::Assembly(_))
    ));
}

#[test]
fn assemble_into_csr_checks_dimensions() {
    let mesh = unit_square_two_triangles();
    let element_assembler = ElementLaplaceAssembler::with_canonical_quadrature(&mesh);
    let mut matrix = CsrMatrix::identity(3);
    assert!(matches!(
        CsrAssembler::default().assemble_into_csr(&mut matrix, &element_assembler),
        Err(FemError::Assembly(_))
    ));
}

#[test]
fn homogeneous_dirichlet_conditions_eliminate_rows_and_columns() {
    let mesh = unit_square_two_triangles();
    let mut matrix = CsrAssembler::default()
        .assemble(&ElementLaplaceAssembler::with_canonical_quadrature(&mesh))
        .unwrap();
    let original = DMatrix::from(&matrix);
    let scale = apply_homogeneous_dirichlet_bc_csr(&mut matrix, &[0, 3]);
    assert_eq!(scale, original[(0, 0)].abs());

    let dense = DMatrix::from(&matrix);
    for dof in [0, 3] {
        for k in 0..4 {
            let expected = if k == dof { scale } else { 0.0 };
            assert_eq!(dense[(dof, k)], expected);
            assert_eq!(dense[(k, dof)], expected);
        }
    }
    assert_eq!(dense[(1, 2)], original[(1, 2)]);
    assert_eq!(dense[(2, 2)], original[(2, 2)]);

    let mut rhs = dvector![1.0, 2.0, 3.0, 4.0];
    apply_homogeneous_dirichlet_bc_rhs(&mut rhs, &[0, 3]);
    assert_eq!(rhs, dvector![0.0, 2.0, 3.0, 0.0]);
}

#[test]
fn inhomogeneous_dirichlet_conditions_are_satisfied_by_the_solution() {
    // u = 1 + x - y is harmonic, so prescribing it on the boundary reproduces it inside
    let mesh = create_rectangular_uniform_tri_mesh_2d(&RectangleDomain::default(), 4, 4);
    let u = |x: &Point2<f64>| 1.0 + x.x - x.y;
    let mut matrix = CsrAssembler::default()
        .assemble(&ElementLaplaceAssembler::with_canonical_quadrature(&mesh))
        .unwrap();
    let mut rhs = DVector::zeros(matrix.nrows());
    let dofs = mesh.find_boundary_vertices();
    let values: Vec<f64> = dofs.iter().map(|&i| u(&mesh.vertices()[i])).collect();
    apply_dirichlet_bc(&mut matrix, &mut rhs, &dofs, &values).unwrap();

    let dense = DMatrix::from(&matrix);
    assert_matrix_eq!(dense, dense.transpose(), comp = abs, tol = 1e-14);
    let solution = dense.lu().solve(&rhs).unwrap();
    let expected = DVector::from_iterator(mesh.vertices().len(), mesh.vertices().iter().map(u));
    assert_matrix_eq!(solution, expected, comp = abs, tol = 1e-12);
}

#[test]
fn inhomogeneous_dirichlet_input_is_validated() {
    let mesh = unit_square_two_triangles();
    let mut matrix = CsrAssembler::default()
        .assemble(&ElementLaplaceAssembler::with_canonical_quadrature(&mesh))
        .unwrap();
    let mut rhs = DVector::zeros(4);
    assert!(apply_dirichlet_bc(&mut matrix, &mut rhs, &[0, 1], &[1.0]).is_err());
    assert!(apply_dirichlet_bc(&mut matrix, &mut rhs, &[7], &[1.0]).is_err());
    let mut short_rhs = DVector::zeros(2);
    assert!(apply_dirichlet_bc(&mut matrix, &mut short_rhs, &[0], &[1.0]).is_err());
}
