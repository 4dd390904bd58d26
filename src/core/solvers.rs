use nalgebra::DVector;

/// Solve a tridiagonal system of equations
///
/// ## Arguments
/// * `lower` - coefficient of the previous unknown in each equation (first entry unused)
/// * `diag` - coefficient of the unknown itself in each equation
/// * `upper` - coefficient of the next unknown in each equation (last entry unused)
/// * `rhs` - terms on the right hand side of each equation
///
/// Heat balance equations along a chain of nodes only couple each node to its
/// neighbours, so each equation can be rearranged to eliminate the previous
/// node:
///
/// diag_adj[i] = diag[i] - upper[i-1] * lower[i] / diag_adj[i-1]
/// rhs_adj[i] = rhs[i] - rhs_adj[i-1] * lower[i] / diag_adj[i-1]
///
/// after which the last node is solved directly and the others follow by
/// substituting back from the end of the chain:
///
/// x[i] = (rhs_adj[i] - upper[i] * x[i+1]) / diag_adj[i]
///
/// Returns None when an adjusted diagonal coefficient vanishes.
pub(crate) fn solve_tridiagonal(
    lower: &DVector<f64>,
    diag: &DVector<f64>,
    upper: &DVector<f64>,
    rhs: &DVector<f64>,
) -> Option<DVector<f64>> {
    let n = diag.len();
    if n == 0 || lower.len() != n || upper.len() != n || rhs.len() != n {
        return None;
    }

    let mut diag_adj = DVector::<f64>::zeros(n);
    let mut rhs_adj = DVector::<f64>::zeros(n);
    diag_adj[0] = diag[0];
    rhs_adj[0] = rhs[0];

    for i in 1..n {
        if diag_adj[i - 1] == 0. {
            return None;
        }
        let factor = lower[i] / diag_adj[i - 1];
        diag_adj[i] = diag[i] - upper[i - 1] * factor;
        rhs_adj[i] = rhs[i] - rhs_adj[i - 1] * factor;
    }

    if diag_adj[n - 1] == 0. {
        return None;
    }

    let mut x = DVector::<f64>::zeros(n);
    x[n - 1] = rhs_adj[n - 1] / diag_adj[n - 1];
    for i in (0..n - 1).rev() {
        x[i] = (rhs_adj[i] - upper[i] * x[i + 1]) / diag_adj[i];
    }

    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use rstest::*;

    #[rstest]
    fn should_match_dense_lu_solution() {
        let lower = DVector::from_vec(vec![0., -1., -2., -0.5]);
        let diag = DVector::from_vec(vec![4., 5., 6., 3.]);
        let upper = DVector::from_vec(vec![-1., -2., -0.5, 0.]);
        let rhs = DVector::from_vec(vec![1., 2., 3., 4.]);

        let mut dense = DMatrix::<f64>::zeros(4, 4);
        for i in 0..4 {
            dense[(i, i)] = diag[i];
            if i > 0 {
                dense[(i, i - 1)] = lower[i];
            }
            if i < 3 {
                dense[(i, i + 1)] = upper[i];
            }
        }
        let expected = dense.lu().solve(&rhs).unwrap();

        let x = solve_tridiagonal(&lower, &diag, &upper, &rhs).unwrap();
        for i in 0..4 {
            assert_relative_eq!(x[i], expected[i], max_relative = 1e-12);
        }
    }

    #[rstest]
    fn should_solve_single_equation() {
        let x = solve_tridiagonal(
            &DVector::from_vec(vec![0.]),
            &DVector::from_vec(vec![2.]),
            &DVector::from_vec(vec![0.]),
            &DVector::from_vec(vec![3.]),
        )
        .unwrap();
        assert_eq!(x[0], 1.5);
    }

    #[rstest]
    fn should_report_singular_system() {
        let zeros = DVector::<f64>::zeros(2);
        assert!(solve_tridiagonal(&zeros, &zeros, &zeros, &zeros).is_none());
    }
}
