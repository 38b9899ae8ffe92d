//! Dense linear algebra over row-major `ndarray` buffers.
//!
//! Only what eigenface training needs: multiply, transpose, Gram matrix and
//! a cyclic Jacobi eigensolver for small symmetric matrices.

use crate::error::{RecognitionError, Result};
use ndarray::{Array1, Array2};

const JACOBI_MAX_SWEEPS: usize = 100;
/// Convergence is reached when the off-diagonal norm falls below this
/// fraction of the Frobenius norm.
const JACOBI_TOLERANCE: f64 = 1e-13;

/// Eigenpairs of a symmetric matrix. Column `i` of `vectors` pairs with
/// `values[i]`; no ordering is implied.
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    pub values: Array1<f64>,
    pub vectors: Array2<f64>,
}

/// Matrix product `a · b`.
pub fn multiply(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    if a.ncols() != b.nrows() {
        return Err(RecognitionError::DimensionMismatch {
            expected: a.ncols(),
            actual: b.nrows(),
        });
    }
    Ok(a.dot(b))
}

/// Owned transpose.
pub fn transpose(a: &Array2<f64>) -> Array2<f64> {
    a.t().to_owned()
}

/// `aᵗ · a`.
pub fn gram(a: &Array2<f64>) -> Array2<f64> {
    a.t().dot(a)
}

/// Eigen-decomposition of a real symmetric matrix by cyclic Jacobi rotations.
///
/// Fails with `NumericFailure` on non-finite entries or if the rotations do
/// not converge.
pub fn symmetric_eigen(a: &Array2<f64>) -> Result<SymmetricEigen> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(RecognitionError::InvalidInput(format!(
            "eigen-decomposition needs a square matrix, got {}x{}",
            n,
            a.ncols()
        )));
    }
    if a.iter().any(|v| !v.is_finite()) {
        return Err(RecognitionError::NumericFailure(
            "matrix contains NaN or infinite entries".into(),
        ));
    }

    let mut m = a.to_owned();
    let mut v = Array2::<f64>::eye(n);
    let scale = m.iter().map(|x| x * x).sum::<f64>().sqrt();

    for sweep in 0..JACOBI_MAX_SWEEPS {
        let off = off_diagonal_norm(&m);
        if off <= JACOBI_TOLERANCE * scale {
            tracing::debug!(n, sweeps = sweep, "jacobi converged");
            let values = Array1::from_iter((0..n).map(|i| m[[i, i]]));
            return Ok(SymmetricEigen { values, vectors: v });
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = m[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let (c, s) = rotation(m[[p, p]], m[[q, q]], apq);
                rotate(&mut m, &mut v, p, q, c, s);
            }
        }

        if m.iter().any(|x| !x.is_finite()) {
            return Err(RecognitionError::NumericFailure(format!(
                "jacobi rotation produced non-finite values in sweep {sweep}"
            )));
        }
    }

    Err(RecognitionError::NumericFailure(format!(
        "jacobi eigensolver did not converge after {JACOBI_MAX_SWEEPS} sweeps"
    )))
}

/// Cosine and sine of the rotation that annihilates `apq`.
fn rotation(app: f64, aqq: f64, apq: f64) -> (f64, f64) {
    let theta = (aqq - app) / (2.0 * apq);
    let t = if theta.abs() > 1e150 {
        0.5 / theta
    } else {
        theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt())
    };
    let c = 1.0 / (t * t + 1.0).sqrt();
    (c, t * c)
}

/// Apply `m ← Jᵗ m J` and `v ← v J` for the (p, q) plane rotation.
fn rotate(m: &mut Array2<f64>, v: &mut Array2<f64>, p: usize, q: usize, c: f64, s: f64) {
    let n = m.nrows();
    for k in 0..n {
        let mkp = m[[k, p]];
        let mkq = m[[k, q]];
        m[[k, p]] = c * mkp - s * mkq;
        m[[k, q]] = s * mkp + c * mkq;
    }
    for k in 0..n {
        let mpk = m[[p, k]];
        let mqk = m[[q, k]];
        m[[p, k]] = c * mpk - s * mqk;
        m[[q, k]] = s * mpk + c * mqk;
    }
    m[[p, q]] = 0.0;
    m[[q, p]] = 0.0;
    for k in 0..n {
        let vkp = v[[k, p]];
        let vkq = v[[k, q]];
        v[[k, p]] = c * vkp - s * vkq;
        v[[k, q]] = s * vkp + c * vkq;
    }
}

fn off_diagonal_norm(m: &Array2<f64>) -> f64 {
    let mut sum = 0.0;
    for ((i, j), x) in m.indexed_iter() {
        if i != j {
            sum += x * x;
        }
    }
    sum.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sorted_values(eig: &SymmetricEigen) -> Vec<f64> {
        let mut vals = eig.values.to_vec();
        vals.sort_by(|a, b| a.total_cmp(b));
        vals
    }

    #[test]
    fn test_eigen_2x2_known_values() {
        let a = array![[2.0, 1.0], [1.0, 2.0]];
        let eig = symmetric_eigen(&a).unwrap();
        let vals = sorted_values(&eig);
        assert!((vals[0] - 1.0).abs() < 1e-10);
        assert!((vals[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_eigen_diagonal_is_identity_vectors() {
        let a = array![[5.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 2.0]];
        let eig = symmetric_eigen(&a).unwrap();
        assert_eq!(eig.values.to_vec(), vec![5.0, -1.0, 2.0]);
        assert_eq!(eig.vectors, Array2::<f64>::eye(3));
    }

    #[test]
    fn test_eigen_reconstructs_matrix() {
        let a = array![
            [4.0, 1.0, -2.0, 2.0],
            [1.0, 2.0, 0.0, 1.0],
            [-2.0, 0.0, 3.0, -2.0],
            [2.0, 1.0, -2.0, -1.0]
        ];
        let eig = symmetric_eigen(&a).unwrap();
        let lambda = Array2::from_diag(&eig.values);
        let rebuilt = eig.vectors.dot(&lambda).dot(&eig.vectors.t());
        for (x, y) in rebuilt.iter().zip(a.iter()) {
            assert!((x - y).abs() < 1e-9, "rebuilt {x} vs {y}");
        }
        // Eigenvectors are orthonormal.
        let vtv = eig.vectors.t().dot(&eig.vectors);
        for ((i, j), x) in vtv.indexed_iter() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((x - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_eigen_zero_matrix() {
        let eig = symmetric_eigen(&Array2::<f64>::zeros((3, 3))).unwrap();
        assert!(eig.values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_eigen_rejects_nan() {
        let a = array![[1.0, f64::NAN], [f64::NAN, 1.0]];
        assert!(matches!(
            symmetric_eigen(&a),
            Err(RecognitionError::NumericFailure(_))
        ));
    }

    #[test]
    fn test_eigen_rejects_non_square() {
        let a = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            symmetric_eigen(&a),
            Err(RecognitionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_eigen_is_deterministic() {
        let a = array![[3.0, 2.0, 1.0], [2.0, 3.0, 0.5], [1.0, 0.5, 1.0]];
        let first = symmetric_eigen(&a).unwrap();
        let second = symmetric_eigen(&a).unwrap();
        assert_eq!(first.values, second.values);
        assert_eq!(first.vectors, second.vectors);
    }

    #[test]
    fn test_gram_and_multiply() {
        let d = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let g = gram(&d);
        assert_eq!(g, array![[35.0, 44.0], [44.0, 56.0]]);
        let explicit = multiply(&transpose(&d), &d).unwrap();
        assert_eq!(g, explicit);
        assert!(multiply(&d, &d).is_err());
    }
}
