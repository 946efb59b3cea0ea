//! Small dense kernels for the reducer. Matrices are row-major `f64` slices.

/// Columns whose norm falls below this after orthogonalization are zeroed.
const RANK_EPS: f64 = 1e-10;
const MAX_SWEEPS: usize = 100;

/// Orthonormalize the columns of a `rows x cols` matrix in place with
/// modified Gram-Schmidt (two passes). Linearly dependent columns become zero.
pub fn orthonormalize_columns(m: &mut [f64], rows: usize, cols: usize) {
    debug_assert_eq!(m.len(), rows * cols);
    for j in 0..cols {
        for _pass in 0..2 {
            for p in 0..j {
                let mut proj = 0.0;
                for r in 0..rows { proj += m[r * cols + j] * m[r * cols + p]; }
                if proj != 0.0 {
                    for r in 0..rows { m[r * cols + j] -= proj * m[r * cols + p]; }
                }
            }
        }
        let norm = (0..rows).map(|r| m[r * cols + j].powi(2)).sum::<f64>().sqrt();
        if norm < RANK_EPS {
            for r in 0..rows { m[r * cols + j] = 0.0; }
        } else {
            for r in 0..rows { m[r * cols + j] /= norm; }
        }
    }
}

/// Eigen-decomposition of a symmetric `n x n` matrix with the cyclic Jacobi
/// method. Returns eigenvalues in descending order and the matching
/// eigenvectors as the columns of a row-major `n x n` matrix.
pub fn symmetric_eigen(mut a: Vec<f64>, n: usize) -> (Vec<f64>, Vec<f64>) {
    debug_assert_eq!(a.len(), n * n);
    let mut v = vec![0.0; n * n];
    for i in 0..n { v[i * n + i] = 1.0; }

    let scale: f64 = a.iter().map(|x| x * x).sum::<f64>().max(f64::MIN_POSITIVE);
    for _sweep in 0..MAX_SWEEPS {
        let off: f64 = (0..n).flat_map(|p| (0..n).filter(move |&q| q != p).map(move |q| (p, q))).map(|(p, q)| a[p * n + q].powi(2)).sum();
        if off <= scale * 1e-24 { break; }
        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p * n + q];
                if apq.abs() <= f64::MIN_POSITIVE { continue; }
                let theta = (a[q * n + q] - a[p * n + p]) / (2.0 * apq);
                let sign = if theta >= 0.0 { 1.0 } else { -1.0 };
                let t = sign / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                for k in 0..n {
                    let akp = a[k * n + p];
                    let akq = a[k * n + q];
                    a[k * n + p] = c * akp - s * akq;
                    a[k * n + q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[p * n + k];
                    let aqk = a[q * n + k];
                    a[p * n + k] = c * apk - s * aqk;
                    a[q * n + k] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[k * n + p];
                    let vkq = v[k * n + q];
                    v[k * n + p] = c * vkp - s * vkq;
                    v[k * n + q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&x, &y| a[y * n + y].total_cmp(&a[x * n + x]));
    let values = order.iter().map(|&i| a[i * n + i]).collect();
    let mut vectors = vec![0.0; n * n];
    for (dst, &src) in order.iter().enumerate() {
        for k in 0..n { vectors[k * n + dst] = v[k * n + src]; }
    }
    (values, vectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jacobi_two_by_two() {
        let (values, vectors) = symmetric_eigen(vec![2.0, 1.0, 1.0, 2.0], 2);
        assert!((values[0] - 3.0).abs() < 1e-10);
        assert!((values[1] - 1.0).abs() < 1e-10);
        // first eigenvector is (1, 1) / sqrt(2) up to sign
        let (x, y) = (vectors[0], vectors[2]);
        assert!((x.abs() - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-10);
        assert!((x - y).abs() < 1e-10);
    }

    #[test]
    fn jacobi_reconstructs_matrix() {
        let a = vec![4.0, 1.0, 0.5, 1.0, 3.0, 0.2, 0.5, 0.2, 1.0];
        let (values, vectors) = symmetric_eigen(a.clone(), 3);
        for i in 0..3 {
            for j in 0..3 {
                let rebuilt: f64 = (0..3).map(|k| vectors[i * 3 + k] * values[k] * vectors[j * 3 + k]).sum();
                assert!((rebuilt - a[i * 3 + j]).abs() < 1e-9, "entry ({i},{j})");
            }
        }
        assert!(values.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn gram_schmidt_zeroes_dependent_columns() {
        // columns: (1,0,0), (2,0,0), (0,1,0)
        let mut m = vec![1.0, 2.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        orthonormalize_columns(&mut m, 3, 3);
        assert!((m[0] - 1.0).abs() < 1e-12);
        assert!(m[1].abs() < 1e-12 && m[4].abs() < 1e-12 && m[7].abs() < 1e-12);
        assert!((m[5] - 1.0).abs() < 1e-12);
    }
}
