//! Fixed-size symmetric solver for least-squares baseline fits.
//!
//! The detrender builds the normal equations `(XᵀX) c = Xᵀy` of a polynomial
//! fit and solves them here. The systems are tiny (2×2 for a line, 4×4 for a
//! cubic) so everything lives on the stack.
//!
//! # Matrix Storage
//!
//! Matrices are stored in row-major order as flat arrays. For a C×C matrix
//! element (i, j) is stored at index `i * C + j`.

/// Errors that can occur while solving a normal-equation system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinalgError {
    /// Matrix is not positive definite (Cholesky failed)
    NotPositiveDefinite,
}

/// A square matrix stored in row-major order.
///
/// # Type Parameters
///
/// * `C` - Matrix dimension (C×C matrix)
/// * `M` - Total number of elements (must equal C×C)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix<const C: usize, const M: usize> {
    data: [f64; M],
}

impl<const C: usize, const M: usize> Matrix<C, M> {
    /// Create a zero matrix.
    pub const fn zeros() -> Self {
        assert!(M == C * C, "Matrix size M must equal C * C");
        Self { data: [0.0; M] }
    }

    /// Get element at row i, column j.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * C + j]
    }

    /// Set element at row i, column j.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * C + j] = value;
    }

    /// Add `value` to element (i, j).
    #[inline]
    pub fn accumulate(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * C + j] += value;
    }

    /// Cholesky decomposition: A = LLᵀ where L is lower triangular.
    ///
    /// Uses the Cholesky-Banachiewicz algorithm. Matrix must be symmetric
    /// and positive definite.
    ///
    /// # Errors
    ///
    /// Returns `LinalgError::NotPositiveDefinite` if a pivot is not positive.
    pub fn cholesky(&self) -> Result<Self, LinalgError> {
        let mut l = Self::zeros();

        for j in 0..C {
            for i in j..C {
                let mut sum = self.get(i, j);
                for k in 0..j {
                    sum -= l.get(i, k) * l.get(j, k);
                }

                if i == j {
                    if sum <= 1e-300 {
                        return Err(LinalgError::NotPositiveDefinite);
                    }
                    l.set(i, j, libm::sqrt(sum));
                } else {
                    l.set(i, j, sum / l.get(j, j));
                }
            }
        }

        Ok(l)
    }

    /// Solve Ax = b for symmetric positive definite A.
    ///
    /// # Errors
    ///
    /// Returns error if the Cholesky decomposition fails.
    pub fn solve(&self, b: &[f64; C]) -> Result<[f64; C], LinalgError> {
        let l = self.cholesky()?;

        // Forward: L y = b
        let mut y = [0.0; C];
        for i in 0..C {
            let mut sum = b[i];
            for j in 0..i {
                sum -= l.get(i, j) * y[j];
            }
            y[i] = sum / l.get(i, i);
        }

        // Backward: Lᵀ x = y
        let mut x = [0.0; C];
        for i in (0..C).rev() {
            let mut sum = y[i];
            for j in (i + 1)..C {
                sum -= l.get(j, i) * x[j];
            }
            x[i] = sum / l.get(i, i);
        }

        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cholesky_diagonal() {
        let mut a: Matrix<2, 4> = Matrix::zeros();
        a.set(0, 0, 4.0);
        a.set(1, 1, 9.0);

        let l = a.cholesky().unwrap();

        assert!((l.get(0, 0) - 2.0).abs() < 1e-10);
        assert!((l.get(1, 1) - 3.0).abs() < 1e-10);
        assert!(l.get(1, 0).abs() < 1e-10);
    }

    #[test]
    fn test_cholesky_not_positive_definite() {
        let mut a: Matrix<2, 4> = Matrix::zeros();
        a.set(0, 0, -1.0);
        a.set(1, 1, 1.0);

        assert_eq!(a.cholesky(), Err(LinalgError::NotPositiveDefinite));
    }

    #[test]
    fn test_singular_rejected() {
        // Rank one: every row identical
        let mut a: Matrix<2, 4> = Matrix::zeros();
        for i in 0..2 {
            for j in 0..2 {
                a.set(i, j, 1.0);
            }
        }
        assert!(a.solve(&[1.0, 1.0]).is_err());
    }

    #[test]
    fn test_solve_symmetric() {
        // [4, 2; 2, 3] x = [2, 1] -> x = [0.5, 0]
        let mut a: Matrix<2, 4> = Matrix::zeros();
        a.set(0, 0, 4.0);
        a.set(0, 1, 2.0);
        a.set(1, 0, 2.0);
        a.set(1, 1, 3.0);

        let x = a.solve(&[2.0, 1.0]).unwrap();
        assert!((x[0] - 0.5).abs() < 1e-10);
        assert!(x[1].abs() < 1e-10);
    }

    #[test]
    fn test_solve_accumulated_4x4() {
        // Diagonal system built through accumulate
        let mut a: Matrix<4, 16> = Matrix::zeros();
        for i in 0..4 {
            a.accumulate(i, i, 1.0);
            a.accumulate(i, i, (i + 1) as f64);
        }
        let x = a.solve(&[2.0, 3.0, 4.0, 5.0]).unwrap();
        for v in x {
            assert!((v - 1.0).abs() < 1e-10);
        }
    }
}
