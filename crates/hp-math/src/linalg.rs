//! Fixed-dimension linear algebra for ridge-regression models.
//!
//! A ridge design matrix starts as the identity and only ever grows by
//! rank-one outer products of real-valued vectors, so it stays symmetric
//! positive definite and a Cholesky factorization always exists. A failed
//! factorization therefore signals corrupted state, and the API surfaces it
//! as a hard error instead of falling back to a pseudo-inverse.

use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::fmt;

/// Errors from matrix operations.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MathError {
    /// A matrix entry is NaN or infinite.
    NonFinite { row: usize, col: usize },
    /// Cholesky factorization found a non-positive pivot.
    NotPositiveDefinite { pivot: usize },
}

impl fmt::Display for MathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MathError::NonFinite { row, col } => {
                write!(f, "matrix entry ({}, {}) is not finite", row, col)
            }
            MathError::NotPositiveDefinite { pivot } => {
                write!(f, "matrix is not positive definite (pivot {})", pivot)
            }
        }
    }
}

impl std::error::Error for MathError {}

/// Symmetric matrix with a fixed compile-time dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct SymMatrix<const D: usize> {
    rows: [[f64; D]; D],
}

// Serialized as a plain row-major sequence of rows, mainly for diagnostic
// dumps of bandit state. Hand-written because serde's array impls stop at
// fixed sizes and this type is generic over `D`.
impl<const D: usize> Serialize for SymMatrix<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(D))?;
        for row in &self.rows {
            seq.serialize_element(row.as_slice())?;
        }
        seq.end()
    }
}

impl<const D: usize> SymMatrix<D> {
    /// The identity matrix.
    pub fn identity() -> Self {
        let mut rows = [[0.0; D]; D];
        for (i, row) in rows.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        SymMatrix { rows }
    }

    /// Entry at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.rows[row][col]
    }

    /// Add the outer product `x·xᵗ` in place.
    pub fn rank_one_add(&mut self, x: &[f64; D]) {
        for i in 0..D {
            for j in 0..D {
                self.rows[i][j] += x[i] * x[j];
            }
        }
    }

    /// Largest absolute asymmetry `|a_ij - a_ji|` across the matrix.
    ///
    /// Zero for any matrix built from `identity` + `rank_one_add`; useful
    /// as a diagnostic when state is suspected corrupt.
    pub fn asymmetry(&self) -> f64 {
        let mut worst: f64 = 0.0;
        for i in 0..D {
            for j in (i + 1)..D {
                worst = worst.max((self.rows[i][j] - self.rows[j][i]).abs());
            }
        }
        worst
    }

    /// Cholesky factorization `A = L·Lᵗ`.
    ///
    /// Fails if any entry is non-finite or any pivot is not strictly
    /// positive; both indicate the positive-definiteness invariant broke.
    pub fn cholesky(&self) -> Result<Cholesky<D>, MathError> {
        for (i, row) in self.rows.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                if !value.is_finite() {
                    return Err(MathError::NonFinite { row: i, col: j });
                }
            }
        }

        let mut l = [[0.0; D]; D];
        for j in 0..D {
            let mut diag = self.rows[j][j];
            for k in 0..j {
                diag -= l[j][k] * l[j][k];
            }
            if !(diag > 0.0) || !diag.is_finite() {
                return Err(MathError::NotPositiveDefinite { pivot: j });
            }
            l[j][j] = diag.sqrt();
            for i in (j + 1)..D {
                let mut sum = self.rows[i][j];
                for k in 0..j {
                    sum -= l[i][k] * l[j][k];
                }
                l[i][j] = sum / l[j][j];
            }
        }
        Ok(Cholesky { l })
    }
}

/// Lower-triangular Cholesky factor of a positive definite matrix.
#[derive(Debug, Clone)]
pub struct Cholesky<const D: usize> {
    l: [[f64; D]; D],
}

impl<const D: usize> Cholesky<D> {
    /// Solve `A·z = rhs` for `z`.
    pub fn solve(&self, rhs: &[f64; D]) -> [f64; D] {
        let y = self.forward_substitute(rhs);

        // Back substitution: Lᵗ·z = y.
        let mut z = [0.0; D];
        for i in (0..D).rev() {
            let mut sum = y[i];
            for k in (i + 1)..D {
                sum -= self.l[k][i] * z[k];
            }
            z[i] = sum / self.l[i][i];
        }
        z
    }

    /// Quadratic form `xᵗ·A⁻¹·x`.
    ///
    /// Computed as `‖L⁻¹x‖²`, which is non-negative by construction.
    pub fn inverse_quadratic_form(&self, x: &[f64; D]) -> f64 {
        let y = self.forward_substitute(x);
        dot(&y, &y)
    }

    /// Forward substitution: solve `L·y = rhs`.
    fn forward_substitute(&self, rhs: &[f64; D]) -> [f64; D] {
        let mut y = [0.0; D];
        for i in 0..D {
            let mut sum = rhs[i];
            for k in 0..i {
                sum -= self.l[i][k] * y[k];
            }
            y[i] = sum / self.l[i][i];
        }
        y
    }
}

/// Inner product of two fixed-dimension vectors.
pub fn dot<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    let mut sum = 0.0;
    for i in 0..D {
        sum += a[i] * b[i];
    }
    sum
}

/// In-place `acc += scale·x`.
pub fn scaled_add<const D: usize>(acc: &mut [f64; D], x: &[f64; D], scale: f64) {
    for i in 0..D {
        acc[i] += scale * x[i];
    }
}
