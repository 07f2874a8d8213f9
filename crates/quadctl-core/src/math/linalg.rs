//! Fixed-size linear algebra helpers
//!
//! Operates on stack-allocated `SMatrix` buffers supplied by the caller so
//! that no routine allocates.

use nalgebra::SMatrix;
use thiserror::Error;

/// Pivots smaller than this are treated as singular
pub const PIVOT_EPSILON: f32 = 1e-9;

/// Numeric degeneracy detected by a linear algebra routine
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum MathError {
    #[error("Matrix is singular: pivot {pivot:e} in column {column}")]
    Singular { column: usize, pivot: f32 },
}

/// Invert a square matrix by Gauss-Jordan elimination with partial pivoting
///
/// # Arguments
/// * `m` - Matrix to invert (left untouched)
/// * `out` - Receives the inverse on success; unspecified on error
///
/// # Returns
/// `MathError::Singular` if any pivot magnitude falls below [`PIVOT_EPSILON`].
pub fn invert_gauss_jordan<const N: usize>(
    m: &SMatrix<f32, N, N>,
    out: &mut SMatrix<f32, N, N>,
) -> Result<(), MathError> {
    let mut work = *m;
    out.fill_with_identity();

    for col in 0..N {
        let mut pivot_row = col;
        let mut pivot_abs = work[(col, col)].abs();
        for row in (col + 1)..N {
            let candidate = work[(row, col)].abs();
            if candidate > pivot_abs {
                pivot_abs = candidate;
                pivot_row = row;
            }
        }

        // `!(a >= b)` also rejects NaN pivots
        if !(pivot_abs >= PIVOT_EPSILON) {
            return Err(MathError::Singular {
                column: col,
                pivot: pivot_abs,
            });
        }

        if pivot_row != col {
            work.swap_rows(col, pivot_row);
            out.swap_rows(col, pivot_row);
        }

        let inv_pivot = 1.0 / work[(col, col)];
        for j in 0..N {
            work[(col, j)] *= inv_pivot;
            out[(col, j)] *= inv_pivot;
        }

        for row in 0..N {
            if row == col {
                continue;
            }
            let factor = work[(row, col)];
            if factor == 0.0 {
                continue;
            }
            for j in 0..N {
                work[(row, j)] -= factor * work[(col, j)];
                out[(row, j)] -= factor * out[(col, j)];
            }
        }
    }

    Ok(())
}

/// Force exact symmetry: `M ← (M + Mᵀ) / 2`
pub fn symmetrize<const N: usize>(m: &mut SMatrix<f32, N, N>) {
    for i in 0..N {
        for j in (i + 1)..N {
            let avg = 0.5 * (m[(i, j)] + m[(j, i)]);
            m[(i, j)] = avg;
            m[(j, i)] = avg;
        }
    }
}
