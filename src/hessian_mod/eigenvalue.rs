//! Eigenvalue modification.
//!
//! The symmetric eigendecomposition `H = V diag(lambda) V^T` is computed and
//! the whole spectrum is shifted by
//!
//! ```text
//! tau = max(0, delta - lambda_min),  delta = 1e-2
//! ```
//!
//! so that `M = H + tau I` has all eigenvalues at least `delta`. The step is
//! then `-V diag(1 / (lambda + tau)) V^T g`.

use log::debug;
use nalgebra::{convert, DMatrix, DVector, RealField, SymmetricEigen};
use num_traits::Zero;

use super::{HessianModError, ModifiedNewton};

/// Lower bound for the eigenvalues of the modified matrix.
const DELTA: f64 = 1e-2;

/// Computes the Newton step from the eigenvalue-modified Hessian.
pub fn newton_step<T: RealField + Copy>(
    h: &DMatrix<T>,
    g: &DVector<T>,
) -> Result<ModifiedNewton<T>, HessianModError> {
    let n = h.nrows();
    let delta: T = convert(DELTA);

    let eigen = SymmetricEigen::try_new(h.clone(), T::default_epsilon(), 0)
        .ok_or(HessianModError::NotConverged)?;

    let lambda_min = eigen
        .eigenvalues
        .iter()
        .copied()
        .reduce(|acc, l| acc.min(l))
        .unwrap_or_else(T::zero);

    let tau = (delta - lambda_min).max(T::zero());
    debug!("eigenvalue modification: lambda_min = {}, tau = {}", lambda_min, tau);

    let v = &eigen.eigenvectors;
    let mut coeffs = v.tr_mul(g);
    for (c, &l) in coeffs.iter_mut().zip(eigen.eigenvalues.iter()) {
        *c = -*c / (l + tau);
    }
    let step = v * coeffs;

    let mut matrix = h.clone();
    for i in 0..n {
        matrix[(i, i)] += tau;
    }

    Ok(ModifiedNewton { step, matrix })
}
