//! Cholesky factorization with added multiple of the identity.
//!
//! The factorization of `H + tau I` is attempted with `tau = 0` if all
//! diagonal entries of `H` are non-negative, otherwise with `tau = ||H||_F /
//! 2`. On failure, `tau` is raised to `max(2 tau, ||H||_F / 2)` and the
//! factorization retried. See Algorithm 3.3 in \[1\].
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5)

use log::{debug, trace};
use nalgebra::{convert, Cholesky, DMatrix, DVector, RealField};
use num_traits::Zero;

use super::{HessianModError, ModifiedNewton};

/// Maximum number of factorization attempts.
const MAX_ATTEMPTS: usize = 100;

fn shifted<T: RealField + Copy>(h: &DMatrix<T>, tau: T) -> DMatrix<T> {
    let mut m = h.clone();
    for i in 0..m.nrows() {
        m[(i, i)] += tau;
    }
    m
}

/// Computes the Newton step from the shifted Hessian.
pub fn newton_step<T: RealField + Copy>(
    h: &DMatrix<T>,
    g: &DVector<T>,
    mach_acc: T,
) -> Result<ModifiedNewton<T>, HessianModError> {
    let half_norm = h.norm() * convert(0.5);
    let min_diag = h
        .diagonal()
        .iter()
        .copied()
        .reduce(|acc, d| acc.min(d))
        .unwrap_or_else(T::zero);

    let mut tau = if min_diag >= T::zero() {
        T::zero()
    } else {
        half_norm
    };

    for attempt in 0..MAX_ATTEMPTS {
        let matrix = shifted(h, tau);

        if let Some(chol) = Cholesky::new(matrix.clone()) {
            debug!("cholesky modification: tau = {} after {} attempts", tau, attempt + 1);
            let step = chol.solve(&(-g));
            return Ok(ModifiedNewton { step, matrix });
        }

        trace!("cholesky factorization failed for tau = {}", tau);
        tau = (tau + tau).max(half_norm).max(mach_acc.sqrt());
    }

    Err(HessianModError::NotConverged)
}
