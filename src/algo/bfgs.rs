//! BFGS quasi-Newton method.
//!
//! The direction is `p = -H g`, where `H` approximates the inverse Hessian.
//! It starts as the identity and after each step, with `s = x+ - x` and `y =
//! g+ - g`, is updated by
//!
//! ```text
//! H+ = (I - rho s y^T) H (I - rho y s^T) + rho s s^T,  rho = 1 / (y^T s)
//! ```
//!
//! Before the first update, the identity is scaled by `y^T s / y^T y`. The
//! update is skipped when the curvature condition `y^T s > 0` does not hold,
//! which keeps `H` positive definite. No Hessian evaluations are needed.
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5),
//! Section 6.1

use log::trace;
use nalgebra::{DMatrix, DVector, RealField};
use num_traits::{One, Zero};

use super::{DirectionError, DirectionFinder, DirectionState};

/// BFGS direction finder.
///
/// See [module](self) documentation for more details.
#[derive(Debug, Clone)]
pub struct Bfgs<T: RealField + Copy> {
    inv_hessian: DMatrix<T>,
    updated: bool,
}

impl<T: RealField + Copy> Bfgs<T> {
    /// Initializes BFGS for a problem with `n` parameters.
    pub fn new(n: usize) -> Self {
        Self {
            inv_hessian: DMatrix::identity(n, n),
            updated: false,
        }
    }

    /// The current inverse Hessian approximation.
    pub fn inv_hessian(&self) -> &DMatrix<T> {
        &self.inv_hessian
    }
}

impl<T: RealField + Copy> DirectionFinder<T> for Bfgs<T> {
    const NAME: &'static str = "BFGS";

    fn direction(&mut self, state: &DirectionState<'_, T>) -> Result<DVector<T>, DirectionError> {
        Ok(-(&self.inv_hessian * state.grad))
    }

    fn update(
        &mut self,
        prev: &DirectionState<'_, T>,
        next: &DirectionState<'_, T>,
        _alpha: T,
        _p: &DVector<T>,
    ) {
        let s = next.x - prev.x;
        let y = next.grad - prev.grad;
        let ys = y.dot(&s);
        let yy = y.dot(&y);

        if !ys.is_finite() || ys <= T::zero() || !yy.is_finite() {
            trace!("bfgs update skipped, y^T s = {}", ys);
            return;
        }

        if !self.updated {
            self.inv_hessian.fill_with_identity();
            self.inv_hessian *= ys / yy;
            self.updated = true;
        }

        let rho = T::one() / ys;
        let hy = &self.inv_hessian * &y;
        let yhy = y.dot(&hy);

        // H+ = H - rho (s (Hy)^T + Hy s^T) + (rho^2 y^T H y + rho) s s^T.
        self.inv_hessian.ger(-rho, &s, &hy, T::one());
        self.inv_hessian.ger(-rho, &hy, &s, T::one());
        self.inv_hessian.ger(rho * rho * yhy + rho, &s, &s, T::one());
    }
}
