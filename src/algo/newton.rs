//! Newton method.
//!
//! The direction is `p = -M^-1 g`, where `M` is the Hessian replaced by a
//! positive definite matrix using the selected [Hessian
//! modification](crate::hessian_mod). With
//! [`HessianMod::Unmodified`], the plain Newton step is used, which need not
//! be a descent direction.
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5),
//! Section 3.4

use nalgebra::{DVector, RealField};

use super::{DirectionError, DirectionFinder, DirectionState};
use crate::hessian_mod::HessianMod;

/// Newton direction finder.
///
/// See [module](self) documentation for more details.
#[derive(Debug, Clone)]
pub struct Newton<T: RealField + Copy> {
    hessian_mod: HessianMod,
    mach_acc: T,
}

impl<T: RealField + Copy> Newton<T> {
    /// Initializes the Newton direction finder with given Hessian
    /// modification.
    pub fn new(hessian_mod: HessianMod, mach_acc: T) -> Self {
        Self {
            hessian_mod,
            mach_acc,
        }
    }

    /// The Hessian modification in use.
    pub fn hessian_mod(&self) -> HessianMod {
        self.hessian_mod
    }
}

impl<T: RealField + Copy> DirectionFinder<T> for Newton<T> {
    const NAME: &'static str = "Newton";

    fn direction(&mut self, state: &DirectionState<'_, T>) -> Result<DVector<T>, DirectionError> {
        let hessian = state.hessian.ok_or(DirectionError::MissingHessian)?;
        let modified = self
            .hessian_mod
            .newton_step(hessian, state.grad, self.mach_acc)?;

        Ok(modified.step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn exact_on_quadratic() {
        let x = dvector![1.0, 2.0];
        let grad = dvector![2.0, 4.0];
        let hessian = dmatrix![2.0, 0.0; 0.0, 2.0];
        let state = DirectionState {
            x: &x,
            fx: 5.0,
            grad: &grad,
            hessian: Some(&hessian),
        };

        let mut newton = Newton::new(HessianMod::Cholesky, 1e-16);
        let p = newton.direction(&state).unwrap();

        // The full step lands in the minimum.
        assert_abs_diff_eq!(&x + p, dvector![0.0, 0.0]);
    }

    #[test]
    fn missing_hessian() {
        let x = dvector![1.0];
        let grad = dvector![2.0];
        let state = DirectionState {
            x: &x,
            fx: 1.0,
            grad: &grad,
            hessian: None,
        };

        let mut newton = Newton::new(HessianMod::Gmw, 1e-16);
        assert!(matches!(
            newton.direction(&state),
            Err(DirectionError::MissingHessian)
        ));
    }
}
