//! Backtracking line search.
//!
//! Starting from the initial step, the step is contracted by factor `rho`
//! until the sufficient decrease (Armijo) condition
//!
//! ```text
//! f(x + alpha * p) <= f(x) + mu * alpha * g . p
//! ```
//!
//! holds. Non-finite function values and points outside of the function
//! domain are treated as a failed test. If the condition is not met within
//! `max_iter` contractions, the search gives up with the fallback step
//! `alpha_init * rho^10` flagged as not converged.
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5),
//! Algorithm 3.1

use log::debug;
use nalgebra::{ComplexField, RealField};

use super::{LineFunction, LineSearchError, LineSearchOptions, Step};
use crate::core::Differentiable;

/// Fallback step after exhausting the iterations.
pub(crate) fn fallback_step<T: RealField + Copy>(alpha_init: T, rho: T) -> T {
    alpha_init * rho.powi(10)
}

/// Runs the backtracking line search. See [module](self) documentation for
/// more details.
pub fn search<F: Differentiable>(
    line: &mut LineFunction<'_, F>,
    f0: F::Field,
    d0: F::Field,
    alpha_init: F::Field,
    options: &LineSearchOptions<F::Field>,
) -> Result<Step<F::Field>, LineSearchError> {
    let mu = options.mu();
    let rho = options.rho();
    let mut alpha = alpha_init;

    for iter in 0..=options.max_iter() {
        let fa = line.value(alpha)?;

        if fa.is_finite() && fa <= f0 + mu * alpha * d0 {
            debug!("backtracking accepted alpha = {} after {} contractions", alpha, iter);
            return Ok(Step::accepted(alpha));
        }

        alpha *= rho;
    }

    let alpha = fallback_step(alpha_init, rho);
    debug!("backtracking exhausted, falling back to alpha = {}", alpha);
    Ok(Step::fallback(alpha))
}
