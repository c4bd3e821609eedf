//! Nocedal-Wright interpolation line search.
//!
//! A sufficient decrease search which, instead of contracting the step by a
//! fixed factor, minimises a model of `phi` built from the values already
//! known. The first backtrack uses the quadratic interpolating `phi(0)`,
//! `phi'(0)` and `phi(alpha_0)`, all further backtracks use the cubic
//! interpolating `phi(0)`, `phi'(0)` and the last two trial values. Each new
//! step is safeguarded to lie in `[0.1 * alpha, 0.5 * alpha]` of the previous
//! one. Only function values are evaluated.
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5),
//! Section 3.5

use log::{debug, trace};
use nalgebra::{convert, RealField, ComplexField};
use num_traits::Zero;

use super::{backtrack::fallback_step, LineFunction, LineSearchError, LineSearchOptions, Step};
use crate::core::Differentiable;

fn safeguard<T: RealField + Copy>(candidate: Option<T>, alpha: T) -> T {
    let lower = alpha * convert(0.1);
    let upper = alpha * convert(0.5);

    match candidate {
        Some(candidate) if candidate > T::zero() => candidate.max(lower).min(upper),
        _ => upper,
    }
}

fn cubic_minimiser<T: RealField + Copy>(
    f0: T,
    d0: T,
    alpha_prev: T,
    f_prev: T,
    alpha: T,
    fa: T,
) -> Option<T> {
    let three: T = convert(3.0);

    let r_prev = f_prev - f0 - d0 * alpha_prev;
    let r = fa - f0 - d0 * alpha;
    let denom = alpha_prev * alpha_prev * alpha * alpha * (alpha - alpha_prev);
    if denom == T::zero() {
        return None;
    }

    let a = (alpha_prev * alpha_prev * r - alpha * alpha * r_prev) / denom;
    let b = (alpha * alpha * alpha * r_prev - alpha_prev * alpha_prev * alpha_prev * r) / denom;

    if a == T::zero() {
        // The cubic degenerates to a quadratic.
        if b == T::zero() {
            return None;
        }
        return Some(-d0 / (b + b));
    }

    let disc = b * b - three * a * d0;
    if disc < T::zero() {
        return None;
    }

    let candidate = (-b + disc.sqrt()) / (three * a);
    if candidate.is_finite() {
        Some(candidate)
    } else {
        None
    }
}

/// Runs the interpolation line search. See [module](self) documentation for
/// more details.
pub fn search<F: Differentiable>(
    line: &mut LineFunction<'_, F>,
    f0: F::Field,
    d0: F::Field,
    alpha_init: F::Field,
    options: &LineSearchOptions<F::Field>,
) -> Result<Step<F::Field>, LineSearchError> {
    let mu = options.mu();
    let mut alpha = alpha_init;
    let mut fa = line.value(alpha)?;

    // Previous trial, only known after the first backtrack.
    let mut prev: Option<(F::Field, F::Field)> = None;

    for iter in 0..options.max_iter() {
        if fa.is_finite() && fa <= f0 + mu * alpha * d0 {
            debug!("interpolation accepted alpha = {} after {} backtracks", alpha, iter);
            return Ok(Step::accepted(alpha));
        }

        let candidate = if !fa.is_finite() {
            // Nothing to interpolate, plain contraction.
            None
        } else {
            match prev {
                None => super::interpolate::quadratic_fafbga(
                    F::Field::zero(),
                    alpha,
                    f0,
                    fa,
                    d0,
                ),
                Some((alpha_prev, f_prev)) => {
                    cubic_minimiser(f0, d0, alpha_prev, f_prev, alpha, fa)
                }
            }
        };

        let alpha_new = safeguard(candidate, alpha);
        trace!("interpolation trial alpha = {} -> {}", alpha, alpha_new);

        if fa.is_finite() {
            prev = Some((alpha, fa));
        }
        alpha = alpha_new;
        fa = line.value(alpha)?;
    }

    if fa.is_finite() && fa <= f0 + mu * alpha * d0 {
        return Ok(Step::accepted(alpha));
    }

    let alpha = fallback_step(alpha_init, options.rho());
    debug!("interpolation exhausted, falling back to alpha = {}", alpha);
    Ok(Step::fallback(alpha))
}
