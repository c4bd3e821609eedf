//! Moré-Thuente line search.
//!
//! The search maintains an interval of uncertainty `[al, au]` and generates
//! safeguarded trial steps inside (or, before the minimiser is bracketed,
//! beyond) it by cubic, quadratic and secant interpolation. Until a step with
//! sufficient decrease and non-negative slope is seen, the auxiliary function
//!
//! ```text
//! psi(alpha) = phi(alpha) - mu * alpha * phi'(0)
//! ```
//!
//! drives the trial selection, which guarantees that a step satisfying
//! sufficient decrease is eventually found. The search terminates on the
//! strong Wolfe conditions, when the step reaches `a_min` or `a_max`, when
//! rounding errors prevent progress or when the interval becomes narrower
//! than `a_tol` relative to its upper end.
//!
//! If not set, `a_max` is `4 * max(1, alpha_init)`.
//!
//! # References
//!
//! \[1\] [Line search algorithms with guaranteed sufficient
//! decrease](https://dl.acm.org/doi/10.1145/192115.192132)

use log::{debug, trace};
use nalgebra::{convert, RealField, ComplexField};
use num_traits::{One, Zero};

use super::{interpolate, LineFunction, LineSearchError, LineSearchOptions, Step};
use crate::core::Differentiable;

/// Relative size of the interval which must be achieved in two iterations,
/// otherwise bisection is forced.
const SHRINK: f64 = 0.66;
/// Lower extrapolation factor before the minimiser is bracketed.
const EXTRAPOLATE_LOWER: f64 = 1.1;
/// Upper extrapolation factor before the minimiser is bracketed.
const EXTRAPOLATE_UPPER: f64 = 4.0;

#[derive(Debug, Clone, Copy)]
struct Point<T> {
    alpha: T,
    value: T,
    slope: T,
}

impl<T: RealField + Copy> Point<T> {
    fn shifted(&self, curv: T) -> Self {
        Self {
            alpha: self.alpha,
            value: self.value - curv * self.alpha,
            slope: self.slope - curv,
        }
    }
}

/// How the interval of uncertainty changes after a trial step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntervalUpdate {
    /// `au+ = at`.
    Upper,
    /// `al+ = at`.
    Lower,
    /// `al+ = at`, `au+ = al`.
    LowerSwap,
}

fn closer<T: RealField + Copy>(target: T, a: T, b: T) -> T {
    if (a - target).abs() < (b - target).abs() {
        a
    } else {
        b
    }
}

/// Selects the next trial step and determines the interval update. The
/// points may be the values of `phi` or of the auxiliary function `psi`.
fn select_trial<T: RealField + Copy>(
    t: Point<T>,
    l: Point<T>,
    u: Point<T>,
    bracketed: &mut bool,
    limits: (T, T),
) -> (T, IntervalUpdate) {
    let half: T = convert(0.5);
    let shrink: T = convert(SHRINK);
    let midpoint = l.alpha + (t.alpha - l.alpha) * half;

    let next = if t.value > l.value {
        // Case 1: higher function value, the minimiser is bracketed.
        *bracketed = true;

        let ac = interpolate::cubic_int(l.alpha, t.alpha, l.value, t.value, l.slope, t.slope);
        let aq = interpolate::quadratic_fafbga(l.alpha, t.alpha, l.value, t.value, l.slope);

        match (ac, aq) {
            (Some(ac), Some(aq)) => {
                if (ac - l.alpha).abs() < (aq - l.alpha).abs() {
                    ac
                } else {
                    (aq + ac) * half
                }
            }
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => midpoint,
        }
    } else if t.slope * l.slope < T::zero() {
        // Case 2: derivatives have opposite sign, the minimiser is bracketed.
        *bracketed = true;

        let ac = interpolate::cubic_int(l.alpha, t.alpha, l.value, t.value, l.slope, t.slope);
        let asec = interpolate::quadratic_gagb(l.alpha, t.alpha, l.slope, t.slope);

        match (ac, asec) {
            (Some(ac), Some(asec)) => {
                if (ac - t.alpha).abs() >= (asec - t.alpha).abs() {
                    ac
                } else {
                    asec
                }
            }
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => midpoint,
        }
    } else if t.slope.abs() <= l.slope.abs() {
        // Case 3: the derivative decreases in magnitude, extrapolate.
        let towards_limit = if t.alpha > l.alpha { limits.1 } else { limits.0 };

        let ac = match interpolate::cubic_ext(
            l.alpha, t.alpha, l.value, t.value, l.slope, t.slope,
        ) {
            Some((ac, beta2))
                if beta2 != T::zero() && (ac - t.alpha) * (t.alpha - l.alpha) > T::zero() =>
            {
                ac
            }
            _ => towards_limit,
        };
        let asec = interpolate::quadratic_gagb(l.alpha, t.alpha, l.slope, t.slope).unwrap_or(ac);

        if *bracketed {
            let next = closer(t.alpha, ac, asec);
            let bound = t.alpha + shrink * (u.alpha - t.alpha);

            if t.alpha > l.alpha {
                next.min(bound)
            } else {
                next.max(bound)
            }
        } else {
            let next = if (ac - t.alpha).abs() > (asec - t.alpha).abs() {
                ac
            } else {
                asec
            };

            next.max(limits.0).min(limits.1)
        }
    } else {
        // Case 4: the derivative does not decrease in magnitude.
        if *bracketed {
            interpolate::cubic_int(u.alpha, t.alpha, u.value, t.value, u.slope, t.slope)
                .unwrap_or_else(|| t.alpha + (u.alpha - t.alpha) * half)
        } else if t.alpha > l.alpha {
            limits.1
        } else {
            limits.0
        }
    };

    let update = if t.value > l.value {
        IntervalUpdate::Upper
    } else if t.slope * (l.alpha - t.alpha) > T::zero() {
        IntervalUpdate::Lower
    } else {
        IntervalUpdate::LowerSwap
    };

    (next, update)
}

/// Evaluates `phi` and `phi'`, halving the distance to `anchor` while the
/// values are not finite.
fn evaluate<F: Differentiable>(
    line: &mut LineFunction<'_, F>,
    mut alpha: F::Field,
    anchor: F::Field,
    max_iter: usize,
) -> Result<Point<F::Field>, LineSearchError> {
    let half: F::Field = convert(0.5);

    for _ in 0..=max_iter {
        let (value, slope) = line.value_and_slope(alpha)?;

        if value.is_finite() && slope.is_finite() {
            return Ok(Point {
                alpha,
                value,
                slope,
            });
        }

        trace!("more-thuente non-finite value at alpha = {}", alpha);
        alpha = anchor + (alpha - anchor) * half;
    }

    Err(LineSearchError::NonFinite)
}

/// Runs the Moré-Thuente line search. See [module](self) documentation for
/// more details.
pub fn search<F: Differentiable>(
    line: &mut LineFunction<'_, F>,
    f0: F::Field,
    d0: F::Field,
    alpha_init: F::Field,
    options: &LineSearchOptions<F::Field>,
) -> Result<Step<F::Field>, LineSearchError> {
    let mu = options.mu();
    let eta = options.eta();
    let a_tol = options.a_tol();
    let a_min = options.a_min();
    let a_max = options
        .a_max()
        .unwrap_or_else(|| alpha_init.max(F::Field::one()) * convert(4.0));

    let half: F::Field = convert(0.5);
    let shrink: F::Field = convert(SHRINK);
    let lower_factor: F::Field = convert(EXTRAPOLATE_LOWER);
    let upper_factor: F::Field = convert(EXTRAPOLATE_UPPER);

    let mut width = a_max - a_min;
    let mut width2 = width + width;
    let mut limits = (F::Field::zero(), alpha_init * convert(5.0));
    let mut bracketed = false;
    let mut modified = true;

    let origin = Point {
        alpha: F::Field::zero(),
        value: f0,
        slope: d0,
    };
    let mut lower = origin;
    let mut upper = origin;

    let curv = mu * d0;
    let mut trial = evaluate(
        line,
        alpha_init.max(a_min).min(a_max),
        F::Field::zero(),
        options.max_iter(),
    )?;

    for _ in 0..options.max_iter() {
        let alpha = trial.alpha;
        let suff_dec = f0 + alpha * curv;

        if modified && trial.value <= suff_dec && trial.slope >= F::Field::zero() {
            modified = false;
        }

        if trial.value <= suff_dec && trial.slope.abs() <= eta * d0.abs() {
            debug!("more-thuente accepted alpha = {}", alpha);
            return Ok(Step::accepted(alpha));
        }

        if alpha == a_min && (trial.value > suff_dec || trial.slope >= curv) {
            debug!("more-thuente stopped at a_min = {}", a_min);
            return Ok(Step::fallback(alpha));
        }

        if alpha == a_max && trial.value <= suff_dec && trial.slope <= curv {
            debug!("more-thuente stopped at a_max = {}", a_max);
            return Ok(Step::accepted(alpha));
        }

        if bracketed {
            if alpha <= limits.0 || alpha >= limits.1 {
                debug!("more-thuente stopped by rounding errors at alpha = {}", alpha);
                return Ok(Step::fallback(alpha));
            }

            if limits.1 - limits.0 <= a_tol * limits.1 {
                debug!("more-thuente interval width below tolerance at alpha = {}", alpha);
                return Ok(Step::fallback(alpha));
            }
        }

        let use_psi = modified && trial.value <= lower.value && trial.value > suff_dec;
        let (mut next, update) = if use_psi {
            select_trial(
                trial.shifted(curv),
                lower.shifted(curv),
                upper.shifted(curv),
                &mut bracketed,
                limits,
            )
        } else {
            select_trial(trial, lower, upper, &mut bracketed, limits)
        };

        match update {
            IntervalUpdate::Upper => upper = trial,
            IntervalUpdate::Lower => lower = trial,
            IntervalUpdate::LowerSwap => {
                upper = lower;
                lower = trial;
            }
        }

        if bracketed {
            let size = (upper.alpha - lower.alpha).abs();
            if size >= shrink * width2 {
                next = lower.alpha + (upper.alpha - lower.alpha) * half;
            }
            width2 = width;
            width = size;

            limits = (
                lower.alpha.min(upper.alpha),
                lower.alpha.max(upper.alpha),
            );
        } else {
            limits = (
                next + lower_factor * (next - lower.alpha),
                next + upper_factor * (next - lower.alpha),
            );
        }

        if bracketed
            && (next <= limits.0 || next >= limits.1 || limits.1 - limits.0 <= a_tol * limits.1)
        {
            next = lower.alpha;
        }

        next = next.max(a_min).min(a_max);
        trace!(
            "more-thuente trial alpha = {} (bracketed = {}, psi = {})",
            next,
            bracketed,
            use_psi
        );

        trial = evaluate(line, next, lower.alpha, options.max_iter())?;
    }

    debug!("more-thuente exhausted");
    if lower.alpha > F::Field::zero() {
        Ok(Step::fallback(lower.alpha))
    } else {
        Ok(Step::fallback(trial.alpha))
    }
}
