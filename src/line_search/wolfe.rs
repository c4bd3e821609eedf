//! Nocedal-Wright line search for the strong Wolfe conditions.
//!
//! The search has two phases. The bracketing phase increases the trial step
//! (doubling, up to `a_max`) until an interval containing steps satisfying
//! the strong Wolfe conditions
//!
//! ```text
//! phi(alpha) <= phi(0) + mu * alpha * phi'(0)
//! |phi'(alpha)| <= eta * |phi'(0)|
//! ```
//!
//! is known. The zoom phase then shrinks the interval using safeguarded cubic
//! interpolation until such a step is found.
//!
//! If not set, `a_max` is `1000 * alpha_init`.
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5),
//! Algorithms 3.5 and 3.6

use log::{debug, trace};
use nalgebra::{convert, RealField, ComplexField};
use num_traits::{One, Zero};

use super::{interpolate, LineFunction, LineSearchError, LineSearchOptions, Step};
use crate::core::Differentiable;

/// Point on the line with known value and slope.
#[derive(Debug, Clone, Copy)]
struct Trial<T> {
    alpha: T,
    value: T,
    slope: T,
}

/// Runs the strong Wolfe line search. See [module](self) documentation for
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
    let a_max = options
        .a_max()
        .unwrap_or_else(|| alpha_init * convert(1000.0));

    let origin = Trial {
        alpha: F::Field::zero(),
        value: f0,
        slope: d0,
    };

    let mut prev = origin;
    let mut alpha = alpha_init.min(a_max);

    for iter in 0..options.max_iter() {
        let (value, slope) = line.value_and_slope(alpha)?;
        let trial = Trial {
            alpha,
            value,
            slope,
        };

        // Non-finite value means the step is too long, the interval to search
        // in is known.
        if !value.is_finite()
            || value > f0 + mu * alpha * d0
            || (iter > 0 && value >= prev.value)
        {
            return zoom(line, origin, prev, trial, options);
        }

        if slope.abs() <= eta * d0.abs() {
            debug!("wolfe accepted alpha = {} in bracketing phase", alpha);
            return Ok(Step::accepted(alpha));
        }

        if slope >= F::Field::zero() {
            return zoom(line, origin, trial, prev, options);
        }

        if alpha >= a_max {
            debug!("wolfe reached a_max = {}", a_max);
            return Ok(Step::fallback(alpha));
        }

        prev = trial;
        alpha = (alpha + alpha).min(a_max);
        trace!("wolfe extrapolating to alpha = {}", alpha);
    }

    debug!("wolfe bracketing exhausted");
    Ok(Step::fallback(prev.alpha))
}

/// Zoom phase. The invariants are that `lo` satisfies sufficient decrease and
/// has the lowest value among trials satisfying it, and that `phi'(lo) * (hi
/// - lo) < 0`.
fn zoom<F: Differentiable>(
    line: &mut LineFunction<'_, F>,
    origin: Trial<F::Field>,
    mut lo: Trial<F::Field>,
    mut hi: Trial<F::Field>,
    options: &LineSearchOptions<F::Field>,
) -> Result<Step<F::Field>, LineSearchError> {
    let mu = options.mu();
    let eta = options.eta();
    let half: F::Field = convert(0.5);
    let margin: F::Field = convert(0.1);
    let far_margin = F::Field::one() - margin;

    for _ in 0..options.max_iter() {
        let width = hi.alpha - lo.alpha;
        let mid = lo.alpha + width * half;

        // Cubic interpolation kept away from the interval ends, bisection
        // otherwise.
        let alpha = if hi.value.is_finite() && hi.slope.is_finite() {
            match interpolate::cubic_int(
                lo.alpha, hi.alpha, lo.value, hi.value, lo.slope, hi.slope,
            ) {
                Some(candidate) => {
                    let dist_lo = (candidate - lo.alpha) / width;
                    if dist_lo > margin && dist_lo < far_margin {
                        candidate
                    } else {
                        mid
                    }
                }
                None => mid,
            }
        } else {
            mid
        };

        if alpha == lo.alpha || alpha == hi.alpha {
            debug!("wolfe zoom interval collapsed at alpha = {}", lo.alpha);
            return Ok(Step::fallback(lo.alpha));
        }

        let (value, slope) = line.value_and_slope(alpha)?;
        let trial = Trial {
            alpha,
            value,
            slope,
        };
        trace!("wolfe zoom trial alpha = {}, phi = {}", alpha, value);

        if !value.is_finite()
            || value > origin.value + mu * alpha * origin.slope
            || value >= lo.value
        {
            hi = trial;
        } else {
            if slope.abs() <= eta * origin.slope.abs() {
                debug!("wolfe accepted alpha = {} in zoom phase", alpha);
                return Ok(Step::accepted(alpha));
            }

            if slope * (hi.alpha - lo.alpha) >= F::Field::zero() {
                hi = lo;
            }

            lo = trial;
        }
    }

    debug!("wolfe zoom exhausted");
    Ok(Step::fallback(lo.alpha))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Function;
    use crate::testing::ExtendedRosenbrock;

    use nalgebra::DVector;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn strong_wolfe_on_rosenbrock() {
        let f = ExtendedRosenbrock::new(2);
        let mut options = LineSearchOptions::default();
        options.set_eta(0.1);
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..50 {
            let x = DVector::from_fn(2, |_, _| rng.gen_range(-2.0..2.0));
            let fx = f.apply(&x).unwrap();

            let mut g = DVector::zeros(2);
            f.gradient(&x, &mut g).unwrap();
            // Normalized steepest descent.
            let p = -&g / g.norm();
            let d0 = g.dot(&p);

            let mut line = LineFunction::new(&f, &x, &p);
            let step = search(&mut line, fx, d0, 1.0, &options).unwrap();
            let alpha = step.alpha();

            if step.converged() {
                let xa = &x + &p * alpha;
                let fa = f.apply(&xa).unwrap();
                let mut ga = DVector::zeros(2);
                f.gradient(&xa, &mut ga).unwrap();

                assert!(fa <= fx + options.mu() * alpha * d0);
                assert!(ga.dot(&p).abs() <= options.eta() * d0.abs());
            }

            assert!(line.g_evals() >= 1);
            assert_eq!(line.f_evals(), line.g_evals());
        }
    }

    #[test]
    fn extrapolates_short_initial_step() {
        use crate::testing::Sphere;
        use approx::assert_abs_diff_eq;
        use nalgebra::dvector;

        let f = Sphere::new(1);
        let x = dvector![10.0];
        let p = dvector![-1.0];
        let mut line = LineFunction::new(&f, &x, &p);
        let mut options = LineSearchOptions::default();
        options.set_eta(0.1);

        let step = search(&mut line, 100.0, -20.0, 1.0, &options).unwrap();

        assert!(step.converged());
        assert!(step.alpha() > 1.0);
        assert_abs_diff_eq!(step.alpha(), 10.0, epsilon = 1e-8);
    }
}
