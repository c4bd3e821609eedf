//! Line search algorithms.
//!
//! Given the current point `x`, its function value, gradient and a descent
//! direction `p`, a line search finds a step length `alpha` such that
//! `x + alpha * p` gives acceptable decrease of the function. All searches
//! operate on the one-dimensional function `phi(alpha) = f(x + alpha * p)`,
//! represented by [`LineFunction`], which also counts evaluations.
//!
//! The available searches are:
//!
//! * [Backtracking](backtrack) -- sufficient decrease by repeated step
//!   contraction.
//! * [Nocedal-Wright interpolation](interpolation) -- sufficient decrease with
//!   quadratic and cubic interpolation of `phi`.
//! * [Nocedal-Wright Wolfe](wolfe) -- bracketing and zoom for the strong Wolfe
//!   conditions.
//! * [Moré-Thuente](more_thuente) -- safeguarded interval search for the
//!   strong Wolfe conditions with guaranteed sufficient decrease.
//! * No search -- the initial step is accepted as is.
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5)
//!
//! \[2\] [Line search algorithms with guaranteed sufficient
//! decrease](https://dl.acm.org/doi/10.1145/192115.192132)

pub mod backtrack;
pub mod interpolate;
pub mod interpolation;
pub mod more_thuente;
pub mod wolfe;

use std::fmt;
use std::str::FromStr;

use getset::{CopyGetters, Setters};
use nalgebra::{convert, DVector, RealField, ComplexField};
use num_traits::{One, Zero};
use thiserror::Error;

use crate::core::{Differentiable, ProblemError};
use crate::driver::ConfigError;

/// Error returned from a line search.
#[derive(Debug, Error)]
pub enum LineSearchError {
    /// The directional derivative at zero is positive.
    #[error("search direction is not a descent direction")]
    NotDescent,
    /// No finite function value could be found along the direction.
    #[error("non-finite function value along the search direction")]
    NonFinite,
    /// Error that occurred when evaluating the function.
    #[error("{0}")]
    Problem(#[from] ProblemError),
}

/// Options shared by all line searches.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct LineSearchOptions<T: RealField + Copy> {
    /// Sufficient decrease constant. Default: `1e-4`.
    mu: T,
    /// Curvature condition constant. Default: `0.9`.
    eta: T,
    /// Contraction factor for backtracking. Default: `0.5`.
    rho: T,
    /// Maximum number of trial steps. Default: `500`.
    max_iter: usize,
    /// Smallest allowed step length. Default: `0`.
    a_min: T,
    /// Largest allowed step length. Default: depends on the search (see
    /// [`wolfe`] and [`more_thuente`]).
    a_max: Option<T>,
    /// Relative width of the bracketing interval below which Moré-Thuente
    /// search stops. Default: `1e-10`.
    a_tol: T,
}

impl<T: RealField + Copy> Default for LineSearchOptions<T> {
    fn default() -> Self {
        Self {
            mu: convert(1e-4),
            eta: convert(0.9),
            rho: convert(0.5),
            max_iter: 500,
            a_min: T::zero(),
            a_max: None,
            a_tol: convert(1e-10),
        }
    }
}

/// Result of a line search.
#[derive(Debug, Clone, Copy, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct Step<T: Copy> {
    /// The accepted step length.
    alpha: T,
    /// Whether the acceptance conditions were satisfied. If not, `alpha` is a
    /// fallback value.
    converged: bool,
}

impl<T: Copy> Step<T> {
    /// Step satisfying the acceptance conditions.
    pub fn accepted(alpha: T) -> Self {
        Self {
            alpha,
            converged: true,
        }
    }

    /// Fallback step after the search ran out of iterations.
    pub fn fallback(alpha: T) -> Self {
        Self {
            alpha,
            converged: false,
        }
    }
}

/// The function `phi(alpha) = f(x + alpha * p)` restricted to a line.
pub struct LineFunction<'a, F: Differentiable> {
    f: &'a F,
    x: &'a DVector<F::Field>,
    p: &'a DVector<F::Field>,
    point: DVector<F::Field>,
    grad: DVector<F::Field>,
    f_evals: usize,
    g_evals: usize,
}

impl<'a, F: Differentiable> LineFunction<'a, F> {
    /// Creates the line function going from `x` in direction `p`.
    pub fn new(f: &'a F, x: &'a DVector<F::Field>, p: &'a DVector<F::Field>) -> Self {
        Self {
            f,
            x,
            p,
            point: x.clone_owned(),
            grad: DVector::zeros(x.len()),
            f_evals: 0,
            g_evals: 0,
        }
    }

    fn move_to(&mut self, alpha: F::Field) {
        self.point.copy_from(self.x);
        self.point.axpy(alpha, self.p, F::Field::one());
    }

    /// Function value `phi(alpha)`.
    ///
    /// A point outside of the function domain
    /// ([`ProblemError::InvalidValue`]) gives NaN, so the searches shrink the
    /// step the same way as for a non-finite value.
    pub fn value(&mut self, alpha: F::Field) -> Result<F::Field, ProblemError> {
        self.move_to(alpha);
        self.f_evals += 1;
        out_of_domain_as_nan(self.f.apply(&self.point))
    }

    /// Directional derivative `phi'(alpha) = g(x + alpha * p) . p`.
    pub fn slope(&mut self, alpha: F::Field) -> Result<F::Field, ProblemError> {
        self.move_to(alpha);
        self.directional_derivative()
    }

    /// Both `phi(alpha)` and `phi'(alpha)`. The gradient is not evaluated if
    /// the value is not finite, the slope is NaN then.
    pub fn value_and_slope(
        &mut self,
        alpha: F::Field,
    ) -> Result<(F::Field, F::Field), ProblemError> {
        let value = self.value(alpha)?;

        if !value.is_finite() {
            return Ok((value, nan()));
        }

        Ok((value, self.directional_derivative()?))
    }

    fn directional_derivative(&mut self) -> Result<F::Field, ProblemError> {
        self.g_evals += 1;
        match self.f.gradient(&self.point, &mut self.grad) {
            Ok(()) => Ok(self.grad.dot(self.p)),
            Err(ProblemError::InvalidValue) => Ok(nan()),
            Err(error) => Err(error),
        }
    }

    /// Number of function evaluations done so far.
    pub fn f_evals(&self) -> usize {
        self.f_evals
    }

    /// Number of gradient evaluations done so far.
    pub fn g_evals(&self) -> usize {
        self.g_evals
    }
}

fn nan<T: RealField + Copy>() -> T {
    T::zero() / T::zero()
}

fn out_of_domain_as_nan<T: RealField + Copy>(
    value: Result<T, ProblemError>,
) -> Result<T, ProblemError> {
    match value {
        Err(ProblemError::InvalidValue) => Ok(nan()),
        value => value,
    }
}

/// Line search selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearch {
    /// Accept the initial step.
    None,
    /// See [`backtrack`].
    Backtracking,
    /// See [`interpolation`].
    NocedalWrightInterpolation,
    /// See [`wolfe`].
    NocedalWrightWolfe,
    /// See [`more_thuente`].
    MoreThuente,
}

impl LineSearch {
    /// Finds the step length along the line, given `phi(0)` (`f0`), `phi'(0)`
    /// (`d0`) and the initial step `alpha_init`.
    pub fn search<F: Differentiable>(
        &self,
        line: &mut LineFunction<'_, F>,
        f0: F::Field,
        d0: F::Field,
        alpha_init: F::Field,
        options: &LineSearchOptions<F::Field>,
    ) -> Result<Step<F::Field>, LineSearchError> {
        if *self != LineSearch::None && d0 > F::Field::zero() {
            return Err(LineSearchError::NotDescent);
        }

        match self {
            LineSearch::None => Ok(Step::accepted(alpha_init)),
            LineSearch::Backtracking => backtrack::search(line, f0, d0, alpha_init, options),
            LineSearch::NocedalWrightInterpolation => {
                interpolation::search(line, f0, d0, alpha_init, options)
            }
            LineSearch::NocedalWrightWolfe => wolfe::search(line, f0, d0, alpha_init, options),
            LineSearch::MoreThuente => more_thuente::search(line, f0, d0, alpha_init, options),
        }
    }

    /// Canonical name of the search.
    pub fn name(&self) -> &'static str {
        match self {
            LineSearch::None => "no line search",
            LineSearch::Backtracking => "backtracking",
            LineSearch::NocedalWrightInterpolation => "nocedal-wright-interpolation",
            LineSearch::NocedalWrightWolfe => "nocedal-wright-wolfe",
            LineSearch::MoreThuente => "more-thuente",
        }
    }
}

impl fmt::Display for LineSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LineSearch {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_name(s).as_str() {
            "none" | "no line search" => Ok(LineSearch::None),
            "back" | "backtrack" | "backtracking" => Ok(LineSearch::Backtracking),
            "nwi" | "nocedal wright interpolation" | "nocedal wright int" => {
                Ok(LineSearch::NocedalWrightInterpolation)
            }
            "nww" | "nocedal wright wolfe" => Ok(LineSearch::NocedalWrightWolfe),
            "mt" | "more thuente" => Ok(LineSearch::MoreThuente),
            _ => Err(ConfigError::UnknownLineSearch(s.to_string())),
        }
    }
}

/// Lowercases the name and unifies `-` and `_` separators to spaces.
pub(crate) fn normalize_name(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .replace(['-', '_'], " ")
        .replace('é', "e")
}
