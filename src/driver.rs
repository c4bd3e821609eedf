//! High-level API for minimisation.
//!
//! This module contains the driver that encapsulates the configuration
//! validation and runs the iterative process: each iteration asks the
//! [direction finder](crate::algo) for a descent direction, the [line
//! search](crate::line_search) for a step length, evaluates the function and
//! the gradient in the new point and checks the convergence tests.
//!
//! The simplest way of using the driver is to initialize it with the
//! defaults (Newton method with GMW Hessian modification and Moré-Thuente
//! line search):
//!
//! ```rust
//! use minfit::nalgebra::{DMatrix, DVector};
//! use minfit::{MinimiserDriver, Objective, Termination};
//!
//! let f = Objective::new(
//!     2,
//!     |x: &DVector<f64>| x.dot(x),
//!     |x: &DVector<f64>| x * 2.0,
//! )
//! .with_hessian(|_: &DVector<f64>| DMatrix::identity(2, 2) * 2.0);
//!
//! let driver = MinimiserDriver::builder(&f)
//!     .with_initial(vec![3.0, -4.0])
//!     .build()?;
//!
//! let result = driver.minimise();
//! assert_eq!(result.termination, Termination::FunctionTolerance);
//! # Ok::<(), minfit::ConfigError>(())
//! ```
//!
//! If you need to specify additional settings, use [`MinimiserOptions`]:
//!
//! ```rust
//! use minfit::nalgebra::DVector;
//! use minfit::{MinimiserDriver, MinimiserOptions, Objective};
//!
//! let f = Objective::new(
//!     2,
//!     |x: &DVector<f64>| (x[0] - 1.0).powi(2) + 10.0 * (x[1] + 2.0).powi(2),
//!     |x: &DVector<f64>| DVector::from_vec(vec![2.0 * (x[0] - 1.0), 20.0 * (x[1] + 2.0)]),
//! );
//!
//! let mut options = MinimiserOptions::from_names("bfgs", &["nocedal-wright-wolfe"])?;
//! options.set_grad_tol(Some(1e-10));
//!
//! let driver = MinimiserDriver::builder(&f)
//!     .with_initial(vec![0.0, 0.0])
//!     .with_options(options)
//!     .build()?;
//!
//! let result = driver.minimise_with(|state| {
//!     println!("{}: f = {}", state.iter(), state.fx());
//! });
//! assert!((result.x[0] - 1.0).abs() < 1e-6);
//! # Ok::<(), minfit::ConfigError>(())
//! ```

use std::fmt;

use getset::{CopyGetters, Setters};
use log::{debug, info, trace, warn};
use nalgebra::{convert, DMatrix, DVector, RealField, ComplexField};
use num_traits::{One, Zero};
use thiserror::Error;

use crate::algo::{Algorithm, DirectionState};
use crate::core::{Differentiable, Problem, ProblemError};
use crate::hessian_mod::HessianMod;
use crate::line_search::{LineFunction, LineSearch, LineSearchOptions};

/// Error in the configuration of the minimisation. Always detected before
/// any function evaluation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Unrecognised algorithm name.
    #[error("unknown algorithm '{0}'")]
    UnknownAlgorithm(String),
    /// Unrecognised line search name.
    #[error("unknown line search '{0}'")]
    UnknownLineSearch(String),
    /// Unrecognised Hessian modification name.
    #[error("unknown hessian modification '{0}'")]
    UnknownHessianMod(String),
    /// Option which is neither a line search nor a Hessian modification.
    #[error("unknown minimiser option '{0}'")]
    UnknownOption(String),
    /// BFGS does not use the Hessian, so it cannot be modified.
    #[error("hessian modification cannot be used with bfgs")]
    HessianModWithBfgs,
    /// The algorithm requires the Hessian which the function does not
    /// provide.
    #[error("algorithm requires the hessian")]
    MissingHessian,
    /// Neither function nor gradient tolerance is set.
    #[error("no convergence test, set function or gradient tolerance")]
    NoConvergenceTest,
    /// The initial point has a wrong number of parameters.
    #[error("expected {expected} parameters, got {actual}")]
    DimensionMismatch {
        /// Dimension of the problem.
        expected: usize,
        /// Length of the initial point.
        actual: usize,
    },
    /// The constraints are defined over a different number of parameters
    /// than the problem.
    #[error("constraints over {actual} parameters, problem has {expected}")]
    ConstraintDimensionMismatch {
        /// Dimension of the problem.
        expected: usize,
        /// Dimension of the constraints.
        actual: usize,
    },
    /// Numeric parameter out of its valid range.
    #[error("invalid value of parameter '{0}'")]
    InvalidParameter(&'static str),
}

/// Options for the [`MinimiserDriver`].
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct MinimiserOptions<T: RealField + Copy> {
    /// The direction finder. Default: [`Algorithm::Newton`].
    algorithm: Algorithm,
    /// The line search. Default: [`Algorithm::default_line_search`] of the
    /// algorithm.
    line_search: Option<LineSearch>,
    /// The Hessian modification, only used by Newton method. Default:
    /// [`HessianMod::Gmw`].
    hessian_mod: Option<HessianMod>,
    /// Function tolerance, the minimisation stops when `|f+ - f| <=
    /// func_tol`. Default: `1e-25`.
    func_tol: Option<T>,
    /// Gradient tolerance, the minimisation stops when `||g+||_inf <=
    /// grad_tol * (1 + |f+|)`. Default: none.
    grad_tol: Option<T>,
    /// Maximum number of iterations. Default: `1000000`.
    max_iter: usize,
    /// Initial step length of the line search. Default: `1`.
    a0: T,
    /// Sufficient decrease constant of the line search. Default: `1e-4`.
    mu: T,
    /// Curvature condition constant of the line search. Default:
    /// [`Algorithm::default_eta`] of the algorithm.
    eta: Option<T>,
    /// Contraction factor of the backtracking line search. Default: `0.5`.
    rho: T,
    /// Maximum number of trial steps in a line search. Default: `500`.
    line_search_max_iter: usize,
    /// Machine accuracy used by the Hessian modifications. Default: `1e-16`.
    mach_acc: T,
    /// Verbosity of the driver logging, from `0` (silent) to `3`. Default:
    /// `0`.
    verbosity: u8,
}

impl<T: RealField + Copy> Default for MinimiserOptions<T> {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Newton,
            line_search: None,
            hessian_mod: None,
            func_tol: Some(convert(1e-25)),
            grad_tol: None,
            max_iter: 1_000_000,
            a0: T::one(),
            mu: convert(1e-4),
            eta: None,
            rho: convert(0.5),
            line_search_max_iter: 500,
            mach_acc: convert(1e-16),
            verbosity: 0,
        }
    }
}

impl<T: RealField + Copy> MinimiserOptions<T> {
    /// Options for the algorithm of given name, with additional options each
    /// naming a line search or a Hessian modification.
    ///
    /// ```rust
    /// use minfit::algo::Algorithm;
    /// use minfit::{HessianMod, LineSearch, MinimiserOptions};
    ///
    /// let options = MinimiserOptions::<f64>::from_names("newton", &["back", "eigen"]).unwrap();
    ///
    /// assert_eq!(options.algorithm(), Algorithm::Newton);
    /// assert_eq!(options.line_search(), Some(LineSearch::Backtracking));
    /// assert_eq!(options.hessian_mod(), Some(HessianMod::Eigenvalue));
    /// ```
    pub fn from_names(algorithm: &str, options: &[&str]) -> Result<Self, ConfigError> {
        let mut this = Self {
            algorithm: algorithm.parse()?,
            ..Self::default()
        };

        for option in options {
            if let Ok(line_search) = option.parse::<LineSearch>() {
                this.line_search = Some(line_search);
            } else if let Ok(hessian_mod) = option.parse::<HessianMod>() {
                this.hessian_mod = Some(hessian_mod);
            } else {
                return Err(ConfigError::UnknownOption(option.to_string()));
            }
        }

        Ok(this)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let zero = T::zero();
        let one = T::one();

        if self.func_tol.is_none() && self.grad_tol.is_none() {
            return Err(ConfigError::NoConvergenceTest);
        }

        if self.func_tol.map_or(false, |tol| !(tol >= zero)) {
            return Err(ConfigError::InvalidParameter("func_tol"));
        }

        if self.grad_tol.map_or(false, |tol| !(tol >= zero)) {
            return Err(ConfigError::InvalidParameter("grad_tol"));
        }

        if !(self.a0 > zero) || !self.a0.is_finite() {
            return Err(ConfigError::InvalidParameter("a0"));
        }

        if !(self.mu > zero && self.mu < one) {
            return Err(ConfigError::InvalidParameter("mu"));
        }

        if let Some(eta) = self.eta {
            if !(eta > self.mu && eta < one) {
                return Err(ConfigError::InvalidParameter("eta"));
            }
        }

        if !(self.rho > zero && self.rho < one) {
            return Err(ConfigError::InvalidParameter("rho"));
        }

        if self.line_search_max_iter == 0 {
            return Err(ConfigError::InvalidParameter("line_search_max_iter"));
        }

        if !(self.mach_acc > zero) {
            return Err(ConfigError::InvalidParameter("mach_acc"));
        }

        if self.algorithm == Algorithm::Bfgs && self.hessian_mod.is_some() {
            return Err(ConfigError::HessianModWithBfgs);
        }

        Ok(())
    }
}

/// Reason of the termination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Function tolerance test satisfied.
    FunctionTolerance,
    /// Gradient tolerance test satisfied.
    GradientTolerance,
    /// Maximum number of iterations reached.
    MaxIterations,
    /// The problem has no parameters, the function was only evaluated.
    NoParameters,
    /// Unrecoverable numerical failure. The result holds the last iterate
    /// with finite function value.
    Fatal(String),
}

impl Termination {
    /// Whether a convergence test was satisfied.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            Termination::FunctionTolerance | Termination::GradientTolerance
        )
    }

    /// Whether the minimisation failed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Termination::Fatal(_))
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::FunctionTolerance => f.write_str("function tolerance reached"),
            Termination::GradientTolerance => f.write_str("gradient tolerance reached"),
            Termination::MaxIterations => f.write_str("max iterations reached"),
            Termination::NoParameters => f.write_str("no parameters to minimise"),
            Termination::Fatal(reason) => write!(f, "fatal: {}", reason),
        }
    }
}

/// Result of the minimisation.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminationResult<T: RealField + Copy> {
    /// The final point.
    pub x: DVector<T>,
    /// Function value in the final point.
    pub fx: T,
    /// Number of iterations.
    pub iterations: usize,
    /// Number of function evaluations.
    pub f_count: usize,
    /// Number of gradient evaluations.
    pub g_count: usize,
    /// Number of Hessian evaluations.
    pub h_count: usize,
    /// Reason of the termination.
    pub termination: Termination,
}

/// Builder for the [`MinimiserDriver`].
pub struct MinimiserBuilder<'a, F: Problem> {
    f: &'a F,
    x0: Vec<F::Field>,
    options: MinimiserOptions<F::Field>,
}

impl<'a, F: Differentiable> MinimiserBuilder<'a, F> {
    /// Sets the initial point from which the iterative process starts.
    /// Default: zeros.
    pub fn with_initial(mut self, x0: Vec<F::Field>) -> Self {
        self.x0 = x0;
        self
    }

    /// Sets the options.
    pub fn with_options(mut self, options: MinimiserOptions<F::Field>) -> Self {
        self.options = options;
        self
    }

    /// Validates the configuration and builds the [`MinimiserDriver`].
    pub fn build(self) -> Result<MinimiserDriver<'a, F>, ConfigError> {
        let Self { f, x0, options } = self;

        if x0.len() != f.dim() {
            return Err(ConfigError::DimensionMismatch {
                expected: f.dim(),
                actual: x0.len(),
            });
        }

        options.validate()?;

        let algorithm = options.algorithm();
        if algorithm.uses_hessian() && !f.has_hessian() {
            return Err(ConfigError::MissingHessian);
        }

        let line_search = options
            .line_search()
            .unwrap_or_else(|| algorithm.default_line_search());
        let hessian_mod = options.hessian_mod().unwrap_or(HessianMod::Gmw);
        let eta = options.eta().unwrap_or_else(|| algorithm.default_eta());

        if eta <= options.mu() {
            return Err(ConfigError::InvalidParameter("eta"));
        }

        let mut ls_options = LineSearchOptions::default();
        ls_options
            .set_mu(options.mu())
            .set_eta(eta)
            .set_rho(options.rho())
            .set_max_iter(options.line_search_max_iter());

        Ok(MinimiserDriver {
            f,
            x0: DVector::from_vec(x0),
            options,
            line_search,
            hessian_mod,
            ls_options,
        })
    }
}

/// The driver for the process of minimisation.
///
/// Use [`MinimiserDriver::builder`] for the construction. For the usage of
/// the driver, see [module](self) documentation.
pub struct MinimiserDriver<'a, F: Problem> {
    f: &'a F,
    x0: DVector<F::Field>,
    options: MinimiserOptions<F::Field>,
    line_search: LineSearch,
    hessian_mod: HessianMod,
    ls_options: LineSearchOptions<F::Field>,
}

impl<'a, F: Differentiable> MinimiserDriver<'a, F> {
    /// Returns the builder for specifying the initial point and options.
    pub fn builder(f: &'a F) -> MinimiserBuilder<'a, F> {
        MinimiserBuilder {
            f,
            x0: vec![F::Field::zero(); f.dim()],
            options: MinimiserOptions::default(),
        }
    }

    /// Returns reference to the initial point.
    pub fn x0(&self) -> &[F::Field] {
        self.x0.as_slice()
    }

    /// Returns the options.
    pub fn options(&self) -> &MinimiserOptions<F::Field> {
        &self.options
    }

    /// The line search in use.
    pub fn line_search(&self) -> LineSearch {
        self.line_search
    }

    /// The Hessian modification in use (only relevant for Newton method).
    pub fn hessian_mod(&self) -> HessianMod {
        self.hessian_mod
    }

    /// Runs the minimisation from the initial point.
    pub fn minimise(&self) -> TerminationResult<F::Field> {
        self.minimise_with(|_| {})
    }

    /// Runs the minimisation from the initial point, calling `observer` after
    /// every iteration.
    pub fn minimise_with<O>(&self, mut observer: O) -> TerminationResult<F::Field>
    where
        O: FnMut(&MinimiserIterState<'_, F::Field>),
    {
        Run::new(self).execute(&mut observer)
    }
}

/// State of the minimisation after an iteration.
pub struct MinimiserIterState<'a, T: RealField + Copy> {
    iter: usize,
    x: &'a DVector<T>,
    fx: T,
    grad: &'a DVector<T>,
    alpha: T,
}

impl<'a, T: RealField + Copy> MinimiserIterState<'a, T> {
    /// Returns the current iteration number, starting from one.
    pub fn iter(&self) -> usize {
        self.iter
    }

    /// Returns reference to the current point.
    pub fn x(&self) -> &[T] {
        self.x.as_slice()
    }

    /// Returns the current function value.
    pub fn fx(&self) -> T {
        self.fx
    }

    /// Returns reference to the current gradient.
    pub fn grad(&self) -> &[T] {
        self.grad.as_slice()
    }

    /// Returns the step length of the last line search.
    pub fn alpha(&self) -> T {
        self.alpha
    }
}

/// Mutable state of a single minimisation run.
struct Run<'d, 'a, F: Differentiable> {
    driver: &'d MinimiserDriver<'a, F>,
    f_count: usize,
    g_count: usize,
    h_count: usize,
    iterations: usize,
}

impl<'d, 'a, F: Differentiable> Run<'d, 'a, F> {
    fn new(driver: &'d MinimiserDriver<'a, F>) -> Self {
        Self {
            driver,
            f_count: 0,
            g_count: 0,
            h_count: 0,
            iterations: 0,
        }
    }

    fn verbosity(&self) -> u8 {
        self.driver.options.verbosity()
    }

    fn finish(
        &self,
        x: DVector<F::Field>,
        fx: F::Field,
        termination: Termination,
    ) -> TerminationResult<F::Field> {
        if self.verbosity() >= 1 {
            info!(
                "{} terminated after {} iterations: {} (f = {})",
                self.driver.options.algorithm(),
                self.iterations,
                termination,
                fx
            );
        }

        TerminationResult {
            x,
            fx,
            iterations: self.iterations,
            f_count: self.f_count,
            g_count: self.g_count,
            h_count: self.h_count,
            termination,
        }
    }

    fn fatal(
        &self,
        x: DVector<F::Field>,
        fx: F::Field,
        reason: impl fmt::Display,
    ) -> TerminationResult<F::Field> {
        self.finish(x, fx, Termination::Fatal(reason.to_string()))
    }

    fn value(&mut self, x: &DVector<F::Field>) -> Result<F::Field, ProblemError> {
        self.f_count += 1;
        let fx = self.driver.f.apply(x)?;

        if fx.is_finite() {
            Ok(fx)
        } else {
            Err(ProblemError::InvalidValue)
        }
    }

    fn gradient(
        &mut self,
        x: &DVector<F::Field>,
        grad: &mut DVector<F::Field>,
    ) -> Result<(), ProblemError> {
        self.g_count += 1;
        self.driver.f.gradient(x, grad)?;

        if grad.iter().all(|g| g.is_finite()) {
            Ok(())
        } else {
            Err(ProblemError::InvalidValue)
        }
    }

    fn hessian(&mut self, x: &DVector<F::Field>) -> Result<Option<DMatrix<F::Field>>, ProblemError> {
        if !self.driver.options.algorithm().uses_hessian() {
            return Ok(None);
        }

        let n = x.len();
        let mut hes = DMatrix::zeros(n, n);
        self.h_count += 1;
        self.driver.f.hessian(x, &mut hes)?;
        Ok(Some(hes))
    }

    fn execute<O>(mut self, observer: &mut O) -> TerminationResult<F::Field>
    where
        O: FnMut(&MinimiserIterState<'_, F::Field>),
    {
        let driver = self.driver;
        let options = &driver.options;
        let algorithm = options.algorithm();
        let x0 = driver.x0.clone_owned();
        let n = x0.len();
        let mut finder = algorithm.direction_finder(n, driver.hessian_mod, options.mach_acc());

        if self.verbosity() >= 1 {
            info!(
                "{}: minimising {} parameters ({}, {}, {})",
                finder.name(),
                n,
                algorithm,
                driver.line_search,
                driver.hessian_mod
            );
        }

        // Setup.
        let mut fx = match self.value(&x0) {
            Ok(fx) => fx,
            Err(error) => {
                let nan = F::Field::zero() / F::Field::zero();
                return self.fatal(x0, nan, format!("initial function value: {}", error));
            }
        };

        if n == 0 {
            return self.finish(x0, fx, Termination::NoParameters);
        }

        let mut grad = DVector::zeros(n);
        if let Err(error) = self.gradient(&x0, &mut grad) {
            return self.fatal(x0, fx, format!("initial gradient: {}", error));
        }

        let mut hessian = match self.hessian(&x0) {
            Ok(hessian) => hessian,
            Err(error) => return self.fatal(x0, fx, format!("initial hessian: {}", error)),
        };

        if options.max_iter() == 0 {
            return self.finish(x0, fx, Termination::MaxIterations);
        }

        let mut x = x0;
        let mut x_new = DVector::zeros(n);
        let mut grad_new = DVector::zeros(n);

        loop {
            let state = DirectionState {
                x: &x,
                fx,
                grad: &grad,
                hessian: hessian.as_ref(),
            };

            let p = match finder.direction(&state) {
                Ok(p) => p,
                Err(error) => return self.fatal(x, fx, error),
            };

            let d0 = grad.dot(&p);
            let mut line = LineFunction::new(driver.f, &x, &p);
            let step =
                driver
                    .line_search
                    .search(&mut line, fx, d0, options.a0(), &driver.ls_options);
            self.f_count += line.f_evals();
            self.g_count += line.g_evals();

            let step = match step {
                Ok(step) => step,
                Err(error) => return self.fatal(x, fx, error),
            };

            if !step.converged() && self.verbosity() >= 1 {
                warn!(
                    "{} line search did not converge, using alpha = {}",
                    driver.line_search,
                    step.alpha()
                );
            }

            let alpha = step.alpha();
            x_new.copy_from(&x);
            x_new.axpy(alpha, &p, F::Field::one());

            if !step.converged() && (alpha == F::Field::zero() || x_new == x) {
                // No step could be made. This is only convergence when the
                // decrease predicted along the direction is below the function
                // tolerance.
                let predicted = (options.a0() * d0).abs();
                if options.func_tol().map_or(false, |tol| predicted <= tol) {
                    return self.finish(x, fx, Termination::FunctionTolerance);
                }

                return self.fatal(
                    x,
                    fx,
                    format!("{} line search failed to find a step", driver.line_search),
                );
            }

            let fx_new = match self.value(&x_new) {
                Ok(fx_new) => fx_new,
                Err(error) => return self.fatal(x, fx, error),
            };

            if let Err(error) = self.gradient(&x_new, &mut grad_new) {
                return self.fatal(x, fx, error);
            }

            self.iterations += 1;

            if self.verbosity() >= 2 {
                debug!(
                    "iteration {}: f = {}, alpha = {}, |g| = {}",
                    self.iterations,
                    fx_new,
                    alpha,
                    grad_new.amax()
                );
            }
            if self.verbosity() >= 3 {
                trace!("iteration {}: x = {}, p = {}", self.iterations, x_new, p);
            }

            observer(&MinimiserIterState {
                iter: self.iterations,
                x: &x_new,
                fx: fx_new,
                grad: &grad_new,
                alpha,
            });

            // Convergence tests.
            if let Some(func_tol) = options.func_tol() {
                if (fx - fx_new).abs() <= func_tol {
                    return self.finish(x_new, fx_new, Termination::FunctionTolerance);
                }
            }

            if let Some(grad_tol) = options.grad_tol() {
                if grad_new.amax() <= grad_tol * (F::Field::one() + fx_new.abs()) {
                    return self.finish(x_new, fx_new, Termination::GradientTolerance);
                }

                if options.func_tol().is_none() && fx_new == fx {
                    return self.finish(x_new, fx_new, Termination::GradientTolerance);
                }
            }

            if self.iterations >= options.max_iter() {
                return self.finish(x_new, fx_new, Termination::MaxIterations);
            }

            let hessian_new = match self.hessian(&x_new) {
                Ok(hessian_new) => hessian_new,
                Err(error) => return self.fatal(x_new, fx_new, error),
            };

            let next = DirectionState {
                x: &x_new,
                fx: fx_new,
                grad: &grad_new,
                hessian: hessian_new.as_ref(),
            };
            finder.update(&state, &next, alpha, &p);

            std::mem::swap(&mut x, &mut x_new);
            std::mem::swap(&mut grad, &mut grad_new);
            fx = fx_new;
            hessian = hessian_new;
        }
    }
}

/// Minimises the function from the initial point `x0` with given options.
///
/// Shortcut for building [`MinimiserDriver`] and running
/// [`minimise`](MinimiserDriver::minimise).
pub fn minimise<F: Differentiable>(
    f: &F,
    x0: Vec<F::Field>,
    options: &MinimiserOptions<F::Field>,
) -> Result<TerminationResult<F::Field>, ConfigError> {
    let driver = MinimiserDriver::builder(f)
        .with_initial(x0)
        .with_options(options.clone())
        .build()?;

    Ok(driver.minimise())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::CgFormula;
    use crate::core::{Function, Objective};
    use crate::testing::{ExtendedRosenbrock, Quadratic, Sphere};

    use approx::assert_abs_diff_eq;
    use nalgebra::dvector;

    #[test]
    fn newton_cholesky_on_sphere() {
        for n in 2..=5 {
            let f = Sphere::new(n);
            let x0: Vec<f64> = (0..n).map(|i| 3.0 - i as f64 * 1.7).collect();

            let options = MinimiserOptions::from_names("newton", &["chol"]).unwrap();
            let result = minimise(&f, x0, &options).unwrap();

            assert_eq!(result.termination, Termination::FunctionTolerance);
            assert!(result.iterations <= n + 2);
            assert_abs_diff_eq!(result.x, DVector::zeros(n), epsilon = 1e-8);
            assert_abs_diff_eq!(result.fx, 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn monotone_decrease_on_convex_quadratic() {
        let f = Quadratic::new();
        let algorithms = ["newton", "bfgs", "fr", "pr", "pr+", "hs", "cd", "sd"];
        let line_searches = [
            "none",
            "backtracking",
            "nocedal-wright-interpolation",
            "nocedal-wright-wolfe",
            "more-thuente",
        ];

        for algorithm in algorithms {
            for line_search in line_searches {
                if line_search == "none" && algorithm != "newton" {
                    continue;
                }

                let mut options = MinimiserOptions::from_names(algorithm, &[line_search]).unwrap();
                options.set_max_iter(200);

                let driver = MinimiserDriver::builder(&f)
                    .with_initial(vec![3.0, -2.0, 1.0])
                    .with_options(options)
                    .build()
                    .unwrap();

                let mut prev = f.apply(&dvector![3.0, -2.0, 1.0]).unwrap();
                let result = driver.minimise_with(|state| {
                    assert!(
                        state.fx() <= prev,
                        "{} with {}: {} > {}",
                        algorithm,
                        line_search,
                        state.fx(),
                        prev
                    );
                    prev = state.fx();
                });

                assert!(!result.termination.is_fatal(), "{} with {}", algorithm, line_search);
            }
        }
    }

    #[test]
    fn bfgs_on_rosenbrock() {
        let f = ExtendedRosenbrock::new(2);
        let mut options = MinimiserOptions::from_names("bfgs", &[]).unwrap();
        options.set_func_tol(None).set_grad_tol(Some(1e-8));

        let result = minimise(&f, vec![-1.2, 1.0], &options).unwrap();

        assert!(result.termination.is_converged());
        assert_eq!(result.h_count, 0);
        assert_abs_diff_eq!(result.x, dvector![1.0, 1.0], epsilon = 1e-4);
    }

    #[test]
    fn newton_gmw_on_rosenbrock() {
        let f = ExtendedRosenbrock::new(4);
        let options = MinimiserOptions::default();

        let result = minimise(&f, vec![-1.2, 1.0, -1.2, 1.0], &options).unwrap();

        assert!(result.termination.is_converged());
        assert_abs_diff_eq!(result.x, dvector![1.0, 1.0, 1.0, 1.0], epsilon = 1e-6);
        assert_eq!(result.h_count, result.iterations);
    }

    #[test]
    fn idempotent() {
        let f = ExtendedRosenbrock::new(2);
        let options =
            MinimiserOptions::from_names("conjugate gradient", &["more-thuente"]).unwrap();
        let driver = MinimiserDriver::builder(&f)
            .with_initial(vec![-1.2, 1.0])
            .with_options(options)
            .build()
            .unwrap();

        assert_eq!(driver.minimise(), driver.minimise());
    }

    #[test]
    fn counters() {
        let f = Sphere::new(3);

        for algorithm in ["newton", "bfgs", "cg", "cd", "sd"] {
            let mut options = MinimiserOptions::from_names(algorithm, &[]).unwrap();
            options.set_max_iter(50);

            let result = minimise(&f, vec![1.0, 2.0, 3.0], &options).unwrap();

            assert!(result.iterations > 0);
            assert!(result.f_count >= result.iterations);
            assert!(result.g_count >= result.iterations);
        }
    }

    #[test]
    fn max_iterations() {
        let f = ExtendedRosenbrock::new(2);
        let mut options = MinimiserOptions::from_names("sd", &[]).unwrap();
        options.set_max_iter(5);

        let result = minimise(&f, vec![-1.2, 1.0], &options).unwrap();

        assert_eq!(result.termination, Termination::MaxIterations);
        assert_eq!(result.iterations, 5);
        assert_eq!(result.termination.to_string(), "max iterations reached");
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn no_parameters() {
        let f = Objective::new(0, |_: &DVector<f64>| 42.0, |_: &DVector<f64>| DVector::zeros(0));
        let options = MinimiserOptions::from_names("bfgs", &[]).unwrap();

        let result = minimise(&f, vec![], &options).unwrap();

        assert_eq!(result.termination, Termination::NoParameters);
        assert_eq!(result.f_count, 1);
        assert_eq!(result.g_count, 0);
        assert_eq!(result.fx, 42.0);
    }

    #[test]
    fn fatal_on_singular_hessian() {
        let f = Objective::new(
            2,
            |x: &DVector<f64>| x[0].powi(2),
            |x: &DVector<f64>| dvector![2.0 * x[0], 0.0],
        )
        .with_hessian(|_: &DVector<f64>| DMatrix::from_diagonal(&dvector![2.0, 0.0]));
        let options = MinimiserOptions::from_names("newton", &["no hessian mod"]).unwrap();

        let result = minimise(&f, vec![1.0, 1.0], &options).unwrap();

        assert!(result.termination.is_fatal());
        assert_eq!(result.x, dvector![1.0, 1.0]);
        assert!(result.termination.to_string().starts_with("fatal: "));
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn fatal_keeps_last_finite_iterate() {
        // Gradient is not finite beyond x = 0.5, the function value is.
        let f = Objective::new(
            1,
            |x: &DVector<f64>| (x[0] - 1.0).powi(2),
            |x: &DVector<f64>| {
                if x[0] > 0.5 {
                    dvector![f64::NAN]
                } else {
                    dvector![2.0 * (x[0] - 1.0)]
                }
            },
        );
        let options = MinimiserOptions::from_names("sd", &["back"]).unwrap();

        let result = minimise(&f, vec![0.0], &options).unwrap();

        assert!(result.termination.is_fatal());
        assert_eq!(result.x, dvector![0.0]);
        assert_eq!(result.fx, 1.0);
    }

    #[test]
    fn config_errors_before_evaluation() {
        use std::cell::Cell;

        let evaluations = Cell::new(0);
        let f = Objective::new(
            2,
            |x: &DVector<f64>| {
                evaluations.set(evaluations.get() + 1);
                x.dot(x)
            },
            |x: &DVector<f64>| x * 2.0,
        );

        let mut options = MinimiserOptions::default();
        assert!(matches!(
            minimise(&f, vec![1.0, 1.0], &options),
            Err(ConfigError::MissingHessian)
        ));

        options.set_algorithm(Algorithm::Bfgs);
        assert!(matches!(
            minimise(&f, vec![1.0], &options),
            Err(ConfigError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));

        options.set_hessian_mod(Some(HessianMod::Cholesky));
        assert!(matches!(
            minimise(&f, vec![1.0, 1.0], &options),
            Err(ConfigError::HessianModWithBfgs)
        ));

        options.set_hessian_mod(None).set_func_tol(None);
        assert!(matches!(
            minimise(&f, vec![1.0, 1.0], &options),
            Err(ConfigError::NoConvergenceTest)
        ));

        options.set_func_tol(Some(1e-10)).set_mu(2.0);
        assert!(matches!(
            minimise(&f, vec![1.0, 1.0], &options),
            Err(ConfigError::InvalidParameter("mu"))
        ));

        assert!(matches!(
            MinimiserOptions::<f64>::from_names("bfgs", &["golden section"]),
            Err(ConfigError::UnknownOption(_))
        ));
        assert!(matches!(
            MinimiserOptions::<f64>::from_names("lm", &[]),
            Err(ConfigError::UnknownAlgorithm(_))
        ));

        assert_eq!(evaluations.get(), 0);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn failed_line_search_is_not_convergence() {
        // The gradient has the wrong sign, so every step along the direction
        // increases the function.
        let f = Objective::new(
            1,
            |x: &DVector<f64>| x[0].powi(2),
            |x: &DVector<f64>| dvector![-2.0 * x[0]],
        );
        let options = MinimiserOptions::from_names("sd", &["nww"]).unwrap();

        let result = minimise(&f, vec![1.0], &options).unwrap();

        assert!(result.termination.is_fatal());
        assert!(result.termination.to_string().contains("line search failed"));
        assert_eq!(result.x, dvector![1.0]);
        assert_eq!(result.fx, 1.0);

        // Same with a negligible predicted decrease.
        let f = Objective::new(
            1,
            |x: &DVector<f64>| x[0].powi(2),
            |x: &DVector<f64>| dvector![-2e-20 * x[0]],
        );

        let result = minimise(&f, vec![1.0], &options).unwrap();

        assert_eq!(result.termination, Termination::FunctionTolerance);
        assert_eq!(result.x, dvector![1.0]);
    }

    #[test]
    fn zero_line_search_iterations_rejected() {
        let f = ExtendedRosenbrock::new(2);
        let mut options = MinimiserOptions::from_names("bfgs", &["nww"]).unwrap();
        options.set_line_search_max_iter(0);

        assert!(matches!(
            minimise(&f, vec![-1.2, 1.0], &options),
            Err(ConfigError::InvalidParameter("line_search_max_iter"))
        ));
    }

    #[test]
    fn gradient_tolerance_only() {
        let f = Sphere::new(2);
        let mut options = MinimiserOptions::from_names("cg", &[]).unwrap();
        options.set_func_tol(None).set_grad_tol(Some(1e-10));

        let result = minimise(&f, vec![1.0, -3.0], &options).unwrap();

        assert_eq!(result.termination, Termination::GradientTolerance);
        assert!(result.x.amax() <= 1e-9);
        assert_eq!(
            options.algorithm(),
            Algorithm::ConjugateGradient(CgFormula::PolakRibiere)
        );
    }
}
