//! Minimisation subject to inequality constraints.
//!
//! The constraints `c(x) >= 0` are handled by the method of multipliers
//! (augmented Lagrangian method). Each outer iteration minimises the
//! augmented Lagrangian
//!
//! ```text
//! L(x, lambda; mu) = f(x) + sum_i psi(c_i(x), lambda_i; mu)
//!
//!                    / -s * t + t^2 / (2 * mu)   if t <= mu * s,
//! psi(t, s; mu) =   <
//!                    \ -mu * s^2 / 2             otherwise
//! ```
//!
//! by the unconstrained [`MinimiserDriver`] with the configured direction
//! finder and line search, then updates the multipliers as `lambda_i =
//! max(lambda_i - c_i / mu, 0)` and decreases the penalty parameter `mu`.
//! The inner minimisation stops on the gradient test with a tolerance that
//! tightens with every outer iteration.
//!
//! The outer loop converges when the constraint violation together with the
//! complementarity, `max_i |min(c_i, mu * lambda_i)|`, is within
//! [`feas_tol`](MultiplierOptions::feas_tol) and the inner minimisation
//! converged (or the augmented Lagrangian changed by at most the function
//! tolerance).
//!
//! ```rust
//! use minfit::nalgebra::{DMatrix, DVector};
//! use minfit::{
//!     minimise_constrained, LinearConstraints, MinimiserOptions, MultiplierOptions, Objective,
//! };
//!
//! // Minimum at (2, 1), but x0 <= 1 is required.
//! let f = Objective::new(
//!     2,
//!     |x: &DVector<f64>| (x[0] - 2.0).powi(2) + (x[1] - 1.0).powi(2),
//!     |x: &DVector<f64>| DVector::from_vec(vec![2.0 * (x[0] - 2.0), 2.0 * (x[1] - 1.0)]),
//! )
//! .with_hessian(|_: &DVector<f64>| DMatrix::identity(2, 2) * 2.0);
//! let bounds = LinearConstraints::from_bounds(&[f64::NEG_INFINITY; 2], &[1.0, f64::INFINITY])?;
//!
//! let result = minimise_constrained(
//!     &f,
//!     vec![0.0, 0.0],
//!     &bounds,
//!     &MinimiserOptions::default(),
//!     &MultiplierOptions::default(),
//! )?;
//!
//! assert!(result.termination.is_converged());
//! assert!((result.x[0] - 1.0).abs() < 1e-6);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5),
//! Section 17.4

use getset::{CopyGetters, Setters};
use log::{debug, info};
use nalgebra::{convert, DMatrix, DVector, RealField, ComplexField};
use num_traits::{One, Zero};

use crate::core::{Constraint, Differentiable, Function, Problem, ProblemError};
use crate::driver::{
    ConfigError, MinimiserDriver, MinimiserOptions, Termination, TerminationResult,
};

/// Options of the method of multipliers.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct MultiplierOptions<T: RealField + Copy> {
    /// Initial penalty parameter. Default: `1e-5`.
    mu0: T,
    /// Factor applied to the penalty parameter after every outer iteration.
    /// Default: `0.5`.
    scale_mu: T,
    /// Initial upper bound of the inner gradient tolerance. Default: `1e-2`.
    epsilon0: T,
    /// Factor applied to the upper bound of the inner gradient tolerance.
    /// Default: `1e-2`.
    scale_epsilon: T,
    /// Initial factor of the constraint norm in the inner gradient tolerance.
    /// Default: `1e-2`.
    gamma0: T,
    /// Factor applied to `gamma`. Default: `1e-2`.
    scale_gamma: T,
    /// Smallest inner gradient tolerance. Default: `1e-8`.
    min_inner_tol: T,
    /// Initial multiplier of constraints which are not strictly satisfied in
    /// the initial point. Default: `1e4`.
    init_lambda: T,
    /// Tolerance of the constraint violation and complementarity. Default:
    /// `1e-8`.
    feas_tol: T,
    /// Maximum number of iterations of one inner minimisation. Default:
    /// `500`.
    inner_max_iter: usize,
}

impl<T: RealField + Copy> Default for MultiplierOptions<T> {
    fn default() -> Self {
        Self {
            mu0: convert(1e-5),
            scale_mu: convert(0.5),
            epsilon0: convert(1e-2),
            scale_epsilon: convert(1e-2),
            gamma0: convert(1e-2),
            scale_gamma: convert(1e-2),
            min_inner_tol: convert(1e-8),
            init_lambda: convert(1e4),
            feas_tol: convert(1e-8),
            inner_max_iter: 500,
        }
    }
}

impl<T: RealField + Copy> MultiplierOptions<T> {
    fn validate(&self) -> Result<(), ConfigError> {
        let zero = T::zero();
        let one = T::one();

        let positive = [
            (self.mu0, "mu0"),
            (self.epsilon0, "epsilon0"),
            (self.gamma0, "gamma0"),
            (self.min_inner_tol, "min_inner_tol"),
        ];
        for (value, name) in positive {
            if !(value > zero) || !value.is_finite() {
                return Err(ConfigError::InvalidParameter(name));
            }
        }

        let scales = [
            (self.scale_mu, "scale_mu"),
            (self.scale_epsilon, "scale_epsilon"),
            (self.scale_gamma, "scale_gamma"),
        ];
        for (value, name) in scales {
            if !(value > zero && value < one) {
                return Err(ConfigError::InvalidParameter(name));
            }
        }

        if !(self.init_lambda >= zero) || !self.init_lambda.is_finite() {
            return Err(ConfigError::InvalidParameter("init_lambda"));
        }

        if !(self.feas_tol >= zero) {
            return Err(ConfigError::InvalidParameter("feas_tol"));
        }

        if self.inner_max_iter == 0 {
            return Err(ConfigError::InvalidParameter("inner_max_iter"));
        }

        Ok(())
    }
}

/// The augmented Lagrangian of a function and inequality constraints for
/// fixed multipliers and penalty parameter.
///
/// The curvature of the constraints is not included in the Hessian, which is
/// exact for [linear constraints](crate::LinearConstraints).
pub struct AugmentedLagrangian<'a, F: Problem, C: ?Sized> {
    f: &'a F,
    constraint: &'a C,
    lambda: DVector<F::Field>,
    mu: F::Field,
}

impl<'a, F, C> AugmentedLagrangian<'a, F, C>
where
    F: Differentiable,
    C: Constraint<F::Field> + ?Sized,
{
    /// Creates the augmented Lagrangian with one multiplier per constraint.
    pub fn new(f: &'a F, constraint: &'a C, lambda: DVector<F::Field>, mu: F::Field) -> Self {
        Self {
            f,
            constraint,
            lambda,
            mu,
        }
    }

    /// The Lagrange multipliers.
    pub fn lambda(&self) -> &DVector<F::Field> {
        &self.lambda
    }

    /// The penalty parameter.
    pub fn mu(&self) -> F::Field {
        self.mu
    }

    /// Constraint values, checked to have one value per multiplier.
    pub fn constraint_values(
        &self,
        x: &DVector<F::Field>,
    ) -> Result<DVector<F::Field>, ProblemError> {
        let c = self.constraint.eval(x);

        if c.len() != self.lambda.len() {
            return Err(ProblemError::InvalidDimensionality);
        }

        Ok(c)
    }

    /// Constraint violation and complementarity, `max_i |min(c_i, mu *
    /// lambda_i)|`.
    pub fn violation(&self, c: &DVector<F::Field>) -> F::Field {
        c.iter()
            .zip(self.lambda.iter())
            .map(|(&ci, &li)| ci.min(self.mu * li).abs())
            .fold(F::Field::zero(), |max, v| max.max(v))
    }

    /// Updates the multipliers by `lambda_i = max(lambda_i - c_i / mu, 0)`
    /// and sets the new penalty parameter.
    pub fn update(&mut self, c: &DVector<F::Field>, mu: F::Field) {
        for (li, ci) in self.lambda.iter_mut().zip(c.iter()) {
            *li = (*li - *ci / self.mu).max(F::Field::zero());
        }

        self.mu = mu;
    }

    fn is_active(&self, ci: F::Field, li: F::Field) -> bool {
        ci <= self.mu * li
    }

    fn active_jacobian(
        &self,
        x: &DVector<F::Field>,
        c: &DVector<F::Field>,
    ) -> Option<DMatrix<F::Field>> {
        let any_active = c
            .iter()
            .zip(self.lambda.iter())
            .any(|(ci, li)| self.is_active(*ci, *li));

        if !any_active {
            return None;
        }

        let mut jac = DMatrix::zeros(c.len(), x.len());
        self.constraint.eval_jacobian(x, &mut jac);
        Some(jac)
    }
}

impl<'a, F, C> Problem for AugmentedLagrangian<'a, F, C>
where
    F: Differentiable,
    C: Constraint<F::Field> + ?Sized,
{
    type Field = F::Field;

    fn dim(&self) -> usize {
        self.f.dim()
    }
}

impl<'a, F, C> Function for AugmentedLagrangian<'a, F, C>
where
    F: Differentiable,
    C: Constraint<F::Field> + ?Sized,
{
    fn apply(&self, x: &DVector<Self::Field>) -> Result<Self::Field, ProblemError> {
        let two: F::Field = convert(2.0);
        let mut value = self.f.apply(x)?;
        let c = self.constraint_values(x)?;

        for (ci, li) in c.iter().zip(self.lambda.iter()) {
            if self.is_active(*ci, *li) {
                value += -*li * *ci + *ci * *ci / (two * self.mu);
            } else {
                value -= self.mu * *li * *li / two;
            }
        }

        Ok(value)
    }
}

impl<'a, F, C> Differentiable for AugmentedLagrangian<'a, F, C>
where
    F: Differentiable,
    C: Constraint<F::Field> + ?Sized,
{
    fn gradient(
        &self,
        x: &DVector<Self::Field>,
        grad: &mut DVector<Self::Field>,
    ) -> Result<(), ProblemError> {
        self.f.gradient(x, grad)?;
        let c = self.constraint_values(x)?;

        if let Some(jac) = self.active_jacobian(x, &c) {
            for (i, (ci, li)) in c.iter().zip(self.lambda.iter()).enumerate() {
                if self.is_active(*ci, *li) {
                    let coef = *li - *ci / self.mu;
                    grad.axpy(-coef, &jac.row(i).transpose(), F::Field::one());
                }
            }
        }

        Ok(())
    }

    fn hessian(
        &self,
        x: &DVector<Self::Field>,
        hes: &mut DMatrix<Self::Field>,
    ) -> Result<(), ProblemError> {
        self.f.hessian(x, hes)?;
        let c = self.constraint_values(x)?;

        if let Some(jac) = self.active_jacobian(x, &c) {
            let scale = F::Field::one() / self.mu;

            for (i, (ci, li)) in c.iter().zip(self.lambda.iter()).enumerate() {
                if self.is_active(*ci, *li) {
                    let row = jac.row(i).transpose();
                    hes.ger(scale, &row, &row, F::Field::one());
                }
            }
        }

        Ok(())
    }

    fn has_hessian(&self) -> bool {
        self.f.has_hessian()
    }
}

/// Evaluation counters summed over the inner minimisations.
#[derive(Debug, Default)]
struct Counts {
    iterations: usize,
    f_count: usize,
    g_count: usize,
    h_count: usize,
}

impl Counts {
    fn add<T: RealField + Copy>(&mut self, result: &TerminationResult<T>) {
        self.iterations += result.iterations;
        self.f_count += result.f_count;
        self.g_count += result.g_count;
        self.h_count += result.h_count;
    }

    fn finish<F: Function>(
        mut self,
        f: &F,
        x: DVector<F::Field>,
        termination: Termination,
    ) -> TerminationResult<F::Field> {
        self.f_count += 1;
        let (fx, termination) = match f.apply(&x) {
            Ok(fx) => (fx, termination),
            Err(error) => (
                F::Field::zero() / F::Field::zero(),
                Termination::Fatal(format!("final function value: {}", error)),
            ),
        };

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
}

/// Minimises the function from the initial point `x0` subject to the
/// constraints `c(x) >= 0`, using the method of multipliers. See
/// [module](self) documentation for more details.
///
/// The `options` configure the inner unconstrained minimisations, their
/// tolerances are replaced by the ones given by `multiplier_options`. The
/// function tolerance of `options` applies to the augmented Lagrangian
/// between outer iterations and `max_iter` limits the total number of inner
/// iterations.
///
/// The initial point does not need to be feasible. The result reports the
/// value of the objective function (not of the augmented Lagrangian) and the
/// evaluation counts summed over all inner minimisations.
pub fn minimise_constrained<F, C>(
    f: &F,
    x0: Vec<F::Field>,
    constraint: &C,
    options: &MinimiserOptions<F::Field>,
    multiplier_options: &MultiplierOptions<F::Field>,
) -> Result<TerminationResult<F::Field>, ConfigError>
where
    F: Differentiable,
    C: Constraint<F::Field> + ?Sized,
{
    if x0.len() != f.dim() {
        return Err(ConfigError::DimensionMismatch {
            expected: f.dim(),
            actual: x0.len(),
        });
    }

    if let Some(n) = constraint.dim() {
        if n != f.dim() {
            return Err(ConfigError::ConstraintDimensionMismatch {
                expected: f.dim(),
                actual: n,
            });
        }
    }

    options.validate()?;
    multiplier_options.validate()?;

    if options.algorithm().uses_hessian() && !f.has_hessian() {
        return Err(ConfigError::MissingHessian);
    }

    let zero = F::Field::zero();
    let mut counts = Counts::default();
    let mut xk = DVector::from_vec(x0);

    let ck = constraint.eval(&xk);
    let lambda = ck.map(|ci| {
        if ci <= zero {
            multiplier_options.init_lambda()
        } else {
            zero
        }
    });
    let mut lagrangian = AugmentedLagrangian::new(f, constraint, lambda, multiplier_options.mu0());

    counts.f_count += 1;
    let mut lk = match lagrangian.apply(&xk) {
        Ok(lk) if lk.is_finite() => lk,
        Ok(_) => {
            let termination = Termination::Fatal("initial function value: invalid value".into());
            return Ok(counts.finish(f, xk, termination));
        }
        Err(error) => {
            let termination = Termination::Fatal(format!("initial function value: {}", error));
            return Ok(counts.finish(f, xk, termination));
        }
    };

    if options.verbosity() >= 1 {
        info!(
            "method of multipliers with {} constraints, inner {}",
            ck.len(),
            options.algorithm()
        );
    }

    let min_mu: F::Field = convert(1e-99);
    let mut ck_norm = ck.norm();
    let mut epsilon = multiplier_options.epsilon0();
    let mut gamma = multiplier_options.gamma0();
    let mut outer = 0;

    loop {
        if !ck_norm.is_finite() {
            let termination = Termination::Fatal("constraint value not finite".into());
            return Ok(counts.finish(f, xk, termination));
        }

        let inner_tol = epsilon
            .min(gamma * ck_norm)
            .max(multiplier_options.min_inner_tol());
        let remaining = options.max_iter().saturating_sub(counts.iterations);

        let mut inner = options.clone();
        inner
            .set_func_tol(None)
            .set_grad_tol(Some(inner_tol))
            .set_max_iter(remaining.min(multiplier_options.inner_max_iter()))
            .set_verbosity(options.verbosity().saturating_sub(1));

        let result = MinimiserDriver::builder(&lagrangian)
            .with_initial(xk.iter().copied().collect())
            .with_options(inner)
            .build()?
            .minimise();
        counts.add(&result);

        if result.termination.is_fatal() {
            return Ok(counts.finish(f, result.x, result.termination));
        }

        let c = match lagrangian.constraint_values(&result.x) {
            Ok(c) => c,
            Err(error) => {
                let termination = Termination::Fatal(format!("constraints: {}", error));
                return Ok(counts.finish(f, result.x, termination));
            }
        };
        let violation = lagrangian.violation(&c);
        outer += 1;

        if options.verbosity() >= 2 {
            debug!(
                "outer iteration {}: L = {}, violation = {}, mu = {}, inner: {}",
                outer,
                result.fx,
                violation,
                lagrangian.mu(),
                result.termination
            );
        }

        if violation <= multiplier_options.feas_tol() {
            if result.termination.is_converged() {
                return Ok(counts.finish(f, result.x, result.termination));
            }

            if options
                .func_tol()
                .map_or(false, |tol| (lk - result.fx).abs() <= tol)
            {
                return Ok(counts.finish(f, result.x, Termination::FunctionTolerance));
            }
        }

        if counts.iterations >= options.max_iter() {
            return Ok(counts.finish(f, result.x, Termination::MaxIterations));
        }

        let mu = lagrangian.mu() * multiplier_options.scale_mu();
        if !(mu > min_mu) {
            let termination = Termination::Fatal("penalty parameter too small".into());
            return Ok(counts.finish(f, result.x, termination));
        }

        lagrangian.update(&c, mu);
        epsilon *= multiplier_options.scale_epsilon();
        gamma *= multiplier_options.scale_gamma();
        ck_norm = c.norm();
        lk = result.fx;
        xk = result.x;
    }
}
