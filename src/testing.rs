//! Testing functions and utilities useful for benchmarking, debugging and
//! smoke testing.
//!
//! [`ExtendedRosenbrock`] and [`Sphere`] are recommended for first tests.
//! [`Quadratic`] is a convex problem with known minimum and [`Himmelblau`]
//! has several minima and an indefinite Hessian in parts of the domain.
//!
//! All functions provide analytic gradients and Hessians.
//!
//! # References
//!
//! \[1\] [A Literature Survey of Benchmark Functions For Global Optimization
//! Problems](https://arxiv.org/abs/1308.4008)
//!
//! \[2\] [Numerical Methods for Unconstrained Optimization and Nonlinear
//! Equations](https://epubs.siam.org/doi/book/10.1137/1.9781611971200)

#![allow(unused)]

use nalgebra::{dmatrix, dvector, DMatrix, DVector};
use thiserror::Error;

use crate::core::{Differentiable, Function, Problem, ProblemError};
use crate::driver::{minimise, ConfigError, MinimiserOptions, Termination, TerminationResult};

/// Extension of the [`Differentiable`] trait that provides additional
/// information that is useful for testing minimisers.
pub trait TestProblem: Differentiable<Field = f64> {
    /// Standard initial values for the problem. Using the same initial values
    /// is essential for fair comparison of methods.
    fn initials(&self) -> Vec<DVector<f64>>;

    /// A set of global minima (if known and finite).
    fn optima(&self) -> Vec<DVector<f64>> {
        Vec::new()
    }

    /// Function value in the global minimum.
    fn min_value(&self) -> f64 {
        0.0
    }

    /// Test if given point is a global minimum, given the tolerance `eps` on
    /// the function value.
    fn is_optimum(&self, x: &DVector<f64>, eps: f64) -> bool {
        self.apply(x)
            .map(|fx| fx <= self.min_value() + eps)
            .unwrap_or(false)
    }
}

fn check_dim(x: &DVector<f64>, n: usize) -> Result<(), ProblemError> {
    if x.len() == n {
        Ok(())
    } else {
        Err(ProblemError::InvalidDimensionality)
    }
}

/// [Extended Rosenbrock
/// function](https://en.wikipedia.org/wiki/Rosenbrock_function) \[1,2\] (also
/// known as Rosenbrock's valley or banana function).
///
/// The global minimum is inside a long, narrow, parabolic shaped flat valley.
/// The challenge is to find the solution inside the valley.
#[derive(Debug, Clone, Copy)]
pub struct ExtendedRosenbrock {
    n: usize,
    alpha: f64,
}

impl ExtendedRosenbrock {
    /// Initializes the function with given dimension.
    ///
    /// The dimension **must** be a multiplier of 2.
    pub fn new(n: usize) -> Self {
        Self::with_scaling(n, 1.0)
    }

    /// Initializes the function with given dimension and scaling factor.
    ///
    /// The dimension **must** be a multiplier of 2. The higher the scaling
    /// factor is, the more difficult the problem is.
    pub fn with_scaling(n: usize, alpha: f64) -> Self {
        assert!(n > 0, "n must be greater than zero");
        assert!(n % 2 == 0, "n must be a multiple of 2");
        assert!(alpha > 0.0, "alpha must be greater than zero");
        Self { n, alpha }
    }

    // Scaled variables of the pair starting at i and the residuals.
    fn pair(&self, x: &DVector<f64>, i: usize) -> (f64, f64, f64) {
        let x1 = x[i] * self.alpha;
        let x2 = x[i + 1] / self.alpha;
        (x1, 10.0 * (x2 - x1 * x1), 1.0 - x1)
    }
}

impl Default for ExtendedRosenbrock {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Problem for ExtendedRosenbrock {
    type Field = f64;

    fn dim(&self) -> usize {
        self.n
    }
}

impl Function for ExtendedRosenbrock {
    fn apply(&self, x: &DVector<f64>) -> Result<f64, ProblemError> {
        check_dim(x, self.n)?;

        Ok((0..self.n)
            .step_by(2)
            .map(|i| {
                let (_, r1, r2) = self.pair(x, i);
                r1 * r1 + r2 * r2
            })
            .sum())
    }
}

impl Differentiable for ExtendedRosenbrock {
    fn gradient(&self, x: &DVector<f64>, grad: &mut DVector<f64>) -> Result<(), ProblemError> {
        check_dim(x, self.n)?;
        let a = self.alpha;

        for i in (0..self.n).step_by(2) {
            let (x1, r1, r2) = self.pair(x, i);
            grad[i] = a * (-40.0 * r1 * x1 - 2.0 * r2);
            grad[i + 1] = 20.0 * r1 / a;
        }

        Ok(())
    }

    fn hessian(&self, x: &DVector<f64>, hes: &mut DMatrix<f64>) -> Result<(), ProblemError> {
        check_dim(x, self.n)?;
        let a = self.alpha;
        hes.fill(0.0);

        for i in (0..self.n).step_by(2) {
            let (x1, r1, _) = self.pair(x, i);
            hes[(i, i)] = a * a * (800.0 * x1 * x1 - 40.0 * r1 + 2.0);
            hes[(i, i + 1)] = -400.0 * x1;
            hes[(i + 1, i)] = -400.0 * x1;
            hes[(i + 1, i + 1)] = 200.0 / (a * a);
        }

        Ok(())
    }

    fn has_hessian(&self) -> bool {
        true
    }
}

impl TestProblem for ExtendedRosenbrock {
    fn initials(&self) -> Vec<DVector<f64>> {
        let init1 = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| if i % 2 == 0 { -1.2 } else { 1.0 }),
        );

        let init2 = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| if i % 2 == 0 { 6.39 } else { -0.221 }),
        );

        vec![init1, init2]
    }

    fn optima(&self) -> Vec<DVector<f64>> {
        let optimum = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| {
                if i % 2 == 0 {
                    1.0 / self.alpha
                } else {
                    self.alpha
                }
            }),
        );
        vec![optimum]
    }
}

/// Sphere function `x^T x`.
///
/// The simplest convex function, its Hessian is `2 I` everywhere.
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    n: usize,
}

impl Sphere {
    /// Initializes the function with given dimension.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "n must be greater than zero");
        Self { n }
    }
}

impl Default for Sphere {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Problem for Sphere {
    type Field = f64;

    fn dim(&self) -> usize {
        self.n
    }
}

impl Function for Sphere {
    fn apply(&self, x: &DVector<f64>) -> Result<f64, ProblemError> {
        check_dim(x, self.n)?;
        Ok(x.dot(x))
    }
}

impl Differentiable for Sphere {
    fn gradient(&self, x: &DVector<f64>, grad: &mut DVector<f64>) -> Result<(), ProblemError> {
        check_dim(x, self.n)?;
        grad.copy_from(&(x * 2.0));
        Ok(())
    }

    fn hessian(&self, x: &DVector<f64>, hes: &mut DMatrix<f64>) -> Result<(), ProblemError> {
        check_dim(x, self.n)?;
        hes.fill_with_identity();
        *hes *= 2.0;
        Ok(())
    }

    fn has_hessian(&self) -> bool {
        true
    }
}

impl TestProblem for Sphere {
    fn initials(&self) -> Vec<DVector<f64>> {
        let init = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| if i % 2 == 0 { 10.0 } else { -10.0 }),
        );
        vec![init]
    }

    fn optima(&self) -> Vec<DVector<f64>> {
        vec![DVector::zeros(self.n)]
    }
}

/// Convex quadratic `0.5 x^T A x` with fixed symmetric positive definite
/// matrix `A` in three dimensions.
#[derive(Debug, Clone)]
pub struct Quadratic {
    a: DMatrix<f64>,
}

impl Quadratic {
    /// Initializes the function.
    pub fn new() -> Self {
        Self {
            a: dmatrix![
                4.0, 1.0, 0.0;
                1.0, 3.0, 0.5;
                0.0, 0.5, 2.0
            ],
        }
    }
}

impl Default for Quadratic {
    fn default() -> Self {
        Self::new()
    }
}

impl Problem for Quadratic {
    type Field = f64;

    fn dim(&self) -> usize {
        3
    }
}

impl Function for Quadratic {
    fn apply(&self, x: &DVector<f64>) -> Result<f64, ProblemError> {
        check_dim(x, 3)?;
        Ok(0.5 * x.dot(&(&self.a * x)))
    }
}

impl Differentiable for Quadratic {
    fn gradient(&self, x: &DVector<f64>, grad: &mut DVector<f64>) -> Result<(), ProblemError> {
        check_dim(x, 3)?;
        grad.gemv(1.0, &self.a, x, 0.0);
        Ok(())
    }

    fn hessian(&self, x: &DVector<f64>, hes: &mut DMatrix<f64>) -> Result<(), ProblemError> {
        check_dim(x, 3)?;
        hes.copy_from(&self.a);
        Ok(())
    }

    fn has_hessian(&self) -> bool {
        true
    }
}

impl TestProblem for Quadratic {
    fn initials(&self) -> Vec<DVector<f64>> {
        vec![dvector![3.0, -2.0, 1.0], dvector![-10.0, 10.0, 5.0]]
    }

    fn optima(&self) -> Vec<DVector<f64>> {
        vec![DVector::zeros(3)]
    }
}

/// [Himmelblau's function](https://en.wikipedia.org/wiki/Himmelblau%27s_function)
/// \[1\].
///
/// Has four minima with the value zero and a local maximum at `(-0.27,
/// -0.92)`. The Hessian is indefinite in parts of the domain, which makes the
/// function useful for testing Hessian modifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct Himmelblau;

impl Problem for Himmelblau {
    type Field = f64;

    fn dim(&self) -> usize {
        2
    }
}

impl Function for Himmelblau {
    fn apply(&self, x: &DVector<f64>) -> Result<f64, ProblemError> {
        check_dim(x, 2)?;
        let (u, v) = (x[0], x[1]);
        Ok((u * u + v - 11.0).powi(2) + (u + v * v - 7.0).powi(2))
    }
}

impl Differentiable for Himmelblau {
    fn gradient(&self, x: &DVector<f64>, grad: &mut DVector<f64>) -> Result<(), ProblemError> {
        check_dim(x, 2)?;
        let (u, v) = (x[0], x[1]);
        let r1 = u * u + v - 11.0;
        let r2 = u + v * v - 7.0;

        grad[0] = 4.0 * u * r1 + 2.0 * r2;
        grad[1] = 2.0 * r1 + 4.0 * v * r2;
        Ok(())
    }

    fn hessian(&self, x: &DVector<f64>, hes: &mut DMatrix<f64>) -> Result<(), ProblemError> {
        check_dim(x, 2)?;
        let (u, v) = (x[0], x[1]);

        hes[(0, 0)] = 12.0 * u * u + 4.0 * v - 42.0;
        hes[(0, 1)] = 4.0 * (u + v);
        hes[(1, 0)] = 4.0 * (u + v);
        hes[(1, 1)] = 4.0 * u + 12.0 * v * v - 26.0;
        Ok(())
    }

    fn has_hessian(&self) -> bool {
        true
    }
}

impl TestProblem for Himmelblau {
    fn initials(&self) -> Vec<DVector<f64>> {
        vec![dvector![0.0, 0.0], dvector![-1.0, 1.0]]
    }

    fn optima(&self) -> Vec<DVector<f64>> {
        vec![
            dvector![3.0, 2.0],
            dvector![-2.805118, 3.131312],
            dvector![-3.779310, -3.283186],
            dvector![3.584428, -1.848126],
        ]
    }
}

/// Minimisation error of the testing driver (see [`minimise_test`]).
#[derive(Debug, Error)]
pub enum TestingError {
    /// Invalid configuration.
    #[error("{0}")]
    Inner(#[from] ConfigError),
    /// Minimiser did not converge.
    #[error("minimiser did not converge: {0}")]
    Termination(Termination),
    /// Minimiser converged, but not to a global minimum.
    #[error("minimiser converged to f = {0}")]
    NotOptimal(f64),
}

/// A simple minimiser driver that can be used in tests. Succeeds if the
/// minimiser converges to a point with function value within `tolerance` of
/// the global minimum.
pub fn minimise_test<F: TestProblem>(
    f: &F,
    x0: &DVector<f64>,
    options: &MinimiserOptions<f64>,
    tolerance: f64,
) -> Result<TerminationResult<f64>, TestingError> {
    let result = minimise(f, x0.iter().copied().collect(), options)?;

    if !result.termination.is_converged() {
        return Err(TestingError::Termination(result.termination));
    }

    if !f.is_optimum(&result.x, tolerance) {
        return Err(TestingError::NotOptimal(result.fx));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivatives::FiniteDifference;

    use approx::assert_abs_diff_eq;

    fn check_derivatives<F: TestProblem + Clone>(f: &F) {
        let fd = FiniteDifference::new(f.clone());
        let n = f.dim();

        for x in f.initials() {
            let mut expected = DVector::zeros(n);
            f.gradient(&x, &mut expected).unwrap();
            let mut grad = DVector::zeros(n);
            fd.gradient(&x, &mut grad).unwrap();

            let scale = expected.amax().max(1.0);
            assert_abs_diff_eq!(grad / scale, expected / scale, epsilon = 1e-5);

            let mut expected = DMatrix::zeros(n, n);
            f.hessian(&x, &mut expected).unwrap();
            let mut hes = DMatrix::zeros(n, n);
            fd.hessian(&x, &mut hes).unwrap();

            let scale = expected.amax().max(1.0);
            assert_abs_diff_eq!(hes / scale, expected / scale, epsilon = 1e-3);
        }
    }

    #[test]
    fn analytic_derivatives() {
        check_derivatives(&ExtendedRosenbrock::new(4));
        check_derivatives(&ExtendedRosenbrock::with_scaling(2, 2.0));
        check_derivatives(&Sphere::new(3));
        check_derivatives(&Quadratic::new());
        check_derivatives(&Himmelblau);
    }

    #[test]
    fn optima_values() {
        let rosenbrock = ExtendedRosenbrock::with_scaling(4, 3.0);
        for x in rosenbrock.optima() {
            assert!(rosenbrock.is_optimum(&x, 1e-12));
        }

        for x in Himmelblau.optima() {
            assert!(Himmelblau.is_optimum(&x, 1e-8));
        }
    }

    #[test]
    fn newton_from_standard_initials() {
        let options = MinimiserOptions::default();

        for x0 in Himmelblau.initials() {
            minimise_test(&Himmelblau, &x0, &options, 1e-8).unwrap();
        }

        for x0 in Quadratic::new().initials() {
            minimise_test(&Quadratic::new(), &x0, &options, 1e-10).unwrap();
        }
    }
}
