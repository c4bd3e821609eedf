//! Tools for derivative-based methods.
//!
//! All minimisers in this crate need at least the gradient. If it is not
//! available analytically, [`FiniteDifference`] approximates both the gradient
//! and the Hessian from function values.

use nalgebra::{convert, ComplexField, DMatrix, DVector, RealField};
use num_traits::{One, Zero};

use crate::core::{Differentiable, Function, Problem, ProblemError};

/// Square root of double precision machine epsilon. This value is a standard
/// constant for epsilons in approximating first-order derivate-based concepts.
pub const EPSILON_SQRT: f64 = 0.000000014901161193847656;

/// Cubic root of double precision machine epsilon. This value is a standard
/// constant for epsilons in approximating second-order derivate-based concepts.
pub const EPSILON_CBRT: f64 = 0.0000060554544523933395;

/// Makes any [`Function`] [`Differentiable`] using finite differences.
///
/// The gradient is approximated by forward differences and the Hessian by
/// second-order forward differences, so Newton-type methods can be used too.
/// Each derivative costs several function evaluations which are not counted
/// by the minimiser as function calls.
#[derive(Debug, Clone)]
pub struct FiniteDifference<F> {
    f: F,
}

impl<F: Function> FiniteDifference<F> {
    /// Wraps the function.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Returns the wrapped function.
    pub fn into_inner(self) -> F {
        self.f
    }

    fn step(x: F::Field, eps: F::Field) -> F::Field {
        // Compute the step size. We would like to have the step as small as
        // possible (to be as close to the real derivative as possible). But at
        // the same time, very small step could cause f(x + e_j * step_j) ~=
        // f(x) with very small number of good digits.
        //
        // A reasonable way to balance these competing needs is to scale each
        // component by x_j itself. To avoid problems when x_j is close to
        // zero, it is modified to take the unit magnitude instead.
        let step = eps * x.abs().max(F::Field::one()) * F::Field::one().copysign(x);
        if step == F::Field::zero() {
            eps
        } else {
            step
        }
    }
}

impl<F: Function> Problem for FiniteDifference<F> {
    type Field = F::Field;

    fn dim(&self) -> usize {
        self.f.dim()
    }
}

impl<F: Function> Function for FiniteDifference<F> {
    fn apply(&self, x: &DVector<Self::Field>) -> Result<Self::Field, ProblemError> {
        self.f.apply(x)
    }
}

impl<F: Function> Differentiable for FiniteDifference<F> {
    fn gradient(
        &self,
        x: &DVector<Self::Field>,
        grad: &mut DVector<Self::Field>,
    ) -> Result<(), ProblemError> {
        if x.len() != self.dim() || grad.len() != self.dim() {
            return Err(ProblemError::InvalidDimensionality);
        }

        let eps: F::Field = convert(EPSILON_SQRT);
        let fx = self.f.apply(x)?;
        let mut x = x.clone_owned();

        for i in 0..x.len() {
            let xi = x[i];
            let step = Self::step(xi, eps);

            x[i] = xi + step;
            let fxi = self.f.apply(&x)?;

            // grad[i] = (f(x + e_i * step_i) - f(x)) / step_i.
            grad[i] = (fxi - fx) / step;

            x[i] = xi;
        }

        Ok(())
    }

    fn hessian(
        &self,
        x: &DVector<Self::Field>,
        hes: &mut DMatrix<Self::Field>,
    ) -> Result<(), ProblemError> {
        let n = self.dim();
        if x.len() != n || hes.shape() != (n, n) {
            return Err(ProblemError::InvalidDimensionality);
        }

        let eps: F::Field = convert(EPSILON_CBRT);
        let fx = self.f.apply(x)?;
        let mut x = x.clone_owned();

        let mut steps = DVector::zeros(n);
        let mut neighbors = DVector::zeros(n);

        for i in 0..n {
            let xi = x[i];
            let step = Self::step(xi, eps);
            steps[i] = step;

            x[i] = xi + step;
            neighbors[i] = self.f.apply(&x)?;

            x[i] = xi;
        }

        for i in 0..n {
            let xi = x[i];
            let stepi = steps[i];

            // Prepare x_i + 2 * e_i.
            x[i] = xi + stepi + stepi;

            let fxi = self.f.apply(&x)?;
            let fni = neighbors[i];

            x[i] = xi + stepi;

            hes[(i, i)] = ((fx - fni) + (fxi - fni)) / (stepi * stepi);

            for j in (i + 1)..n {
                let xj = x[j];
                let stepj = steps[j];

                x[j] = xj + stepj;

                let fxj = self.f.apply(&x)?;
                let fnj = neighbors[j];

                let hij = ((fx - fni) + (fxj - fnj)) / (stepi * stepj);
                hes[(i, j)] = hij;
                hes[(j, i)] = hij;

                x[j] = xj;
            }

            x[i] = xi;
        }

        Ok(())
    }

    fn has_hessian(&self) -> bool {
        true
    }
}
