//! Nonlinear conjugate gradient method.
//!
//! The first direction is the steepest descent `p = -g`, the following are
//!
//! ```text
//! p+ = -g+ + beta p
//! ```
//!
//! with `beta` given by one of the [formulas](CgFormula). The method is
//! restarted (`beta = 0`) when successive gradients are far from orthogonal,
//!
//! ```text
//! |g+ . g| / (g+ . g+) >= 0.1
//! ```
//!
//! when the formula denominator vanishes or when the resulting direction is
//! not a descent direction.
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5),
//! Section 5.2

use log::trace;
use nalgebra::{convert, DVector, RealField};
use num_traits::Zero;

use super::{DirectionError, DirectionFinder, DirectionState};

/// Threshold of the loss of orthogonality restart test.
const RESTART_THRESHOLD: f64 = 0.1;

/// Formula for the `beta` coefficient, with `y = g+ - g`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgFormula {
    /// `beta = g+ . g+ / g . g`.
    FletcherReeves,
    /// `beta = g+ . y / g . g`.
    PolakRibiere,
    /// `beta = max(0, g+ . y / g . g)`.
    PolakRibierePlus,
    /// `beta = g+ . y / p . y`.
    HestenesStiefel,
}

impl CgFormula {
    /// Canonical name of the formula.
    pub fn name(&self) -> &'static str {
        match self {
            CgFormula::FletcherReeves => "fletcher reeves",
            CgFormula::PolakRibiere => "polak ribiere",
            CgFormula::PolakRibierePlus => "polak ribiere+",
            CgFormula::HestenesStiefel => "hestenes stiefel",
        }
    }

    fn beta<T: RealField + Copy>(
        &self,
        grad: &DVector<T>,
        prev_grad: &DVector<T>,
        prev_p: &DVector<T>,
    ) -> Option<T> {
        let (num, denom) = match self {
            CgFormula::FletcherReeves => (grad.dot(grad), prev_grad.dot(prev_grad)),
            CgFormula::PolakRibiere | CgFormula::PolakRibierePlus => {
                (grad.dot(&(grad - prev_grad)), prev_grad.dot(prev_grad))
            }
            CgFormula::HestenesStiefel => {
                let y = grad - prev_grad;
                (grad.dot(&y), prev_p.dot(&y))
            }
        };

        if denom == T::zero() {
            return None;
        }

        let beta = num / denom;
        match self {
            CgFormula::PolakRibierePlus => Some(beta.max(T::zero())),
            _ => Some(beta),
        }
    }
}

/// Conjugate gradient direction finder.
///
/// See [module](self) documentation for more details.
#[derive(Debug, Clone)]
pub struct ConjugateGradient<T: RealField + Copy> {
    formula: CgFormula,
    prev: Option<(DVector<T>, DVector<T>)>,
}

impl<T: RealField + Copy> ConjugateGradient<T> {
    /// Initializes the method with given formula.
    pub fn new(formula: CgFormula) -> Self {
        Self {
            formula,
            prev: None,
        }
    }

    /// The formula in use.
    pub fn formula(&self) -> CgFormula {
        self.formula
    }
}

impl<T: RealField + Copy> DirectionFinder<T> for ConjugateGradient<T> {
    const NAME: &'static str = "conjugate gradient";

    fn direction(&mut self, state: &DirectionState<'_, T>) -> Result<DVector<T>, DirectionError> {
        let grad = state.grad;
        let steepest = -grad;

        let (prev_grad, prev_p) = match &self.prev {
            Some(prev) => prev,
            None => return Ok(steepest),
        };

        let gg = grad.dot(grad);
        if gg == T::zero() {
            return Ok(steepest);
        }

        if (grad.dot(prev_grad) / gg).abs() >= convert(RESTART_THRESHOLD) {
            trace!("conjugate gradient restart, gradients not orthogonal");
            return Ok(steepest);
        }

        let beta = match self.formula.beta(grad, prev_grad, prev_p) {
            Some(beta) if beta.is_finite() => beta,
            _ => {
                trace!("conjugate gradient restart, vanishing denominator");
                return Ok(steepest);
            }
        };

        let p = &steepest + prev_p * beta;
        if grad.dot(&p) >= T::zero() {
            trace!("conjugate gradient restart, not a descent direction");
            return Ok(steepest);
        }

        Ok(p)
    }

    fn update(
        &mut self,
        prev: &DirectionState<'_, T>,
        _next: &DirectionState<'_, T>,
        _alpha: T,
        p: &DVector<T>,
    ) {
        self.prev = Some((prev.grad.clone_owned(), p.clone_owned()));
    }
}
