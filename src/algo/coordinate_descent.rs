//! Back-and-forth coordinate descent.
//!
//! Each iteration moves along a single coordinate axis. The axes are visited
//! in the order `0, 1, ..., n - 1, n - 2, ..., 1, 0, 1, ...`, skipping axes
//! along which the gradient vanishes. The direction is oriented against the
//! gradient component, so it is always a descent direction.
//!
//! The length of the direction along every axis is remembered: after a step
//! of length `alpha`, the axis direction is rescaled by `alpha`, so that the
//! line search on the next visit of the axis starts from the step that was
//! accepted last time.

use log::trace;
use nalgebra::{DVector, RealField};
use num_traits::{One, Zero};

use super::{DirectionError, DirectionFinder, DirectionState};

/// Coordinate descent direction finder.
///
/// See [module](self) documentation for more details.
#[derive(Debug, Clone)]
pub struct CoordinateDescent<T: RealField + Copy> {
    steps: DVector<T>,
    index: usize,
    forward: bool,
    started: bool,
}

impl<T: RealField + Copy> CoordinateDescent<T> {
    /// Initializes coordinate descent for a problem with `n` parameters.
    pub fn new(n: usize) -> Self {
        Self {
            steps: DVector::from_element(n, T::one()),
            index: 0,
            forward: true,
            started: false,
        }
    }

    /// Per-axis step lengths.
    pub fn steps(&self) -> &DVector<T> {
        &self.steps
    }

    /// The axis of the last direction.
    pub fn index(&self) -> usize {
        self.index
    }

    fn advance(&mut self) {
        let n = self.steps.len();

        if !self.started {
            self.started = true;
            return;
        }

        if n <= 1 {
            return;
        }

        if self.forward {
            if self.index + 1 < n {
                self.index += 1;
            } else {
                self.forward = false;
                self.index -= 1;
            }
        } else if self.index > 0 {
            self.index -= 1;
        } else {
            self.forward = true;
            self.index += 1;
        }
    }
}

impl<T: RealField + Copy> DirectionFinder<T> for CoordinateDescent<T> {
    const NAME: &'static str = "coordinate descent";

    fn direction(&mut self, state: &DirectionState<'_, T>) -> Result<DVector<T>, DirectionError> {
        let n = self.steps.len();
        let mut p = DVector::zeros(n);

        // A full back-and-forth sweep visits every axis.
        for _ in 0..(2 * n).max(1) {
            self.advance();

            if n == 0 {
                break;
            }

            let i = self.index;
            let g = state.grad[i];

            if g > T::zero() {
                p[i] = -self.steps[i];
                return Ok(p);
            } else if g < T::zero() {
                p[i] = self.steps[i];
                return Ok(p);
            }

            trace!("coordinate descent skipping axis {} with zero gradient", i);
        }

        Ok(p)
    }

    fn update(
        &mut self,
        _prev: &DirectionState<'_, T>,
        _next: &DirectionState<'_, T>,
        alpha: T,
        _p: &DVector<T>,
    ) {
        if self.steps.is_empty() {
            return;
        }

        let scaled = self.steps[self.index] * alpha;
        if alpha.is_finite() && alpha > T::zero() && scaled > T::zero() && scaled.is_finite() {
            self.steps[self.index] = scaled;
        }
    }
}
