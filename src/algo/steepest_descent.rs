//! Steepest descent.
//!
//! The direction is the negative gradient `p = -g`. Simple but slow on badly
//! scaled problems, mostly useful as a baseline.

use nalgebra::{DVector, RealField};

use super::{DirectionError, DirectionFinder, DirectionState};

/// Steepest descent direction finder.
#[derive(Debug, Clone, Copy, Default)]
pub struct SteepestDescent;

impl<T: RealField + Copy> DirectionFinder<T> for SteepestDescent {
    const NAME: &'static str = "steepest descent";

    fn direction(&mut self, state: &DirectionState<'_, T>) -> Result<DVector<T>, DirectionError> {
        Ok(-state.grad)
    }
}
