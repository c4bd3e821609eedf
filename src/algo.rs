//! The collection of implemented direction finders.
//!
//! Each minimisation iteration asks a direction finder for a descent
//! direction `p`, then a [line search](crate::line_search) for the step
//! length `alpha` along it. After the new point is evaluated, the finder is
//! given the chance to update its internal state (curvature approximation,
//! previous direction, step memory).
//!
//! * [Newton](newton) -- Newton step from the (modified) Hessian.
//! * [BFGS](bfgs) -- quasi-Newton method with inverse Hessian approximation.
//! * [Conjugate gradient](conjugate_gradient) -- nonlinear conjugate gradient
//!   with Fletcher-Reeves, Polak-Ribière(+) or Hestenes-Stiefel formula.
//! * [Coordinate descent](coordinate_descent) -- back-and-forth cycling over
//!   the coordinate axes.
//! * [Steepest descent](steepest_descent) -- the negative gradient.

pub mod bfgs;
pub mod conjugate_gradient;
pub mod coordinate_descent;
pub mod newton;
pub mod steepest_descent;

pub use bfgs::Bfgs;
pub use conjugate_gradient::{CgFormula, ConjugateGradient};
pub use coordinate_descent::CoordinateDescent;
pub use newton::Newton;
pub use steepest_descent::SteepestDescent;

use std::fmt;
use std::str::FromStr;

use nalgebra::{convert, DMatrix, DVector, RealField};
use thiserror::Error;

use crate::driver::ConfigError;
use crate::hessian_mod::{HessianMod, HessianModError};
use crate::line_search::{normalize_name, LineSearch};

/// Error returned from a direction finder.
#[derive(Debug, Error)]
pub enum DirectionError {
    /// Newton direction requested without the Hessian.
    #[error("hessian is required but not available")]
    MissingHessian,
    /// The computed direction is not finite.
    #[error("search direction is not finite")]
    NonFinite,
    /// Error from the Hessian modification.
    #[error("{0}")]
    HessianMod(#[from] HessianModError),
}

/// Iterate seen by a direction finder.
#[derive(Debug, Clone, Copy)]
pub struct DirectionState<'a, T: RealField + Copy> {
    /// Current point.
    pub x: &'a DVector<T>,
    /// Function value in the current point.
    pub fx: T,
    /// Gradient in the current point.
    pub grad: &'a DVector<T>,
    /// Hessian in the current point, if evaluated.
    pub hessian: Option<&'a DMatrix<T>>,
}

/// Interface of a direction finder.
pub trait DirectionFinder<T: RealField + Copy> {
    /// Name of the method.
    const NAME: &'static str;

    /// Computes the search direction in the current iterate.
    fn direction(&mut self, state: &DirectionState<'_, T>) -> Result<DVector<T>, DirectionError>;

    /// Updates the internal state after a step of length `alpha` in direction
    /// `p` moved the iterate from `prev` to `next`.
    fn update(
        &mut self,
        prev: &DirectionState<'_, T>,
        next: &DirectionState<'_, T>,
        alpha: T,
        p: &DVector<T>,
    ) {
        let _ = (prev, next, alpha, p);
    }
}

/// Algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// See [`newton`].
    Newton,
    /// See [`bfgs`].
    Bfgs,
    /// See [`conjugate_gradient`].
    ConjugateGradient(CgFormula),
    /// See [`coordinate_descent`].
    CoordinateDescent,
    /// See [`steepest_descent`].
    SteepestDescent,
}

impl Algorithm {
    /// Whether the algorithm requires the Hessian.
    pub fn uses_hessian(&self) -> bool {
        matches!(self, Algorithm::Newton)
    }

    /// Line search used when none is given.
    pub fn default_line_search(&self) -> LineSearch {
        match self {
            Algorithm::Newton | Algorithm::Bfgs | Algorithm::ConjugateGradient(_) => {
                LineSearch::MoreThuente
            }
            Algorithm::CoordinateDescent | Algorithm::SteepestDescent => LineSearch::Backtracking,
        }
    }

    /// Curvature condition constant used when none is given.
    pub fn default_eta<T: RealField + Copy>(&self) -> T {
        match self {
            Algorithm::Newton | Algorithm::Bfgs => convert(0.9),
            _ => convert(0.1),
        }
    }

    /// Canonical name of the algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Newton => "newton",
            Algorithm::Bfgs => "bfgs",
            Algorithm::ConjugateGradient(formula) => formula.name(),
            Algorithm::CoordinateDescent => "coordinate descent",
            Algorithm::SteepestDescent => "steepest descent",
        }
    }

    /// Creates the direction finder for a problem with `n` parameters.
    pub fn direction_finder<T: RealField + Copy>(
        &self,
        n: usize,
        hessian_mod: HessianMod,
        mach_acc: T,
    ) -> Direction<T> {
        match self {
            Algorithm::Newton => Direction::Newton(Newton::new(hessian_mod, mach_acc)),
            Algorithm::Bfgs => Direction::Bfgs(Bfgs::new(n)),
            Algorithm::ConjugateGradient(formula) => {
                Direction::ConjugateGradient(ConjugateGradient::new(*formula))
            }
            Algorithm::CoordinateDescent => {
                Direction::CoordinateDescent(CoordinateDescent::new(n))
            }
            Algorithm::SteepestDescent => Direction::SteepestDescent(SteepestDescent),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let algorithm = match normalize_name(s).as_str() {
            "newton" => Algorithm::Newton,
            "bfgs" => Algorithm::Bfgs,
            "cg" | "conjugate gradient" | "pr" | "polak ribiere" => {
                Algorithm::ConjugateGradient(CgFormula::PolakRibiere)
            }
            "fr" | "fletcher reeves" => Algorithm::ConjugateGradient(CgFormula::FletcherReeves),
            "pr+" | "polak ribiere+" | "polak ribiere plus" => {
                Algorithm::ConjugateGradient(CgFormula::PolakRibierePlus)
            }
            "hs" | "hestenes stiefel" => Algorithm::ConjugateGradient(CgFormula::HestenesStiefel),
            "cd" | "coordinate descent" => Algorithm::CoordinateDescent,
            "sd" | "steepest descent" => Algorithm::SteepestDescent,
            _ => return Err(ConfigError::UnknownAlgorithm(s.to_string())),
        };

        Ok(algorithm)
    }
}

/// Direction finder of the selected [`Algorithm`].
#[derive(Debug, Clone)]
pub enum Direction<T: RealField + Copy> {
    /// See [`Newton`].
    Newton(Newton<T>),
    /// See [`Bfgs`].
    Bfgs(Bfgs<T>),
    /// See [`ConjugateGradient`].
    ConjugateGradient(ConjugateGradient<T>),
    /// See [`CoordinateDescent`].
    CoordinateDescent(CoordinateDescent<T>),
    /// See [`SteepestDescent`].
    SteepestDescent(SteepestDescent),
}

impl<T: RealField + Copy> Direction<T> {
    /// Computes the search direction in the current iterate.
    pub fn direction(
        &mut self,
        state: &DirectionState<'_, T>,
    ) -> Result<DVector<T>, DirectionError> {
        let p = match self {
            Direction::Newton(finder) => finder.direction(state),
            Direction::Bfgs(finder) => finder.direction(state),
            Direction::ConjugateGradient(finder) => finder.direction(state),
            Direction::CoordinateDescent(finder) => finder.direction(state),
            Direction::SteepestDescent(finder) => finder.direction(state),
        }?;

        if p.iter().any(|v| !v.is_finite()) {
            return Err(DirectionError::NonFinite);
        }

        Ok(p)
    }

    /// Updates the state of the direction finder.
    pub fn update(
        &mut self,
        prev: &DirectionState<'_, T>,
        next: &DirectionState<'_, T>,
        alpha: T,
        p: &DVector<T>,
    ) {
        match self {
            Direction::Newton(finder) => finder.update(prev, next, alpha, p),
            Direction::Bfgs(finder) => finder.update(prev, next, alpha, p),
            Direction::ConjugateGradient(finder) => finder.update(prev, next, alpha, p),
            Direction::CoordinateDescent(finder) => finder.update(prev, next, alpha, p),
            Direction::SteepestDescent(finder) => finder.update(prev, next, alpha, p),
        }
    }

    /// Name of the method.
    pub fn name(&self) -> &'static str {
        match self {
            Direction::Newton(_) => Newton::<T>::NAME,
            Direction::Bfgs(_) => Bfgs::<T>::NAME,
            Direction::ConjugateGradient(_) => ConjugateGradient::<T>::NAME,
            Direction::CoordinateDescent(_) => CoordinateDescent::<T>::NAME,
            Direction::SteepestDescent(_) => <SteepestDescent as DirectionFinder<T>>::NAME,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!("Newton".parse::<Algorithm>().unwrap(), Algorithm::Newton);
        assert_eq!("BFGS".parse::<Algorithm>().unwrap(), Algorithm::Bfgs);
        assert_eq!(
            "conjugate-gradient".parse::<Algorithm>().unwrap(),
            Algorithm::ConjugateGradient(CgFormula::PolakRibiere)
        );
        assert_eq!(
            "Fletcher_Reeves".parse::<Algorithm>().unwrap(),
            Algorithm::ConjugateGradient(CgFormula::FletcherReeves)
        );
        assert_eq!(
            "PR+".parse::<Algorithm>().unwrap(),
            Algorithm::ConjugateGradient(CgFormula::PolakRibierePlus)
        );
        assert_eq!(
            "hs".parse::<Algorithm>().unwrap(),
            Algorithm::ConjugateGradient(CgFormula::HestenesStiefel)
        );
        assert_eq!(
            "Coordinate Descent".parse::<Algorithm>().unwrap(),
            Algorithm::CoordinateDescent
        );
        assert_eq!("sd".parse::<Algorithm>().unwrap(), Algorithm::SteepestDescent);
        assert!(matches!(
            "simplex".parse::<Algorithm>(),
            Err(ConfigError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn display_round_trip() {
        for algorithm in [
            Algorithm::Newton,
            Algorithm::Bfgs,
            Algorithm::ConjugateGradient(CgFormula::FletcherReeves),
            Algorithm::ConjugateGradient(CgFormula::PolakRibiere),
            Algorithm::ConjugateGradient(CgFormula::PolakRibierePlus),
            Algorithm::ConjugateGradient(CgFormula::HestenesStiefel),
            Algorithm::CoordinateDescent,
            Algorithm::SteepestDescent,
        ] {
            assert_eq!(algorithm.to_string().parse::<Algorithm>().unwrap(), algorithm);
        }
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn defaults() {
        assert_eq!(Algorithm::Newton.default_line_search(), LineSearch::MoreThuente);
        assert_eq!(
            Algorithm::CoordinateDescent.default_line_search(),
            LineSearch::Backtracking
        );
        assert_eq!(Algorithm::Bfgs.default_eta::<f64>(), 0.9);
        assert_eq!(
            Algorithm::ConjugateGradient(CgFormula::PolakRibiere).default_eta::<f64>(),
            0.1
        );
        assert!(Algorithm::Newton.uses_hessian());
        assert!(!Algorithm::Bfgs.uses_hessian());
    }

    #[test]
    fn direction_finder_names() {
        let names: Vec<_> = [
            Algorithm::Newton,
            Algorithm::Bfgs,
            Algorithm::ConjugateGradient(CgFormula::HestenesStiefel),
            Algorithm::CoordinateDescent,
            Algorithm::SteepestDescent,
        ]
        .iter()
        .map(|algorithm| algorithm.direction_finder::<f64>(2, HessianMod::Gmw, 1e-16).name())
        .collect();

        assert_eq!(
            names,
            vec![
                "Newton",
                "BFGS",
                "conjugate gradient",
                "coordinate descent",
                "steepest descent"
            ]
        );
    }
}
