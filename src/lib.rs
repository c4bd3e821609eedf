#![allow(clippy::many_single_char_names)]
#![allow(clippy::type_complexity)]
#![warn(missing_docs)]

//! # Minfit
//!
//! A pure Rust framework and implementation of derivative-based methods for
//! nonlinear minimisation, designed for fitting parametric models to
//! experimental data.
//!
//! The library provides a family of direction finders, line searches and
//! Hessian modifications that can be freely combined, together with a
//! brute-force grid search with constraint filtering for finding good
//! initial points.
//!
//! ## Algorithms
//!
//! * [Newton](algo::newton) -- Recommended method to be used as a default if
//!   the Hessian is available. Indefinite Hessians are handled by a
//!   [Hessian modification](hessian_mod).
//! * [BFGS](algo::bfgs) -- Quasi-Newton method that needs only the gradient.
//! * [Conjugate gradient](algo::conjugate_gradient) -- Low memory method for
//!   large problems, with Fletcher-Reeves, Polak-Ribière(+) and
//!   Hestenes-Stiefel formulas.
//! * [Coordinate descent](algo::coordinate_descent) -- Back-and-forth search
//!   along the coordinate axes.
//! * [Steepest descent](algo::steepest_descent) -- Baseline.
//!
//! The step length is chosen by one of the [line searches](line_search):
//! backtracking, Nocedal-Wright interpolation, Nocedal-Wright Wolfe search
//! and Moré-Thuente search.
//!
//! ## Problem
//!
//! The problem is to find the parameters `x` minimising a scalar function
//! `f(x)`, typically the chi-squared of a model against measured data. In
//! code, the problem is any type that implements the [`Function`],
//! [`Differentiable`] and [`Problem`] traits.
//!
//! ```rust
//! use minfit::nalgebra as na;
//! use minfit::{Differentiable, Function, Problem, ProblemError};
//!
//! // A problem is represented by a type.
//! struct Rosenbrock {
//!     a: f64,
//!     b: f64,
//! }
//!
//! impl Problem for Rosenbrock {
//!     // The numeric type. Usually f64 or f32.
//!     type Field = f64;
//!
//!     // Number of free parameters.
//!     fn dim(&self) -> usize {
//!         2
//!     }
//! }
//!
//! impl Function for Rosenbrock {
//!     fn apply(&self, x: &na::DVector<Self::Field>) -> Result<Self::Field, ProblemError> {
//!         Ok((self.a - x[0]).powi(2) + self.b * (x[1] - x[0].powi(2)).powi(2))
//!     }
//! }
//!
//! impl Differentiable for Rosenbrock {
//!     fn gradient(
//!         &self,
//!         x: &na::DVector<Self::Field>,
//!         grad: &mut na::DVector<Self::Field>,
//!     ) -> Result<(), ProblemError> {
//!         grad[0] = -2.0 * (self.a - x[0]) - 4.0 * self.b * x[0] * (x[1] - x[0].powi(2));
//!         grad[1] = 2.0 * self.b * (x[1] - x[0].powi(2));
//!         Ok(())
//!     }
//! }
//! ```
//!
//! For quick experiments, [`Objective`] builds the problem from closures.
//! Functions without analytic derivatives can be wrapped in
//! [`FiniteDifference`](derivatives::FiniteDifference).
//!
//! ## Minimising
//!
//! When you have your function available, use the [`MinimiserDriver`] (or
//! the [`minimise`] shortcut) to run the iteration process until the
//! convergence tests are satisfied.
//!
//! ```rust
//! use minfit::{minimise, MinimiserOptions, Termination};
//! # use minfit::nalgebra as na;
//! # use minfit::{Differentiable, Function, Problem, ProblemError};
//! #
//! # struct Rosenbrock {
//! #     a: f64,
//! #     b: f64,
//! # }
//! #
//! # impl Problem for Rosenbrock {
//! #     type Field = f64;
//! #
//! #     fn dim(&self) -> usize {
//! #         2
//! #     }
//! # }
//! #
//! # impl Function for Rosenbrock {
//! #     fn apply(&self, x: &na::DVector<Self::Field>) -> Result<Self::Field, ProblemError> {
//! #         Ok((self.a - x[0]).powi(2) + self.b * (x[1] - x[0].powi(2)).powi(2))
//! #     }
//! # }
//! #
//! # impl Differentiable for Rosenbrock {
//! #     fn gradient(
//! #         &self,
//! #         x: &na::DVector<Self::Field>,
//! #         grad: &mut na::DVector<Self::Field>,
//! #     ) -> Result<(), ProblemError> {
//! #         grad[0] = -2.0 * (self.a - x[0]) - 4.0 * self.b * x[0] * (x[1] - x[0].powi(2));
//! #         grad[1] = 2.0 * self.b * (x[1] - x[0].powi(2));
//! #         Ok(())
//! #     }
//! # }
//!
//! let f = Rosenbrock { a: 1.0, b: 100.0 };
//! let options = MinimiserOptions::from_names("bfgs", &["more thuente"])?;
//!
//! let result = minimise(&f, vec![-1.2, 1.0], &options)?;
//!
//! match result.termination {
//!     Termination::FunctionTolerance | Termination::GradientTolerance => {
//!         println!("minimum {} at {:?}", result.fx, result.x);
//!     }
//!     termination => println!("{}", termination),
//! }
//! # Ok::<(), minfit::ConfigError>(())
//! ```
//!
//! ## Initial point
//!
//! Local methods need a reasonable initial point. The [grid search](grid)
//! evaluates the function over a lattice, skipping points that violate the
//! constraints, and returns the best point.
//!
//! ## Constraints
//!
//! Linear, bound and general inequality [constraints](Constraint) are
//! handled by the [method of multipliers](constrained), see
//! [`minimise_constrained`]. It reuses any of the algorithms above for the
//! inner minimisations.
//!
//! ## License
//!
//! Licensed under MIT.

pub mod algo;
pub mod constrained;
mod core;
pub mod derivatives;
pub mod driver;
pub mod grid;
pub mod hessian_mod;
pub mod line_search;

pub use constrained::{minimise_constrained, MultiplierOptions};
pub use core::*;
pub use driver::{
    minimise, ConfigError, MinimiserDriver, MinimiserOptions, Termination, TerminationResult,
};
pub use grid::{grid_search, GridAxis, GridError, GridResult, GridSpec};
pub use hessian_mod::HessianMod;
pub use line_search::LineSearch;

#[cfg(feature = "testing")]
pub mod testing;

#[cfg(not(feature = "testing"))]
pub(crate) mod testing;

pub use nalgebra;
