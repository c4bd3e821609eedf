//! Core abstractions and types for minfit.
//!
//! *Users* are mainly interested in implementing the [`Function`] and
//! [`Differentiable`] traits (or using the closure-based [`Objective`]),
//! optionally specifying [constraints](Constraint) for the grid search and the
//! constrained minimisation.

mod base;
mod constraint;
mod function;

pub use base::*;
pub use constraint::*;
pub use function::*;
