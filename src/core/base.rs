use nalgebra::RealField;
use thiserror::Error;

/// The base trait for [`Function`](super::function::Function) and
/// [`Differentiable`](super::function::Differentiable).
pub trait Problem {
    /// Type of the field, usually f32 or f64.
    type Field: RealField + Copy;

    /// Number of free parameters of the model.
    fn dim(&self) -> usize;
}

/// Error encountered while applying variables to the function.
#[derive(Debug, Error)]
pub enum ProblemError {
    /// The number of variables does not match the dimensionality
    /// ([`Problem::dim`]) of the problem.
    #[error("invalid dimensionality")]
    InvalidDimensionality,
    /// An invalid value (NaN, positive or negative infinity) of the function
    /// value or a derivative occurred.
    #[error("invalid value encountered")]
    InvalidValue,
    /// The Hessian matrix was requested from a problem that does not provide
    /// it.
    #[error("hessian is not available")]
    HessianUnavailable,
    /// A custom error specific to the function.
    #[error("{0}")]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}
