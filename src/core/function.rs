use std::marker::PhantomData;

use nalgebra::{DMatrix, DVector, RealField};

use super::base::{Problem, ProblemError};

/// The trait for defining objective functions.
///
/// ## Defining a function
///
/// A function is any type that implements [`Function`] and [`Problem`] traits.
/// There is one required associated type (the field) and two required
/// methods: [`apply`](Function::apply) and [`dim`](Problem::dim).
///
/// ```rust
/// use minfit::nalgebra as na;
/// use minfit::{Function, Problem, ProblemError};
///
/// // A problem is represented by a type.
/// struct Rosenbrock {
///     a: f64,
///     b: f64,
/// }
///
/// impl Problem for Rosenbrock {
///     // The numeric type. Usually f64 or f32.
///     type Field = f64;
///
///     // Number of free parameters.
///     fn dim(&self) -> usize {
///         2
///     }
/// }
///
/// impl Function for Rosenbrock {
///     // Apply trial values of variables to the function.
///     fn apply(&self, x: &na::DVector<Self::Field>) -> Result<Self::Field, ProblemError> {
///         Ok((self.a - x[0]).powi(2) + self.b * (x[1] - x[0].powi(2)).powi(2))
///     }
/// }
/// ```
pub trait Function: Problem {
    /// Calculate the function value given values of the variables.
    fn apply(&self, x: &DVector<Self::Field>) -> Result<Self::Field, ProblemError>;
}

/// Functions with known first (and optionally second) derivatives.
///
/// All minimisers in this crate are derivative-based. For a function without
/// analytic derivatives, wrap it in
/// [`FiniteDifference`](crate::derivatives::FiniteDifference).
pub trait Differentiable: Function {
    /// Calculate the gradient vector in given point and store it into `grad`.
    fn gradient(
        &self,
        x: &DVector<Self::Field>,
        grad: &mut DVector<Self::Field>,
    ) -> Result<(), ProblemError>;

    /// Calculate the Hessian matrix in given point and store it into `hes`.
    ///
    /// If not overridden, [`ProblemError::HessianUnavailable`] is returned.
    /// Implementors providing the Hessian must also override
    /// [`has_hessian`](Differentiable::has_hessian).
    fn hessian(
        &self,
        x: &DVector<Self::Field>,
        hes: &mut DMatrix<Self::Field>,
    ) -> Result<(), ProblemError> {
        let _ = (x, hes);
        Err(ProblemError::HessianUnavailable)
    }

    /// Whether [`hessian`](Differentiable::hessian) is implemented.
    fn has_hessian(&self) -> bool {
        false
    }
}

/// Objective built from plain closures for the value, the gradient and
/// optionally the Hessian.
///
/// ```rust
/// use minfit::nalgebra::{DMatrix, DVector};
/// use minfit::Objective;
///
/// let f = Objective::new(
///     2,
///     |x: &DVector<f64>| x.dot(x),
///     |x: &DVector<f64>| x * 2.0,
/// )
/// .with_hessian(|_: &DVector<f64>| DMatrix::identity(2, 2) * 2.0);
/// ```
pub struct Objective<T, F, G, H = fn(&DVector<T>) -> DMatrix<T>> {
    dim: usize,
    f: F,
    g: G,
    h: Option<H>,
    field: PhantomData<T>,
}

impl<T, F, G> Objective<T, F, G>
where
    T: RealField + Copy,
    F: Fn(&DVector<T>) -> T,
    G: Fn(&DVector<T>) -> DVector<T>,
{
    /// Creates the objective with given number of parameters, function and
    /// gradient.
    pub fn new(dim: usize, f: F, g: G) -> Self {
        Self {
            dim,
            f,
            g,
            h: None,
            field: PhantomData,
        }
    }
}

impl<T, F, G, H> Objective<T, F, G, H> {
    /// Adds the Hessian function.
    pub fn with_hessian<H2>(self, h: H2) -> Objective<T, F, G, H2>
    where
        H2: Fn(&DVector<T>) -> DMatrix<T>,
    {
        Objective {
            dim: self.dim,
            f: self.f,
            g: self.g,
            h: Some(h),
            field: PhantomData,
        }
    }
}

impl<T, F, G, H> Problem for Objective<T, F, G, H>
where
    T: RealField + Copy,
{
    type Field = T;

    fn dim(&self) -> usize {
        self.dim
    }
}

impl<T, F, G, H> Function for Objective<T, F, G, H>
where
    T: RealField + Copy,
    F: Fn(&DVector<T>) -> T,
{
    fn apply(&self, x: &DVector<T>) -> Result<T, ProblemError> {
        if x.len() != self.dim {
            return Err(ProblemError::InvalidDimensionality);
        }

        Ok((self.f)(x))
    }
}

impl<T, F, G, H> Differentiable for Objective<T, F, G, H>
where
    T: RealField + Copy,
    F: Fn(&DVector<T>) -> T,
    G: Fn(&DVector<T>) -> DVector<T>,
    H: Fn(&DVector<T>) -> DMatrix<T>,
{
    fn gradient(&self, x: &DVector<T>, grad: &mut DVector<T>) -> Result<(), ProblemError> {
        if x.len() != self.dim || grad.len() != self.dim {
            return Err(ProblemError::InvalidDimensionality);
        }

        let g = (self.g)(x);
        if g.len() != self.dim {
            return Err(ProblemError::InvalidDimensionality);
        }

        grad.copy_from(&g);
        Ok(())
    }

    fn hessian(&self, x: &DVector<T>, hes: &mut DMatrix<T>) -> Result<(), ProblemError> {
        let h = self.h.as_ref().ok_or(ProblemError::HessianUnavailable)?;

        if x.len() != self.dim || hes.shape() != (self.dim, self.dim) {
            return Err(ProblemError::InvalidDimensionality);
        }

        let m = h(x);
        if m.shape() != (self.dim, self.dim) {
            return Err(ProblemError::InvalidDimensionality);
        }

        hes.copy_from(&m);
        Ok(())
    }

    fn has_hessian(&self) -> bool {
        self.h.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nalgebra::{dmatrix, dvector};

    fn paraboloid() -> Objective<
        f64,
        impl Fn(&DVector<f64>) -> f64,
        impl Fn(&DVector<f64>) -> DVector<f64>,
    > {
        Objective::new(
            2,
            |x: &DVector<f64>| x[0].powi(2) + 3.0 * x[1].powi(2),
            |x: &DVector<f64>| dvector![2.0 * x[0], 6.0 * x[1]],
        )
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn objective_closures() {
        let f = paraboloid().with_hessian(|_: &DVector<f64>| dmatrix![2.0, 0.0; 0.0, 6.0]);
        let x = dvector![1.0, 2.0];

        assert_eq!(f.apply(&x).unwrap(), 13.0);

        let mut grad = DVector::zeros(2);
        f.gradient(&x, &mut grad).unwrap();
        assert_eq!(grad, dvector![2.0, 12.0]);

        let mut hes = DMatrix::zeros(2, 2);
        f.hessian(&x, &mut hes).unwrap();
        assert_eq!(hes, dmatrix![2.0, 0.0; 0.0, 6.0]);
        assert!(f.has_hessian());
    }

    #[test]
    fn objective_without_hessian() {
        let f = paraboloid();
        let mut hes = DMatrix::zeros(2, 2);

        assert!(!f.has_hessian());
        assert!(matches!(
            f.hessian(&dvector![0.0, 0.0], &mut hes),
            Err(ProblemError::HessianUnavailable)
        ));
    }

    #[test]
    fn objective_dimension_checked() {
        let f = paraboloid();
        let mut grad = DVector::zeros(3);

        assert!(matches!(
            f.apply(&dvector![1.0, 2.0, 3.0]),
            Err(ProblemError::InvalidDimensionality)
        ));
        assert!(matches!(
            f.gradient(&dvector![1.0, 2.0, 3.0], &mut grad),
            Err(ProblemError::InvalidDimensionality)
        ));
    }
}
