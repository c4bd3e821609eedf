use nalgebra::{convert, DMatrix, DVector, RealField};
use num_traits::{One, Zero};
use thiserror::Error;

use crate::derivatives::EPSILON_SQRT;

/// Inequality constraints `c(x) >= 0` (componentwise).
///
/// The trait is implemented for [`LinearConstraints`] and for any closure
/// `Fn(&DVector<T>) -> DVector<T>`, which covers general constraint
/// functions.
pub trait Constraint<T: RealField + Copy> {
    /// Evaluates the constraint values in given point. The point is feasible
    /// if all values are non-negative.
    fn eval(&self, x: &DVector<T>) -> DVector<T>;

    /// Tests whether given point satisfies all constraints.
    fn is_feasible(&self, x: &DVector<T>) -> bool {
        self.eval(x).iter().all(|ci| *ci >= T::zero())
    }

    /// Number of parameters the constraints are defined over, if known in
    /// advance. Closures return `None`.
    fn dim(&self) -> Option<usize> {
        None
    }

    /// Calculates the `m×n` Jacobian of the constraint values in given point
    /// and stores it into `jac`.
    ///
    /// If not overridden, the Jacobian is approximated by forward
    /// differences.
    fn eval_jacobian(&self, x: &DVector<T>, jac: &mut DMatrix<T>) {
        let eps: T = convert(EPSILON_SQRT);
        let c0 = self.eval(x);
        let mut x = x.clone_owned();

        for j in 0..x.len() {
            let xj = x[j];
            let step = eps * xj.abs().max(T::one());

            x[j] = xj + step;
            let cj = self.eval(&x);
            jac.set_column(j, &((cj - &c0) / step));

            x[j] = xj;
        }
    }
}

impl<T, C> Constraint<T> for C
where
    T: RealField + Copy,
    C: Fn(&DVector<T>) -> DVector<T>,
{
    fn eval(&self, x: &DVector<T>) -> DVector<T> {
        self(x)
    }
}

/// Error when constructing linear constraints.
#[derive(Debug, Error)]
pub enum ConstraintError {
    /// Sizes of the matrix and the vectors are not compatible.
    #[error("dimension mismatch in constraint system")]
    DimensionMismatch,
}

/// System of `m` linear inequality constraints `A·x >= b` over `n`
/// parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraints<T: RealField + Copy> {
    a: DMatrix<T>,
    b: DVector<T>,
}

impl<T: RealField + Copy> LinearConstraints<T> {
    /// Creates the constraint system from `m×n` matrix `A` and vector `b` of
    /// length `m`.
    pub fn new(a: DMatrix<T>, b: DVector<T>) -> Result<Self, ConstraintError> {
        if a.nrows() != b.len() {
            return Err(ConstraintError::DimensionMismatch);
        }

        Ok(Self { a, b })
    }

    /// Expresses the bounds `l <= x <= u` as linear constraints `[I; -I]·x >=
    /// [l; -u]`. Infinite bounds are dropped.
    pub fn from_bounds(lower: &[T], upper: &[T]) -> Result<Self, ConstraintError> {
        if lower.len() != upper.len() {
            return Err(ConstraintError::DimensionMismatch);
        }

        let n = lower.len();
        let mut rows = Vec::new();

        for (i, li) in lower.iter().enumerate() {
            if li.is_finite() {
                rows.push((i, T::one(), *li));
            }
        }

        for (i, ui) in upper.iter().enumerate() {
            if ui.is_finite() {
                rows.push((i, -T::one(), -*ui));
            }
        }

        let mut a = DMatrix::zeros(rows.len(), n);
        let mut b = DVector::zeros(rows.len());

        for (row, (i, coef, bound)) in rows.into_iter().enumerate() {
            a[(row, i)] = coef;
            b[row] = bound;
        }

        Self::new(a, b)
    }

    /// Number of parameters `n`.
    pub fn dim(&self) -> usize {
        self.a.ncols()
    }

    /// Number of constraints `m`.
    pub fn len(&self) -> usize {
        self.a.nrows()
    }

    /// Returns `true` if there are no constraints.
    pub fn is_empty(&self) -> bool {
        self.a.nrows() == 0
    }

    /// The constant Jacobian of the constraints, i.e., matrix `A`.
    pub fn jacobian(&self) -> &DMatrix<T> {
        &self.a
    }

    /// The right-hand side `b`.
    pub fn rhs(&self) -> &DVector<T> {
        &self.b
    }
}

impl<T: RealField + Copy> Constraint<T> for LinearConstraints<T> {
    fn eval(&self, x: &DVector<T>) -> DVector<T> {
        &self.a * x - &self.b
    }

    fn dim(&self) -> Option<usize> {
        Some(self.a.ncols())
    }

    fn eval_jacobian(&self, _: &DVector<T>, jac: &mut DMatrix<T>) {
        jac.copy_from(&self.a);
    }

    fn is_feasible(&self, x: &DVector<T>) -> bool {
        // Row by row so that no temporary vector is needed.
        self.a
            .row_iter()
            .zip(self.b.iter())
            .all(|(row, bi)| row.transpose().dot(x) >= *bi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn linear_eval() {
        let c = LinearConstraints::new(dmatrix![1.0, 0.0; 1.0, 1.0], dvector![3.0, 1.0]).unwrap();

        assert_eq!(c.eval(&dvector![4.0, -1.0]), dvector![1.0, 2.0]);
        assert_eq!(c.jacobian(), &dmatrix![1.0, 0.0; 1.0, 1.0]);
        assert_eq!(c.dim(), 2);
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn linear_feasibility() {
        let c = LinearConstraints::new(dmatrix![1.0], dvector![3.0]).unwrap();

        assert!(!c.is_feasible(&dvector![2.0]));
        assert!(c.is_feasible(&dvector![3.0]));
        assert!(c.is_feasible(&dvector![4.0]));
    }

    #[test]
    fn linear_dimension_mismatch() {
        assert!(matches!(
            LinearConstraints::new(dmatrix![1.0, 0.0], dvector![1.0, 2.0]),
            Err(ConstraintError::DimensionMismatch)
        ));
    }

    #[test]
    fn bounds() {
        let c = LinearConstraints::from_bounds(&[0.0, f64::NEG_INFINITY], &[1.0, 2.0]).unwrap();

        assert_eq!(c.len(), 3);
        assert!(c.is_feasible(&dvector![0.5, -100.0]));
        assert!(!c.is_feasible(&dvector![1.5, 0.0]));
        assert!(!c.is_feasible(&dvector![0.5, 2.5]));
    }

    #[test]
    fn closure_constraint() {
        let unit_disk = |x: &DVector<f64>| dvector![1.0 - x.norm_squared()];

        assert!(unit_disk.is_feasible(&dvector![0.5, 0.5]));
        assert!(!unit_disk.is_feasible(&dvector![1.0, 1.0]));
        assert_eq!(Constraint::<f64>::dim(&unit_disk), None);
    }

    #[test]
    fn jacobians() {
        let c = LinearConstraints::from_bounds(&[0.0, 1.0], &[f64::INFINITY, 2.0]).unwrap();
        let mut jac = DMatrix::zeros(3, 2);
        c.eval_jacobian(&dvector![5.0, 5.0], &mut jac);

        assert_eq!(jac, dmatrix![1.0, 0.0; 0.0, 1.0; 0.0, -1.0]);
        assert_eq!(Constraint::dim(&c), Some(2));

        let unit_disk = |x: &DVector<f64>| dvector![1.0 - x.norm_squared()];
        let mut jac = DMatrix::zeros(1, 2);
        unit_disk.eval_jacobian(&dvector![0.5, -1.0], &mut jac);

        assert_abs_diff_eq!(jac, dmatrix![-1.0, 2.0], epsilon = 1e-6);
    }
}
