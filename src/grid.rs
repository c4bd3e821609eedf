//! Grid search over a Cartesian lattice.
//!
//! The grid search is used to find a good initial point for the iterative
//! minimisers. The objective is evaluated in every point of a lattice given
//! by a [`GridSpec`], and the point with the lowest value is returned.
//! Points violating the [constraints](Constraint) are skipped without
//! evaluating the objective, so they do not count into
//! [`GridResult::evaluations`].
//!
//! ```rust
//! use minfit::nalgebra::{dmatrix, dvector, DVector};
//! use minfit::grid::{grid_search, GridAxis, GridSpec};
//! use minfit::{LinearConstraints, Objective};
//!
//! let f = Objective::new(
//!     1,
//!     |x: &DVector<f64>| (x[0] - 2.0).powi(2),
//!     |x: &DVector<f64>| dvector![2.0 * (x[0] - 2.0)],
//! );
//!
//! let spec = GridSpec::new(vec![GridAxis::new(5, 0.0, 4.0).unwrap()]);
//! let constraint = LinearConstraints::new(dmatrix![1.0], dvector![3.0]).unwrap();
//!
//! let result = grid_search(&f, &spec, Some(&constraint)).unwrap();
//!
//! assert_eq!(result.x, dvector![3.0]);
//! assert_eq!(result.evaluations, 2);
//! ```

use log::{debug, trace};
use nalgebra::{convert, DVector, RealField, ComplexField};
use num_traits::Zero;
use thiserror::Error;

use crate::core::{Constraint, Function, ProblemError};

/// The maximum number of lattice points a grid search agrees to enumerate.
pub const MAX_GRID_POINTS: usize = 100_000_000;

/// Error of the grid search.
#[derive(Debug, Error)]
pub enum GridError {
    /// An axis without any value.
    #[error("grid axis has no values")]
    EmptyAxis,
    /// Lower bound greater than the upper bound or non-finite bounds.
    #[error("invalid grid bounds")]
    InvalidBounds,
    /// The lattice is too large. The size is `None` if it overflows `usize`.
    #[error("grid of size {} is too large", fmt_size(.size))]
    TooLarge {
        /// Number of lattice points, if representable.
        size: Option<usize>,
    },
    /// Dimension of the grid does not match the dimension of the problem or
    /// of the constraints.
    #[error("grid dimension does not match the problem")]
    DimensionMismatch,
    /// All points violate the constraints.
    #[error("no feasible grid point")]
    NoFeasiblePoint,
    /// The function value is not finite in any feasible point.
    #[error("no finite function value on the grid")]
    NoFiniteValue,
    /// Error of the objective function.
    #[error("{0}")]
    Problem(#[from] ProblemError),
}

fn fmt_size(size: &Option<usize>) -> String {
    match size {
        Some(size) => size.to_string(),
        None => "overflowing usize".to_string(),
    }
}

/// Values of a single parameter on the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridAxis<T: RealField + Copy> {
    values: Vec<T>,
}

impl<T: RealField + Copy> GridAxis<T> {
    /// Linear axis of `num_increments` values from `lower` to `upper`
    /// (inclusive). A single increment gives the midpoint of the interval.
    pub fn new(num_increments: usize, lower: T, upper: T) -> Result<Self, GridError> {
        if num_increments == 0 {
            return Err(GridError::EmptyAxis);
        }

        if !lower.is_finite() || !upper.is_finite() || lower > upper {
            return Err(GridError::InvalidBounds);
        }

        // Each value is computed from the bounds, repeated addition of the
        // increment would accumulate round-off.
        let values = if num_increments == 1 {
            vec![(lower + upper) / convert(2.0)]
        } else {
            let last: T = convert(num_increments as f64 - 1.0);
            (0..num_increments)
                .map(|i| {
                    let i: T = convert(i as f64);
                    lower + i * (upper - lower) / last
                })
                .collect()
        };

        Ok(Self { values })
    }

    /// Axis with explicitly given values.
    pub fn from_values(values: Vec<T>) -> Result<Self, GridError> {
        if values.is_empty() {
            return Err(GridError::EmptyAxis);
        }

        if values.iter().any(|v| !v.is_finite()) {
            return Err(GridError::InvalidBounds);
        }

        Ok(Self { values })
    }

    /// Values of the axis.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always `false`, an axis has at least one value.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Cartesian lattice of candidate points, one [`GridAxis`] per parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec<T: RealField + Copy> {
    axes: Vec<GridAxis<T>>,
}

impl<T: RealField + Copy> GridSpec<T> {
    /// Lattice from given axes.
    pub fn new(axes: Vec<GridAxis<T>>) -> Self {
        Self { axes }
    }

    /// Lattice with the same linear axis for all `n` parameters.
    pub fn uniform(n: usize, num_increments: usize, lower: T, upper: T) -> Result<Self, GridError> {
        let axis = GridAxis::new(num_increments, lower, upper)?;
        Ok(Self {
            axes: vec![axis; n],
        })
    }

    /// Number of parameters.
    pub fn dim(&self) -> usize {
        self.axes.len()
    }

    /// The axes.
    pub fn axes(&self) -> &[GridAxis<T>] {
        &self.axes
    }

    /// Number of lattice points. Fails if the number exceeds
    /// [`MAX_GRID_POINTS`].
    pub fn size(&self) -> Result<usize, GridError> {
        let size = self
            .axes
            .iter()
            .try_fold(1usize, |size, axis| size.checked_mul(axis.len()));

        match size {
            Some(size) if size <= MAX_GRID_POINTS => Ok(size),
            size => Err(GridError::TooLarge { size }),
        }
    }

    /// Iterator over all lattice points. The first parameter varies fastest.
    pub fn points(&self) -> GridPoints<'_, T> {
        GridPoints {
            spec: self,
            indices: vec![0; self.axes.len()],
            done: self.axes.iter().any(|axis| axis.is_empty()),
        }
    }
}

/// Odometer iterator over the points of a [`GridSpec`].
#[derive(Debug, Clone)]
pub struct GridPoints<'a, T: RealField + Copy> {
    spec: &'a GridSpec<T>,
    indices: Vec<usize>,
    done: bool,
}

impl<'a, T: RealField + Copy> Iterator for GridPoints<'a, T> {
    type Item = DVector<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let axes = &self.spec.axes;
        let point = DVector::from_iterator(
            axes.len(),
            axes.iter()
                .zip(self.indices.iter())
                .map(|(axis, &i)| axis.values[i]),
        );

        // Increment the least significant digit and carry.
        self.done = true;
        for (index, axis) in self.indices.iter_mut().zip(axes.iter()) {
            *index += 1;
            if *index < axis.len() {
                self.done = false;
                break;
            }
            *index = 0;
        }

        Some(point)
    }
}

/// Result of the grid search.
#[derive(Debug, Clone, PartialEq)]
pub struct GridResult<T: RealField + Copy> {
    /// The best point.
    pub x: DVector<T>,
    /// Function value in the best point.
    pub fx: T,
    /// Number of function evaluations, i.e., the number of feasible points.
    pub evaluations: usize,
}

fn check_constraint_dim<T: RealField + Copy>(
    constraint: Option<&dyn Constraint<T>>,
    dim: usize,
) -> Result<(), GridError> {
    match constraint.and_then(|c| c.dim()) {
        Some(n) if n != dim => Err(GridError::DimensionMismatch),
        _ => Ok(()),
    }
}

/// Feasibility test that also checks that a constraint of unknown dimension
/// keeps the number of its values.
struct Feasibility<'c, T: RealField + Copy> {
    constraint: Option<&'c dyn Constraint<T>>,
    len: Option<usize>,
}

impl<'c, T: RealField + Copy> Feasibility<'c, T> {
    fn new(constraint: Option<&'c dyn Constraint<T>>) -> Self {
        Self {
            constraint,
            len: None,
        }
    }

    fn check(&mut self, x: &DVector<T>) -> Result<bool, GridError> {
        let constraint = match self.constraint {
            Some(constraint) => constraint,
            None => return Ok(true),
        };

        if constraint.dim().is_some() {
            return Ok(constraint.is_feasible(x));
        }

        let c = constraint.eval(x);
        match self.len {
            Some(len) if len != c.len() => return Err(GridError::DimensionMismatch),
            _ => self.len = Some(c.len()),
        }

        Ok(c.iter().all(|ci| *ci >= T::zero()))
    }
}

/// Evaluates the function over the lattice and returns the point with the
/// lowest value.
///
/// Infeasible points are skipped without evaluating the function. Ties keep
/// the first point in the iteration order and non-finite values are never
/// selected. A lattice of zero parameters evaluates the function once.
pub fn grid_search<F: Function>(
    f: &F,
    spec: &GridSpec<F::Field>,
    constraint: Option<&dyn Constraint<F::Field>>,
) -> Result<GridResult<F::Field>, GridError> {
    if spec.dim() != f.dim() {
        return Err(GridError::DimensionMismatch);
    }

    check_constraint_dim(constraint, spec.dim())?;

    let size = spec.size()?;
    debug!("searching through {} grid nodes", size);

    grid_search_points(f, spec.points(), constraint)
}

/// Same as [`grid_search`], but over an explicit list of points.
pub fn grid_search_points<F, I>(
    f: &F,
    points: I,
    constraint: Option<&dyn Constraint<F::Field>>,
) -> Result<GridResult<F::Field>, GridError>
where
    F: Function,
    I: IntoIterator<Item = DVector<F::Field>>,
{
    check_constraint_dim(constraint, f.dim())?;

    let mut feasibility = Feasibility::new(constraint);
    let mut best: Option<(DVector<F::Field>, F::Field)> = None;
    let mut evaluations = 0;

    for x in points {
        if x.len() != f.dim() {
            return Err(GridError::DimensionMismatch);
        }

        if !feasibility.check(&x)? {
            trace!("constraint violated, skipping grid point {:?}", x.as_slice());
            continue;
        }

        let fx = match f.apply(&x) {
            Ok(fx) => fx,
            Err(ProblemError::InvalidValue) => {
                evaluations += 1;
                continue;
            }
            Err(error) => return Err(error.into()),
        };
        evaluations += 1;

        if !fx.is_finite() {
            continue;
        }

        let improved = match &best {
            Some((_, best_fx)) => fx < *best_fx,
            None => true,
        };

        if improved {
            trace!("grid minimum f = {} at {:?}", fx, x.as_slice());
            best = Some((x, fx));
        }
    }

    match best {
        Some((x, fx)) => {
            debug!("grid search done after {} evaluations, f = {}", evaluations, fx);
            Ok(GridResult { x, fx, evaluations })
        }
        None if evaluations == 0 => Err(GridError::NoFeasiblePoint),
        None => Err(GridError::NoFiniteValue),
    }
}

/// Partitions the feasible lattice points into `divisions` contiguous blocks
/// whose sizes differ by at most one. The blocks can be passed to
/// [`grid_search_points`] on separate threads and the best of the results
/// taken.
///
/// Zero divisions are treated as one.
pub fn grid_split<T: RealField + Copy>(
    spec: &GridSpec<T>,
    divisions: usize,
    constraint: Option<&dyn Constraint<T>>,
) -> Result<Vec<Vec<DVector<T>>>, GridError> {
    check_constraint_dim(constraint, spec.dim())?;
    spec.size()?;

    let mut feasibility = Feasibility::new(constraint);
    let mut feasible = Vec::new();

    for x in spec.points() {
        if feasibility.check(&x)? {
            feasible.push(x);
        }
    }

    if feasible.is_empty() {
        return Err(GridError::NoFeasiblePoint);
    }

    let divisions = divisions.max(1);
    let base = feasible.len() / divisions;
    let extra = feasible.len() % divisions;

    let mut blocks = Vec::with_capacity(divisions);
    let mut points = feasible.into_iter();

    for i in 0..divisions {
        let len = if i < extra { base + 1 } else { base };
        blocks.push(points.by_ref().take(len).collect());
    }

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LinearConstraints, Objective, Problem};

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};

    // (x - 2)^2
    struct Parabola;

    impl Problem for Parabola {
        type Field = f64;

        fn dim(&self) -> usize {
            1
        }
    }

    impl Function for Parabola {
        fn apply(&self, x: &DVector<f64>) -> Result<f64, ProblemError> {
            Ok((x[0] - 2.0).powi(2))
        }
    }

    fn parabola() -> Parabola {
        Parabola
    }

    #[test]
    fn axis_values() {
        let axis = GridAxis::new(5, 0.0, 4.0).unwrap();
        assert_eq!(axis.values(), &[0.0, 1.0, 2.0, 3.0, 4.0]);

        let axis = GridAxis::new(1, 1.0, 3.0).unwrap();
        assert_eq!(axis.values(), &[2.0]);

        assert!(matches!(GridAxis::new(0, 0.0, 1.0), Err(GridError::EmptyAxis)));
        assert!(matches!(
            GridAxis::new(3, 1.0, 0.0),
            Err(GridError::InvalidBounds)
        ));
        assert!(matches!(
            GridAxis::<f64>::from_values(Vec::new()),
            Err(GridError::EmptyAxis)
        ));
    }

    #[test]
    fn axis_values_without_drift() {
        let axis = GridAxis::new(11, 0.0, 1.0).unwrap();
        assert_eq!(axis.values()[10], 1.0);
        assert_abs_diff_eq!(axis.values()[3], 0.3);
    }

    #[test]
    fn odometer_order() {
        let spec = GridSpec::new(vec![
            GridAxis::from_values(vec![0.0, 1.0]).unwrap(),
            GridAxis::from_values(vec![10.0, 20.0, 30.0]).unwrap(),
        ]);

        let points: Vec<_> = spec.points().collect();

        assert_eq!(spec.size().unwrap(), 6);
        assert_eq!(
            points,
            vec![
                dvector![0.0, 10.0],
                dvector![1.0, 10.0],
                dvector![0.0, 20.0],
                dvector![1.0, 20.0],
                dvector![0.0, 30.0],
                dvector![1.0, 30.0],
            ]
        );
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn exact_minimum() {
        let spec = GridSpec::new(vec![GridAxis::new(5, 0.0, 4.0).unwrap()]);
        let result = grid_search(&parabola(), &spec, None).unwrap();

        assert_eq!(result.x, dvector![2.0]);
        assert_eq!(result.fx, 0.0);
        assert_eq!(result.evaluations, 5);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn infeasible_points_not_evaluated() {
        let spec = GridSpec::new(vec![GridAxis::new(5, 0.0, 4.0).unwrap()]);
        let constraint = LinearConstraints::new(dmatrix![1.0], dvector![3.0]).unwrap();

        let result = grid_search(&parabola(), &spec, Some(&constraint)).unwrap();

        assert_eq!(result.x, dvector![3.0]);
        assert_eq!(result.fx, 1.0);
        assert_eq!(result.evaluations, 2);
    }

    #[test]
    fn general_constraint_function() {
        let spec = GridSpec::uniform(2, 5, -2.0, 2.0).unwrap();
        let f = Objective::new(
            2,
            |x: &DVector<f64>| x.norm_squared(),
            |x: &DVector<f64>| x * 2.0,
        );
        // Outside of the unit disk.
        let outside = |x: &DVector<f64>| dvector![x.norm_squared() - 1.0];

        let result = grid_search(&f, &spec, Some(&outside)).unwrap();

        assert_abs_diff_eq!(result.fx, 1.0);
        assert_eq!(result.x, dvector![0.0, -1.0]);
        assert_eq!(result.evaluations, 25 - 1);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn ties_keep_first_and_skip_non_finite() {
        let f = Objective::new(
            1,
            |x: &DVector<f64>| {
                if x[0] < 0.5 {
                    f64::NAN
                } else {
                    (x[0] - 2.0).abs().min(1.0)
                }
            },
            |x: &DVector<f64>| dvector![0.0 * x[0]],
        );
        let spec = GridSpec::new(vec![GridAxis::from_values(vec![0.0, 1.0, 3.0]).unwrap()]);

        let result = grid_search(&f, &spec, None).unwrap();

        assert_eq!(result.x, dvector![1.0]);
        assert_eq!(result.evaluations, 3);
    }

    #[test]
    fn errors() {
        let spec = GridSpec::uniform(2, 3, 0.0, 1.0).unwrap();
        assert!(matches!(
            grid_search(&parabola(), &spec, None),
            Err(GridError::DimensionMismatch)
        ));

        let spec = GridSpec::uniform(5, 100, 0.0, 1.0).unwrap();
        assert!(matches!(
            spec.size(),
            Err(GridError::TooLarge {
                size: Some(10_000_000_000)
            })
        ));

        let spec = GridSpec::uniform(20, 1000, 0.0, 1.0).unwrap();
        assert!(matches!(spec.size(), Err(GridError::TooLarge { size: None })));

        let spec = GridSpec::new(vec![GridAxis::new(5, 0.0, 4.0).unwrap()]);
        let constraint = LinearConstraints::new(dmatrix![1.0], dvector![10.0]).unwrap();
        assert!(matches!(
            grid_search(&parabola(), &spec, Some(&constraint)),
            Err(GridError::NoFeasiblePoint)
        ));

        let nan = Objective::new(
            1,
            |_: &DVector<f64>| f64::NAN,
            |x: &DVector<f64>| x.clone(),
        );
        assert!(matches!(
            grid_search(&nan, &spec, None),
            Err(GridError::NoFiniteValue)
        ));
    }

    #[test]
    fn constraint_dimension_checked_before_evaluation() {
        use std::cell::Cell;

        let evaluations = Cell::new(0);
        let f = Objective::new(
            1,
            |x: &DVector<f64>| {
                evaluations.set(evaluations.get() + 1);
                (x[0] - 2.0).powi(2)
            },
            |x: &DVector<f64>| dvector![2.0 * (x[0] - 2.0)],
        );
        let spec = GridSpec::new(vec![GridAxis::new(5, 0.0, 4.0).unwrap()]);
        let constraint = LinearConstraints::new(dmatrix![1.0, 0.0], dvector![3.0]).unwrap();

        assert!(matches!(
            grid_search(&f, &spec, Some(&constraint)),
            Err(GridError::DimensionMismatch)
        ));
        assert!(matches!(
            grid_search_points(&f, spec.points(), Some(&constraint)),
            Err(GridError::DimensionMismatch)
        ));
        assert!(matches!(
            grid_split(&spec, 2, Some(&constraint)),
            Err(GridError::DimensionMismatch)
        ));
        assert_eq!(evaluations.get(), 0);
    }

    #[test]
    fn closure_constraint_changing_length() {
        let spec = GridSpec::new(vec![GridAxis::new(5, 0.0, 4.0).unwrap()]);
        let ragged = |x: &DVector<f64>| {
            if x[0] < 1.5 {
                dvector![1.0]
            } else {
                dvector![1.0, 1.0]
            }
        };

        assert!(matches!(
            grid_search(&parabola(), &spec, Some(&ragged)),
            Err(GridError::DimensionMismatch)
        ));
        assert!(matches!(
            grid_split(&spec, 2, Some(&ragged)),
            Err(GridError::DimensionMismatch)
        ));
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn zero_parameters() {
        let f = Objective::new(0, |_: &DVector<f64>| 7.0, |x: &DVector<f64>| x.clone());
        let spec = GridSpec::new(Vec::new());

        let result = grid_search(&f, &spec, None).unwrap();

        assert_eq!(result.x.len(), 0);
        assert_eq!(result.fx, 7.0);
        assert_eq!(result.evaluations, 1);
    }

    #[test]
    fn split_covers_feasible_points() {
        let spec = GridSpec::new(vec![GridAxis::new(11, 0.0, 10.0).unwrap()]);
        let constraint = LinearConstraints::new(dmatrix![1.0], dvector![1.0]).unwrap();

        let blocks = grid_split(&spec, 3, Some(&constraint)).unwrap();
        let sizes: Vec<_> = blocks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 3, 3]);

        let best = blocks
            .into_iter()
            .map(|block| grid_search_points(&parabola(), block, None).unwrap())
            .min_by(|a, b| a.fx.partial_cmp(&b.fx).unwrap())
            .unwrap();

        assert_eq!(best.x, dvector![2.0]);
    }
}
