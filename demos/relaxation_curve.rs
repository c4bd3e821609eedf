//! Fits the exponential decay `I(t) = I0 exp(-R t)` of a relaxation curve
//! to noisy synthetic data.
//!
//! The chi-squared is first scanned by a constrained grid search (`R >= 0`,
//! `I0 >= 0`) and the best grid point is refined by Newton method with GMW
//! Hessian modification.

use minfit::nalgebra::{dmatrix, dvector, DMatrix, DVector};
use minfit::{
    grid_search, minimise, Differentiable, Function, GridAxis, GridSpec, LinearConstraints,
    MinimiserOptions, Problem, ProblemError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

struct RelaxationCurve {
    times: Vec<f64>,
    intensities: Vec<f64>,
    errors: Vec<f64>,
}

impl RelaxationCurve {
    fn synthetic(r: f64, i0: f64, rng: &mut impl Rng) -> Self {
        let times: Vec<f64> = (0..12).map(|i| 0.05 * i as f64).collect();
        let errors = vec![0.02 * i0; times.len()];
        let intensities = times
            .iter()
            .zip(errors.iter())
            .map(|(t, e)| i0 * (-r * t).exp() + e * rng.gen_range(-1.0..1.0))
            .collect();

        Self {
            times,
            intensities,
            errors,
        }
    }

    // Scaled residual, model value and decay factor in every time point.
    fn points<'a>(
        &'a self,
        x: &'a DVector<f64>,
    ) -> impl Iterator<Item = (f64, f64, f64, f64, f64)> + 'a {
        let (r, i0) = (x[0], x[1]);

        self.times
            .iter()
            .zip(self.intensities.iter())
            .zip(self.errors.iter())
            .map(move |((&t, &intensity), &error)| {
                let decay = (-r * t).exp();
                let model = i0 * decay;
                ((intensity - model) / error, model, decay, t, error)
            })
    }
}

impl Problem for RelaxationCurve {
    type Field = f64;

    fn dim(&self) -> usize {
        2
    }
}

impl Function for RelaxationCurve {
    fn apply(&self, x: &DVector<f64>) -> Result<f64, ProblemError> {
        Ok(self.points(x).map(|(res, ..)| res * res).sum())
    }
}

impl Differentiable for RelaxationCurve {
    fn gradient(&self, x: &DVector<f64>, grad: &mut DVector<f64>) -> Result<(), ProblemError> {
        grad.fill(0.0);

        for (res, model, decay, t, error) in self.points(x) {
            grad[0] -= 2.0 * res / error * (-t * model);
            grad[1] -= 2.0 * res / error * decay;
        }

        Ok(())
    }

    fn hessian(&self, x: &DVector<f64>, hes: &mut DMatrix<f64>) -> Result<(), ProblemError> {
        hes.fill(0.0);

        for (res, model, decay, t, error) in self.points(x) {
            let dr = -t * model;
            let di = decay;
            let w = 1.0 / (error * error);

            hes[(0, 0)] += 2.0 * (w * dr * dr - res / error * t * t * model);
            hes[(0, 1)] += 2.0 * (w * dr * di + res / error * t * decay);
            hes[(1, 1)] += 2.0 * w * di * di;
        }

        hes[(1, 0)] = hes[(0, 1)];
        Ok(())
    }

    fn has_hessian(&self) -> bool {
        true
    }
}

fn main() -> Result<(), String> {
    let mut rng = StdRng::seed_from_u64(42);
    let f = RelaxationCurve::synthetic(2.5, 1000.0, &mut rng);

    // R >= 0 and I0 >= 0.
    let constraints = LinearConstraints::new(dmatrix![1.0, 0.0; 0.0, 1.0], dvector![0.0, 0.0])
        .map_err(|error| format!("{error}"))?;
    let spec = GridSpec::new(vec![
        GridAxis::new(25, -2.0, 10.0).map_err(|error| format!("{error}"))?,
        GridAxis::new(21, -500.0, 1500.0).map_err(|error| format!("{error}"))?,
    ]);

    let grid = grid_search(&f, &spec, Some(&constraints)).map_err(|error| format!("{error}"))?;
    println!(
        "grid search: x = {:?}\tchi2 = {}\tevaluations = {}",
        grid.x.as_slice(),
        grid.fx,
        grid.evaluations
    );

    let mut options = MinimiserOptions::from_names("newton", &["gmw", "more thuente"])
        .map_err(|error| format!("{error}"))?;
    options.set_grad_tol(Some(1e-8));

    let result = minimise(&f, grid.x.iter().copied().collect(), &options)
        .map_err(|error| format!("{error}"))?;

    println!(
        "newton: R = {}\tI0 = {}\tchi2 = {}\titerations = {}\t{}",
        result.x[0], result.x[1], result.fx, result.iterations, result.termination
    );

    if result.termination.is_converged() {
        Ok(())
    } else {
        Err(format!("{}", result.termination))
    }
}
