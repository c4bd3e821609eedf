//! Hessian modifications for Newton-type directions.
//!
//! Far from a minimum, the Hessian matrix may be indefinite and the Newton
//! step `-H^-1 g` is then not guaranteed to be a descent direction. The
//! modifications in this module replace `H` by a symmetric positive definite
//! matrix `M` "close" to `H` and return the step `-M^-1 g` computed from a
//! factorization of `M`, never from an explicit inverse.
//!
//! * [Eigenvalue](eigenvalue) -- shifts the spectrum so that the smallest
//!   eigenvalue is safely positive.
//! * [Cholesky](cholesky) -- adds increasing multiples of the identity until
//!   the Cholesky factorization succeeds.
//! * [GMW](gmw) -- modified Cholesky factorization of Gill, Murray and
//!   Wright, which perturbs the diagonal during the factorization.
//! * Unmodified -- plain Newton step, without any descent guarantee.
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5),
//! Section 3.4
//!
//! \[2\] [Practical
//! Optimization](https://epubs.siam.org/doi/book/10.1137/1.9781611975604)

pub mod cholesky;
pub mod eigenvalue;
pub mod gmw;

use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, DVector, RealField};
use thiserror::Error;

use crate::driver::ConfigError;
use crate::line_search::normalize_name;

/// Error returned from a Hessian modification.
#[derive(Debug, Error)]
pub enum HessianModError {
    /// The Hessian or the gradient contains non-finite values.
    #[error("hessian or gradient is not finite")]
    NonFinite,
    /// The (unmodified) Hessian is singular.
    #[error("hessian is singular")]
    Singular,
    /// The modification did not succeed within its iteration budget.
    #[error("hessian modification did not converge")]
    NotConverged,
}

/// Newton step computed from the modified Hessian.
#[derive(Debug, Clone)]
pub struct ModifiedNewton<T: RealField + Copy> {
    /// The step `-M^-1 g`.
    pub step: DVector<T>,
    /// The modified matrix `M`.
    pub matrix: DMatrix<T>,
}

/// Hessian modification selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HessianMod {
    /// The Hessian is used as is.
    Unmodified,
    /// See [`eigenvalue`].
    Eigenvalue,
    /// See [`cholesky`].
    Cholesky,
    /// See [`gmw`].
    Gmw,
}

impl HessianMod {
    /// Computes the Newton step for Hessian `h` and gradient `g`. The machine
    /// accuracy `mach_acc` is used by the Cholesky and GMW modifications for
    /// their thresholds.
    pub fn newton_step<T: RealField + Copy>(
        &self,
        h: &DMatrix<T>,
        g: &DVector<T>,
        mach_acc: T,
    ) -> Result<ModifiedNewton<T>, HessianModError> {
        if h.iter().any(|v| !v.is_finite()) || g.iter().any(|v| !v.is_finite()) {
            return Err(HessianModError::NonFinite);
        }

        match self {
            HessianMod::Unmodified => unmodified(h, g),
            HessianMod::Eigenvalue => eigenvalue::newton_step(h, g),
            HessianMod::Cholesky => cholesky::newton_step(h, g, mach_acc),
            HessianMod::Gmw => gmw::newton_step(h, g, mach_acc),
        }
    }

    /// Canonical name of the modification.
    pub fn name(&self) -> &'static str {
        match self {
            HessianMod::Unmodified => "no hessian mod",
            HessianMod::Eigenvalue => "eigenvalue",
            HessianMod::Cholesky => "cholesky",
            HessianMod::Gmw => "gmw",
        }
    }
}

fn unmodified<T: RealField + Copy>(
    h: &DMatrix<T>,
    g: &DVector<T>,
) -> Result<ModifiedNewton<T>, HessianModError> {
    let step = h.clone().lu().solve(&(-g)).ok_or(HessianModError::Singular)?;

    if step.iter().any(|v| !v.is_finite()) {
        return Err(HessianModError::Singular);
    }

    Ok(ModifiedNewton {
        step,
        matrix: h.clone(),
    })
}

impl fmt::Display for HessianMod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HessianMod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_name(s).as_str() {
            "no hessian mod" | "none" | "unmodified" => Ok(HessianMod::Unmodified),
            "eigen" | "eigenvalue" => Ok(HessianMod::Eigenvalue),
            "chol" | "cholesky" => Ok(HessianMod::Cholesky),
            "gmw" | "gmw81" => Ok(HessianMod::Gmw),
            _ => Err(ConfigError::UnknownHessianMod(s.to_string())),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector, SymmetricEigen};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    /// Random symmetric matrix with entries in `[-10, 10]`, typically
    /// indefinite.
    pub(crate) fn random_symmetric(rng: &mut StdRng, n: usize) -> DMatrix<f64> {
        let a = DMatrix::from_fn(n, n, |_, _| rng.gen_range(-10.0..10.0));
        (&a + a.transpose()) * 0.5
    }

    /// Checks that the modified matrix is symmetric positive definite and the
    /// step is a descent direction.
    pub(crate) fn assert_descent(hm: HessianMod, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);

        for n in 1..=6 {
            for _ in 0..20 {
                let h = random_symmetric(&mut rng, n);
                let g = DVector::from_fn(n, |_, _| rng.gen_range(-1.0..1.0));

                let modified = hm.newton_step(&h, &g, 1e-16).unwrap();
                let m = &modified.matrix;

                assert_abs_diff_eq!(m.clone(), m.transpose(), epsilon = 1e-9);

                let eigen = SymmetricEigen::new(m.clone());
                assert!(eigen.eigenvalues.iter().all(|&l| l > 0.0), "{}", eigen.eigenvalues);

                assert!(g.dot(&modified.step) < 0.0);

                // The step solves M p = -g.
                assert_abs_diff_eq!(m * &modified.step, -&g, epsilon = 1e-6 * m.norm().max(1.0));
            }
        }
    }

    #[test]
    fn names() {
        assert_eq!("Eigen".parse::<HessianMod>().unwrap(), HessianMod::Eigenvalue);
        assert_eq!("chol".parse::<HessianMod>().unwrap(), HessianMod::Cholesky);
        assert_eq!("GMW".parse::<HessianMod>().unwrap(), HessianMod::Gmw);
        assert_eq!(
            "No Hessian Mod".parse::<HessianMod>().unwrap(),
            HessianMod::Unmodified
        );
        assert!(matches!(
            "se99".parse::<HessianMod>(),
            Err(ConfigError::UnknownHessianMod(_))
        ));

        for hm in [
            HessianMod::Unmodified,
            HessianMod::Eigenvalue,
            HessianMod::Cholesky,
            HessianMod::Gmw,
        ] {
            assert_eq!(hm.to_string().parse::<HessianMod>().unwrap(), hm);
        }
    }

    #[test]
    fn unmodified_newton_step() {
        let h = dmatrix![2.0, 0.0; 0.0, 4.0];
        let g = dvector![2.0, -4.0];

        let modified = HessianMod::Unmodified.newton_step(&h, &g, 1e-16).unwrap();
        assert_abs_diff_eq!(modified.step, dvector![-1.0, 1.0]);
    }

    #[test]
    fn unmodified_singular() {
        let h = dmatrix![1.0, 1.0; 1.0, 1.0];
        let g = dvector![1.0, 0.0];

        assert!(matches!(
            HessianMod::Unmodified.newton_step(&h, &g, 1e-16),
            Err(HessianModError::Singular)
        ));
    }

    #[test]
    fn non_finite_rejected() {
        let h = dmatrix![f64::NAN, 0.0; 0.0, 1.0];
        let g = dvector![1.0, 0.0];

        for hm in [HessianMod::Eigenvalue, HessianMod::Cholesky, HessianMod::Gmw] {
            assert!(matches!(
                hm.newton_step(&h, &g, 1e-16),
                Err(HessianModError::NonFinite)
            ));
        }
    }

    #[test]
    fn positive_definite_kept() {
        // A well-conditioned positive definite matrix needs no modification
        // and all methods give the exact Newton step.
        let h = dmatrix![4.0, 1.0; 1.0, 3.0];
        let g = dvector![1.0, 2.0];
        let exact = HessianMod::Unmodified.newton_step(&h, &g, 1e-16).unwrap().step;

        for hm in [HessianMod::Eigenvalue, HessianMod::Cholesky, HessianMod::Gmw] {
            let modified = hm.newton_step(&h, &g, 1e-16).unwrap();
            assert_abs_diff_eq!(modified.step, exact.clone(), epsilon = 1e-12);
            assert_abs_diff_eq!(modified.matrix, h.clone(), epsilon = 1e-12);
        }
    }
}
