//! Modified Cholesky factorization of Gill, Murray and Wright.
//!
//! The algorithm computes the factorization
//!
//! ```text
//! P (H + E) P^T = L D L^T
//! ```
//!
//! where `P` is a permutation, `L` unit lower triangular, `D` diagonal with
//! entries at least `delta` and `E` a non-negative diagonal perturbation,
//! which is zero if `H` is sufficiently positive definite. At each step the
//! remaining row and column with the largest diagonal magnitude are pivoted
//! in. The entries of the factor are bounded by `beta`, computed from the
//! largest diagonal magnitude `gamma` and off-diagonal magnitude `xi`:
//!
//! ```text
//! delta = eps * max(gamma + xi, 1)
//! beta^2 = max(gamma, xi / sqrt(n^2 - 1), eps)
//! ```
//!
//! # References
//!
//! \[1\] [Practical
//! Optimization](https://epubs.siam.org/doi/book/10.1137/1.9781611975604),
//! Section 4.4.2.2
//!
//! \[2\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5),
//! Section 3.4

use log::debug;
use nalgebra::{convert, DMatrix, DVector, RealField};
use num_traits::Zero;

use super::{HessianModError, ModifiedNewton};

/// Pivoted `L D L^T` factorization of the modified matrix.
struct Factorization<T: RealField + Copy> {
    /// `perm[k]` is the original index placed at position `k`.
    perm: Vec<usize>,
    /// Unit lower triangular factor (the diagonal is not stored).
    l: DMatrix<T>,
    d: DVector<T>,
    /// Diagonal perturbation in the original ordering.
    e: DVector<T>,
}

impl<T: RealField + Copy> Factorization<T> {
    fn new(h: &DMatrix<T>, mach_acc: T) -> Self {
        let n = h.nrows();

        let gamma = h
            .diagonal()
            .iter()
            .fold(T::zero(), |acc, v| acc.max(v.abs()));
        let xi = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .fold(T::zero(), |acc, (i, j)| acc.max(h[(i, j)].abs()));

        let delta = mach_acc * (gamma + xi).max(T::one());
        let nu: T = if n > 1 {
            convert(((n * n - 1) as f64).sqrt())
        } else {
            T::one()
        };
        let beta2 = gamma.max(xi / nu).max(mach_acc);

        // Lower triangle of processed columns holds c_ij, the rest is the
        // (permuted) input with updated diagonal.
        let mut c = h.clone_owned();
        let mut perm: Vec<usize> = (0..n).collect();
        let mut d = DVector::zeros(n);
        let mut e_perm = DVector::zeros(n);
        let mut l_row = DVector::zeros(n);

        for j in 0..n {
            // Pivot the largest remaining diagonal. Ties go to the later
            // index.
            let mut q = j;
            for i in j..n {
                if c[(i, i)].abs() >= c[(q, q)].abs() {
                    q = i;
                }
            }

            if q != j {
                c.swap_rows(j, q);
                c.swap_columns(j, q);
                perm.swap(j, q);
            }

            for s in 0..j {
                l_row[s] = c[(j, s)] / d[s];
            }

            let mut theta = T::zero();
            for i in (j + 1)..n {
                let mut cij = c[(i, j)];
                for s in 0..j {
                    cij -= l_row[s] * c[(i, s)];
                }
                c[(i, j)] = cij;
                theta = theta.max(cij.abs());
            }

            let cjj = c[(j, j)];
            let dj = delta.max(cjj.abs()).max(theta * theta / beta2);
            d[j] = dj;
            e_perm[j] = dj - cjj;

            for i in (j + 1)..n {
                let cij = c[(i, j)];
                c[(i, i)] -= cij * cij / dj;
            }
        }

        let mut l = DMatrix::zeros(n, n);
        for j in 0..n {
            for i in (j + 1)..n {
                l[(i, j)] = c[(i, j)] / d[j];
            }
        }

        let mut e = DVector::zeros(n);
        for (k, &orig) in perm.iter().enumerate() {
            e[orig] = e_perm[k];
        }

        debug!(
            "gmw modification: delta = {}, beta^2 = {}, ||E|| = {}",
            delta,
            beta2,
            e.norm()
        );

        Self { perm, l, d, e }
    }

    /// Solves `(H + E) x = b`.
    fn solve(&self, b: &DVector<T>) -> DVector<T> {
        let n = self.d.len();

        // Forward substitution with the unit lower factor.
        let mut z = DVector::from_fn(n, |k, _| b[self.perm[k]]);
        for i in 0..n {
            for s in 0..i {
                let zs = z[s];
                z[i] -= self.l[(i, s)] * zs;
            }
        }

        for i in 0..n {
            z[i] /= self.d[i];
        }

        // Backward substitution with the transposed factor.
        for i in (0..n).rev() {
            for s in (i + 1)..n {
                let zs = z[s];
                z[i] -= self.l[(s, i)] * zs;
            }
        }

        let mut x = DVector::zeros(n);
        for (k, &orig) in self.perm.iter().enumerate() {
            x[orig] = z[k];
        }
        x
    }
}

/// Computes the Newton step from the GMW-modified Hessian.
pub fn newton_step<T: RealField + Copy>(
    h: &DMatrix<T>,
    g: &DVector<T>,
    mach_acc: T,
) -> Result<ModifiedNewton<T>, HessianModError> {
    let factorization = Factorization::new(h, mach_acc);
    let step = factorization.solve(&(-g));

    if step.iter().any(|v| !v.is_finite()) {
        return Err(HessianModError::NonFinite);
    }

    let mut matrix = h.clone();
    for i in 0..matrix.nrows() {
        matrix[(i, i)] += factorization.e[i];
    }

    Ok(ModifiedNewton { step, matrix })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hessian_mod::{tests::assert_descent, tests::random_symmetric, HessianMod};

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn descent_on_random_matrices() {
        assert_descent(HessianMod::Gmw, 3);
    }

    #[test]
    fn factors_reconstruct_modified_matrix() {
        let mut rng = StdRng::seed_from_u64(4);

        for n in 1..=5 {
            let h = random_symmetric(&mut rng, n);
            let fact = Factorization::new(&h, 1e-16);

            let mut unit_l = fact.l.clone();
            unit_l.fill_diagonal(1.0);
            let ldlt = &unit_l * DMatrix::from_diagonal(&fact.d) * unit_l.transpose();

            let mut expected = DMatrix::zeros(n, n);
            for i in 0..n {
                for j in 0..n {
                    expected[(i, j)] = h[(fact.perm[i], fact.perm[j])];
                }
                expected[(i, i)] += fact.e[fact.perm[i]];
            }

            assert_abs_diff_eq!(ldlt, expected, epsilon = 1e-9);
            assert!(fact.e.iter().all(|&e| e >= -1e-12));
        }
    }

    #[test]
    fn indefinite_diagonal() {
        let h = dmatrix![1.0, 0.0; 0.0, -2.0];
        let g = dvector![1.0, 1.0];

        let modified = newton_step(&h, &g, 1e-16).unwrap();

        // The negative pivot is replaced by its magnitude.
        assert_abs_diff_eq!(modified.matrix, dmatrix![1.0, 0.0; 0.0, 2.0], epsilon = 1e-12);
        assert_abs_diff_eq!(modified.step, dvector![-1.0, -0.5], epsilon = 1e-12);
    }
}
