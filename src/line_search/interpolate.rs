//! Quadratic and cubic interpolation of the line function.
//!
//! All helpers return `None` when the interpolant has no minimiser or the
//! computation is not finite.

use nalgebra::{convert, RealField};
use num_traits::Zero;

fn finite<T: RealField + Copy>(value: T) -> Option<T> {
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Minimiser of the cubic interpolating `fa`, `fb`, `ga` and `gb` at points
/// `a` and `b`.
pub fn cubic_int<T: RealField + Copy>(a: T, b: T, fa: T, fb: T, ga: T, gb: T) -> Option<T> {
    let three: T = convert(3.0);
    let two: T = convert(2.0);

    let beta1 = ga + gb - three * (fa - fb) / (a - b);
    let disc = beta1 * beta1 - ga * gb;
    if disc < T::zero() {
        return None;
    }

    let beta2 = if b < a { -disc.sqrt() } else { disc.sqrt() };
    let denom = gb - ga + two * beta2;
    if denom == T::zero() {
        return None;
    }

    finite(b - (b - a) * (gb + beta2 - beta1) / denom)
}

/// Minimiser of the cubic interpolating `fa`, `fb`, `ga` and `gb` for the
/// extrapolation case, where the discriminant is clipped to zero. The second
/// returned value is `beta2`, which is zero when the cubic does not tend to
/// infinity in the direction of the step.
pub fn cubic_ext<T: RealField + Copy>(
    a: T,
    b: T,
    fa: T,
    fb: T,
    ga: T,
    gb: T,
) -> Option<(T, T)> {
    let three: T = convert(3.0);
    let two: T = convert(2.0);

    let beta1 = ga + gb - three * (fa - fb) / (a - b);
    let disc = (beta1 * beta1 - ga * gb).max(T::zero());

    let beta2 = if b < a { -disc.sqrt() } else { disc.sqrt() };
    let denom = gb - ga + two * beta2;
    if denom == T::zero() {
        return None;
    }

    let ac = finite(b - (b - a) * (gb + beta2 - beta1) / denom)?;
    Some((ac, beta2))
}

/// Minimiser of the quadratic interpolating `fa`, `fb` and `ga`.
pub fn quadratic_fafbga<T: RealField + Copy>(a: T, b: T, fa: T, fb: T, ga: T) -> Option<T> {
    let two: T = convert(2.0);
    let ab = b - a;
    let denom = two * (fb - fa - ga * ab);
    if denom == T::zero() {
        return None;
    }

    finite(a - ga * ab * ab / denom)
}

/// Minimiser of the quadratic interpolating `ga` and `gb` (the secant step).
pub fn quadratic_gagb<T: RealField + Copy>(a: T, b: T, ga: T, gb: T) -> Option<T> {
    let denom = ga - gb;
    if denom == T::zero() {
        return None;
    }

    finite(a + ga * (b - a) / denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;

    // q(t) = (t - 1.5)^2, q'(t) = 2 (t - 1.5).
    fn q(t: f64) -> (f64, f64) {
        ((t - 1.5).powi(2), 2.0 * (t - 1.5))
    }

    // c(t) = t^3 - 3 t, local minimum at t = 1.
    fn c(t: f64) -> (f64, f64) {
        (t.powi(3) - 3.0 * t, 3.0 * t.powi(2) - 3.0)
    }

    #[test]
    fn quadratic_exact() {
        let (fa, ga) = q(0.0);
        let (fb, gb) = q(4.0);

        assert_abs_diff_eq!(quadratic_fafbga(0.0, 4.0, fa, fb, ga).unwrap(), 1.5);
        assert_abs_diff_eq!(quadratic_gagb(0.0, 4.0, ga, gb).unwrap(), 1.5);
    }

    #[test]
    fn cubic_exact() {
        let (fa, ga) = c(0.0);
        let (fb, gb) = c(2.0);

        assert_abs_diff_eq!(cubic_int(0.0, 2.0, fa, fb, ga, gb).unwrap(), 1.0, epsilon = 1e-12);
        // Order of the points does not matter.
        assert_abs_diff_eq!(cubic_int(2.0, 0.0, fb, fa, gb, ga).unwrap(), 1.0, epsilon = 1e-12);

        let (ac, beta2) = cubic_ext(0.0, 2.0, fa, fb, ga, gb).unwrap();
        assert_abs_diff_eq!(ac, 1.0, epsilon = 1e-12);
        assert!(beta2 != 0.0);
    }

    #[test]
    fn degenerate() {
        // Linear function has no minimiser.
        assert!(quadratic_fafbga(0.0, 1.0, 0.0, -1.0, -1.0).is_none());
        assert!(quadratic_gagb(0.0, 1.0, -1.0, -1.0).is_none());
    }
}
