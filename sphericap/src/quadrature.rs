//! Gauss–Legendre quadrature nodes and weights.
//!
//! Nodes are computed on demand by Newton iteration on the Legendre
//! three-term recurrence. For rules up to [`INTERIOR_GUESS_LIMIT`] points the
//! iteration starts from the interior cosine estimate; larger rules start
//! from the McMahon asymptotic for the zeros of the Bessel function `J₀`,
//! which stays accurate uniformly in the rule size. The upper half of every
//! rule is obtained from the lower half by symmetry.

use super::convert;
use super::error::{Error, Result};
use anyhow::anyhow;
use std::f64::consts::PI;

/// Largest rule for which the interior cosine initial guess is used.
pub const INTERIOR_GUESS_LIMIT: usize = 100;

const NEWTON_EPS: f64 = 1e-15;
const MAX_NEWTON_ITER: usize = 100;

/// Value and derivative of the Legendre polynomial `P_n` at `x`.
fn legendre_value_deriv(n: usize, x: f64) -> (f64, f64) {
    if n == 0 {
        return (1.0, 0.0);
    }
    let mut p0 = 1.0;
    let mut p1 = x;
    for j in 2..=n {
        let jf = convert::f64_from_usize(j);
        let p2 = (x * 2.0f64.mul_add(jf, -1.0)).mul_add(p1, -((jf - 1.0) * p0)) / jf;
        p0 = p1;
        p1 = p2;
    }
    let nf = convert::f64_from_usize(n);
    let dp = nf * x.mul_add(p1, -p0) / x.mul_add(x, -1.0);
    (p1, dp)
}

/// Initial estimate of the `j`-th root counted from the positive end.
fn initial_guess(n: usize, j: usize) -> f64 {
    let nf = convert::f64_from_usize(n);
    let i = convert::f64_from_usize(j + 1);
    if n <= INTERIOR_GUESS_LIMIT {
        (PI * (i - 0.25) / (nf + 0.5)).cos()
    } else {
        // McMahon expansion of the i-th zero of J0, mapped through the
        // large-n relation theta = j_{0,i} / (n + 1/2)
        let beta = (i - 0.25) * PI;
        let b8 = 8.0 * beta;
        let j0 = beta + 1.0 / b8 - 124.0 / (3.0 * b8.powi(3)) + 120_928.0 / (15.0 * b8.powi(5));
        (j0 / (nf + 0.5)).cos()
    }
}

/// The `j`-th abscissa from the positive end of the `n`-point rule and its
/// weight, refined to machine accuracy.
fn newton_node(n: usize, j: usize) -> Result<(f64, f64)> {
    let mut z = initial_guess(n, j);
    for _ in 0..MAX_NEWTON_ITER {
        let (p, dp) = legendre_value_deriv(n, z);
        let delta = p / dp;
        z -= delta;
        if delta.abs() <= NEWTON_EPS {
            let (_, dp) = legendre_value_deriv(n, z);
            let w = 2.0 / ((1.0 - z * z) * dp * dp);
            return Ok((z, w));
        }
    }
    Err(Error::Other(anyhow!(
        "Newton iteration for node {j} of the {n}-point Gauss-Legendre rule stalled"
    )))
}

/// Polar angle `arccos(x_k)` and weight of the `k`-th node of the `n`-point
/// Gauss–Legendre rule on `[-1, 1]`, abscissae ascending in `k`.
///
/// # Errors
///
/// Returns [`Error::Domain`] for `k >= n` and a refinement error if the
/// Newton iteration stalls, which does not happen for finite rules.
pub fn gl_pair(n: usize, k: usize) -> Result<(f64, f64)> {
    if k >= n {
        return Err(Error::Domain(format!(
            "node index {k} outside the {n}-point Gauss-Legendre rule"
        )));
    }
    let half = n.div_ceil(2);
    let (j, sign) = if n - 1 - k < half {
        (n - 1 - k, 1.0)
    } else {
        (k, -1.0)
    };
    let (x, w) = newton_node(n, j)?;
    Ok(((sign * x).acos(), w))
}

/// Abscissa/weight pairs of the `n`-point rule, abscissae ascending.
///
/// # Errors
///
/// Propagates the [`gl_pair`] failure modes.
pub fn gl_nodes(n: usize) -> Result<Vec<(f64, f64)>> {
    (0..n)
        .map(|k| gl_pair(n, k).map(|(theta, w)| (theta.cos(), w)))
        .collect()
}
