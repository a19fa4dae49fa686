//! Normalized associated Legendre functions.
//!
//! All normalized values carry the Condon–Shortley phase and the
//! spherical-harmonic normalization `sqrt((2n+1)(n-m)!/(4π(n+m)!))`, so that
//! `Y_n^m(θ, φ) = P̄_n^m(cos θ) e^{imφ}` is orthonormal on the sphere.

use super::convert;
use super::error::{Error, Result};
use std::f64::consts::PI;

fn check_domain(n: usize, m: usize, x: f64) -> Result<()> {
    if m > n || !(-1.0..=1.0).contains(&x) {
        return Err(Error::Domain(format!(
            "associated Legendre arguments n = {n}, m = {m}, x = {x}"
        )));
    }
    Ok(())
}

/// Seed value `P̄_m^m(x)` of the forward recursion at fixed order.
pub(crate) fn seed_mm(m: usize, x: f64) -> f64 {
    let mut pmm = 1.0;
    if m > 0 {
        let omx2 = (1.0 - x) * (1.0 + x);
        let mut fact = 1.0;
        for _ in 0..m {
            pmm *= omx2 * fact / (fact + 1.0);
            fact += 2.0;
        }
    }
    let norm = (convert::f64_from_usize(2 * m + 1) * pmm / (4.0 * PI)).sqrt();
    if m % 2 == 0 { norm } else { -norm }
}

/// One step of the degree recurrence, `P̄_n^m` from the two previous degrees.
/// The `P̄_{n-2}^m` coefficient vanishes for `n = m + 1`, so the same step
/// also advances the seed row.
pub(crate) fn recycle_step(n: usize, m: usize, x: f64, pnm1: f64, pnm2: f64) -> f64 {
    let nf = convert::f64_from_usize(n);
    let mf = convert::f64_from_usize(m);
    let n2 = nf * nf;
    let m2 = mf * mf;
    let c1 = ((4.0 * n2 - 1.0) / (n2 - m2)).sqrt();
    let nm1 = nf - 1.0;
    let c2 = (((2.0 * nf + 1.0) * nm1.mul_add(nm1, -m2)) / ((2.0 * nf - 3.0) * (n2 - m2)))
        .abs()
        .sqrt();
    c1 * x * pnm1 - c2 * pnm2
}

/// Sectoral step `P̄_n^n` from `P̄_{n-1}^{n-1}`.
pub(crate) fn nn_step(n: usize, x: f64, prev: f64) -> f64 {
    let nf = convert::f64_from_usize(n);
    -((2.0 * nf + 1.0) / (2.0 * nf)).sqrt() * ((1.0 - x) * (1.0 + x)).sqrt() * prev
}

/// Unnormalized `P_n^m(x)` with the Condon–Shortley phase, by the forward
/// recursion in degree at fixed order.
pub(crate) fn plgndr_raw(n: usize, m: usize, x: f64) -> f64 {
    let mf = convert::f64_from_usize(m);
    let mut pmm = 1.0;
    if m > 0 {
        let somx2 = ((1.0 - x) * (1.0 + x)).sqrt();
        let mut fact = 1.0;
        for _ in 0..m {
            pmm *= -fact * somx2;
            fact += 2.0;
        }
    }
    if n == m {
        return pmm;
    }
    let mut pmmp1 = x * 2.0f64.mul_add(mf, 1.0) * pmm;
    if n == m + 1 {
        return pmmp1;
    }
    let mut pnm = 0.0;
    for nn in (m + 2)..=n {
        let nnf = convert::f64_from_usize(nn);
        pnm = (x * 2.0f64.mul_add(nnf, -1.0)).mul_add(pmmp1, -((nnf + mf - 1.0) * pmm)) / (nnf - mf);
        pmm = pmmp1;
        pmmp1 = pnm;
    }
    pnm
}

/// Normalization factor `sqrt((2n+1)(n-m)!/(4π(n+m)!))` relating the
/// unnormalized [`plgndr`] values to the normalized ones.
pub(crate) fn norm_factor(n: usize, m: usize) -> f64 {
    let mut ratio = 1.0;
    for i in (n - m + 1)..=(n + m) {
        ratio /= convert::f64_from_usize(i);
    }
    (convert::f64_from_usize(2 * n + 1) * ratio / (4.0 * PI)).sqrt()
}

/// Normalized associated Legendre function `P̄_n^m(x)`.
///
/// # Errors
///
/// Returns [`Error::Domain`] unless `0 <= m <= n` and `|x| <= 1`.
pub fn plegendre(n: usize, m: usize, x: f64) -> Result<f64> {
    check_domain(n, m, x)?;
    let mut p = seed_mm(m, x);
    if n == m {
        return Ok(p);
    }
    let mut p_prev = 0.0;
    for nn in (m + 1)..=n {
        let next = recycle_step(nn, m, x, p, p_prev);
        p_prev = p;
        p = next;
    }
    Ok(p)
}

/// Sectoral value `P̄_n^n(x)` computed from `P̄_{n-1}^{n-1}(x)`.
///
/// # Errors
///
/// Returns [`Error::Domain`] unless `n >= 1` and `|x| <= 1`.
pub fn plegendre_nn(n: usize, x: f64, pn1n1: f64) -> Result<f64> {
    if n == 0 {
        return Err(Error::Domain(format!("sectoral recursion needs n >= 1, n = {n}")));
    }
    check_domain(n, n, x)?;
    Ok(nn_step(n, x, pn1n1))
}

/// Recurrence step `P̄_n^m(x)` from the two previous degrees `P̄_{n-1}^m` and
/// `P̄_{n-2}^m`.
///
/// # Errors
///
/// Returns [`Error::Domain`] unless `0 <= m < n` and `|x| <= 1`.
pub fn plegendre_recycle(n: usize, m: usize, x: f64, pnm1: f64, pnm2: f64) -> Result<f64> {
    if m >= n {
        return Err(Error::Domain(format!(
            "degree recurrence needs m < n, n = {n}, m = {m}"
        )));
    }
    check_domain(n, m, x)?;
    Ok(recycle_step(n, m, x, pnm1, pnm2))
}

/// Unnormalized associated Legendre function `P_n^m(x)` with the
/// Condon–Shortley phase.
///
/// # Errors
///
/// Returns [`Error::Domain`] unless `0 <= m <= n` and `|x| <= 1`.
pub fn plgndr(n: usize, m: usize, x: f64) -> Result<f64> {
    check_domain(n, m, x)?;
    Ok(plgndr_raw(n, m, x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quadrature;
    use float_cmp::assert_approx_eq;

    #[test]
    fn low_degree_closed_forms() {
        let x = 0.3_f64;
        let s = (1.0 - x * x).sqrt();
        assert_approx_eq!(f64, plegendre(0, 0, x).unwrap(), (0.25 / PI).sqrt(), ulps = 2);
        assert_approx_eq!(f64, plegendre(1, 0, x).unwrap(), (0.75 / PI).sqrt() * x, ulps = 2);
        assert_approx_eq!(
            f64,
            plegendre(1, 1, x).unwrap(),
            -(3.0 / (8.0 * PI)).sqrt() * s,
            ulps = 2
        );
        assert_approx_eq!(
            f64,
            plegendre(2, 0, x).unwrap(),
            (5.0 / (16.0 * PI)).sqrt() * (3.0 * x * x - 1.0),
            epsilon = 1e-14
        );
        assert_approx_eq!(
            f64,
            plegendre(2, 1, x).unwrap(),
            -(15.0 / (8.0 * PI)).sqrt() * x * s,
            epsilon = 1e-14
        );
    }

    #[test]
    fn recursions_match_direct_evaluation() {
        let x = -0.62_f64;
        for m in 0..6 {
            let mut pnm1 = plegendre(m + 1, m, x).unwrap();
            let mut pnm2 = plegendre(m, m, x).unwrap();
            for n in (m + 2)..12 {
                let recycled = plegendre_recycle(n, m, x, pnm1, pnm2).unwrap();
                assert_approx_eq!(f64, recycled, plegendre(n, m, x).unwrap(), epsilon = 1e-12);
                pnm2 = pnm1;
                pnm1 = recycled;
            }
        }
        let mut diag = plegendre(0, 0, x).unwrap();
        for n in 1..12 {
            diag = plegendre_nn(n, x, diag).unwrap();
            assert_approx_eq!(f64, diag, plegendre(n, n, x).unwrap(), epsilon = 1e-12);
        }
    }

    #[test]
    fn normalization_relates_both_kernels() {
        let x = 0.47_f64;
        for n in 0..10 {
            for m in 0..=n {
                assert_approx_eq!(
                    f64,
                    plegendre(n, m, x).unwrap(),
                    norm_factor(n, m) * plgndr(n, m, x).unwrap(),
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    fn orthonormality_on_gauss_grid() {
        let nodes = quadrature::gl_nodes(64).unwrap();
        for m in [0_usize, 1, 3] {
            for n in m..(m + 4) {
                for np in m..(m + 4) {
                    let mut acc = 0.0;
                    for &(x, w) in &nodes {
                        acc += w * plegendre(n, m, x).unwrap() * plegendre(np, m, x).unwrap();
                    }
                    let expected = if n == np { 0.5 / PI } else { 0.0 };
                    assert_approx_eq!(f64, acc, expected, epsilon = 1e-13);
                }
            }
        }
    }

    #[test]
    fn rejects_out_of_domain_arguments() {
        assert!(plegendre(2, 3, 0.5).is_err());
        assert!(plegendre(4, 1, 1.5).is_err());
        assert!(plegendre(4, 1, f64::NAN).is_err());
        assert!(plegendre_nn(0, 0.5, 1.0).is_err());
        assert!(plegendre_recycle(3, 3, 0.5, 1.0, 1.0).is_err());
        assert!(plgndr(1, 2, 0.0).is_err());
    }
}
