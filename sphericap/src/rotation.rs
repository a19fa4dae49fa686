//! Rotation of spherical-harmonic coefficient vectors.
//!
//! A rotation by ZYZ Euler angles `(α, β, γ)` acts on the coefficients as
//! `a'(n, m) = Σ_m' e^{im'α} d^n_{m'm}(β) e^{imγ} a(n, m')`, where the real
//! Wigner-d matrices are built once per β by a three-term recursion in the
//! degree and reused for every coefficient.

use super::error::{Error, Result};
use super::shape::{self, Shape, loc};
use ndarray::Array3;
use num_complex::Complex64;
use std::f64::consts::PI;

const BETA_NUDGE: f64 = 1e-10;

fn sqrt_binomial(n: i32, k: i32) -> f64 {
    let mut binom = 1.0;
    for i in 1..=k {
        binom *= f64::from(n - k + i) / f64::from(i);
    }
    binom.sqrt()
}

/// Wigner-d matrices `d^n_{m'm}(β)` for every degree up to `n_max`, stored
/// as one dense table indexed by `[n, m' + n_max, m + n_max]`.
pub(crate) struct WignerTable {
    n_max: usize,
    d: Array3<f64>,
}

impl WignerTable {
    pub(crate) fn new(n_max: usize, beta: f64) -> Self {
        let span = 2 * n_max + 1;
        let mut table = Self {
            n_max,
            d: Array3::zeros((n_max + 1, span, span)),
        };
        let (sin_half, cos_half) = (0.5 * beta).sin_cos();
        let cos_beta = beta.cos();
        table.set(0, 0, 0, 1.0);
        for n in 1..=n_max {
            table.fill_degree(n, cos_beta, cos_half, sin_half);
        }
        table
    }

    pub(crate) fn at(&self, n: usize, mp: i32, m: i32) -> f64 {
        let offset = i32::try_from(self.n_max).unwrap_or_default();
        self.d[[
            n,
            usize::try_from(mp + offset).unwrap_or_default(),
            usize::try_from(m + offset).unwrap_or_default(),
        ]]
    }

    fn set(&mut self, n: usize, mp: i32, m: i32, value: f64) {
        let offset = i32::try_from(self.n_max).unwrap_or_default();
        self.d[[
            n,
            usize::try_from(mp + offset).unwrap_or_default(),
            usize::try_from(m + offset).unwrap_or_default(),
        ]] = value;
    }

    // d^n_{n,m}, the closed-form top row
    fn top_row(n: i32, m: i32, cos_half: f64, sin_half: f64) -> f64 {
        sqrt_binomial(2 * n, n - m) * cos_half.powi(n + m) * (-sin_half).powi(n - m)
    }

    // d^n_{-n,m}, the closed-form bottom row
    fn bottom_row(n: i32, m: i32, cos_half: f64, sin_half: f64) -> f64 {
        sqrt_binomial(2 * n, n - m) * sin_half.powi(n + m) * cos_half.powi(n - m)
    }

    fn fill_degree(&mut self, n: usize, cos_beta: f64, cos_half: f64, sin_half: f64) {
        let ni = i32::try_from(n).unwrap_or_default();
        for m in -ni..=ni {
            self.set(n, ni, m, Self::top_row(ni, m, cos_half, sin_half));
            self.set(n, -ni, m, Self::bottom_row(ni, m, cos_half, sin_half));
        }
        for mp in (1 - ni)..ni {
            // edge columns from the symmetries d_{m'm} = (-1)^{m'-m} d_{mm'}
            // and d_{m'm} = d_{-m,-m'}
            let sign = if (mp - ni) % 2 == 0 { 1.0 } else { -1.0 };
            self.set(n, mp, ni, sign * Self::top_row(ni, mp, cos_half, sin_half));
            self.set(n, mp, -ni, Self::top_row(ni, -mp, cos_half, sin_half));
        }
        if n == 1 {
            self.set(1, 0, 0, cos_beta);
            return;
        }
        let nf = f64::from(ni);
        for mp in (1 - ni)..ni {
            let a = f64::from(mp);
            for m in (1 - ni)..ni {
                let b = f64::from(m);
                let pref = nf * (2.0 * nf - 1.0)
                    / ((nf * nf - a * a) * (nf * nf - b * b)).sqrt();
                let tail = ((nf - 1.0) * (nf - 1.0) - a * a)
                    * ((nf - 1.0) * (nf - 1.0) - b * b);
                let c2 = tail.sqrt() / ((nf - 1.0) * (2.0 * nf - 1.0));
                let value = pref
                    * ((cos_beta - a * b / (nf * (nf - 1.0))) * self.at(n - 1, mp, m)
                        - c2 * self.at(n - 2, mp, m));
                self.set(n, mp, m, value);
            }
        }
    }
}

fn conjugate_order(coeffs: &[f64], n: usize, mp: i32) -> Complex64 {
    if mp >= 0 {
        shape::coeff_at(coeffs, n, usize::try_from(mp).unwrap_or_default())
    } else {
        let a = shape::coeff_at(coeffs, n, usize::try_from(-mp).unwrap_or_default());
        let sign = if mp % 2 == 0 { 1.0 } else { -1.0 };
        sign * a.conj()
    }
}

/// Rotates an interleaved coefficient vector by ZYZ Euler angles.
///
/// # Errors
///
/// Returns [`Error::RotationDegenerate`] if `beta` lies outside `[0, π]`
/// and [`Error::Domain`] if the vector length does not match `n_max`.
pub fn rotate_coefficient_slice(
    coeffs: &[f64],
    n_max: usize,
    alpha: f64,
    beta: f64,
    gamma: f64,
) -> Result<Vec<f64>> {
    if !(0.0..=PI).contains(&beta) {
        return Err(Error::RotationDegenerate(beta));
    }
    if coeffs.len() != shape::coeff_len(n_max) {
        return Err(Error::Domain(format!(
            "coefficient vector of length {} does not fit degree {n_max}",
            coeffs.len()
        )));
    }
    let mut beta = beta;
    if beta == 0.0 {
        beta += BETA_NUDGE;
    } else if beta == PI {
        beta -= BETA_NUDGE;
    }
    let table = WignerTable::new(n_max, beta);
    let mut out = vec![0.0; coeffs.len()];
    for n in 0..=n_max {
        let ni = i32::try_from(n).unwrap_or_default();
        for m in 0..=n {
            let mi = i32::try_from(m).unwrap_or_default();
            let mut acc = Complex64::new(0.0, 0.0);
            for mp in -ni..=ni {
                let phase = Complex64::from_polar(1.0, f64::from(mp) * alpha);
                acc += phase * table.at(n, mp, mi) * conjugate_order(coeffs, n, mp);
            }
            acc *= Complex64::from_polar(1.0, f64::from(mi) * gamma);
            out[loc(n, m)] = acc.re;
            out[loc(n, m) + 1] = acc.im;
        }
    }
    Ok(out)
}

/// Rotates a shape's coefficients by ZYZ Euler angles, returning the new
/// interleaved vector. Rebuilding a [`Shape`] from it is the caller's
/// choice; the tables of the input shape are unaffected.
///
/// # Errors
///
/// Propagates the [`rotate_coefficient_slice`] failure modes.
pub fn rotate_coefficients(shape: &Shape, alpha: f64, beta: f64, gamma: f64) -> Result<Vec<f64>> {
    rotate_coefficient_slice(shape.coeffs(), shape.n_max(), alpha, beta, gamma)
}
