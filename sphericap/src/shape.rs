//! The [`Shape`] data model and its surface oracle.
//!
//! A shape stores the truncated spherical-harmonic expansion of a
//! star-shaped particle surface together with the tables the contact and
//! overlap routines need: quadrature radii, the bounding radius, the
//! per-degree expansion factors and the principal inertia frame. Shapes are
//! immutable once built by [`crate::catalog::ShapeParams`].

use super::convert;
use super::legendre;
use arrayvec::ArrayVec;
use nalgebra::{UnitQuaternion, Vector3};
use ndarray::{Array2, ArrayView2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Hard cap on the truncation degree plus one; the rolling recursion buffers
/// are stack-allocated at this size.
pub const MAX_DEGREE_PLUS_ONE: usize = 64;

/// Nudge applied to θ or φ when a trigonometric singularity is hit exactly.
pub(crate) const POLE_NUDGE: f64 = 1e-5;

pub(crate) type DegreeBuf = ArrayVec<f64, MAX_DEGREE_PLUS_ONE>;

/// Index of the real part of `a(n, m)` in the interleaved coefficient
/// vector; the imaginary part follows at the next slot.
#[must_use]
pub const fn loc(n: usize, m: usize) -> usize {
    n * (n + 1) + 2 * (n - m)
}

/// Length of the interleaved coefficient vector for a truncation degree.
#[must_use]
pub const fn coeff_len(n_max: usize) -> usize {
    (n_max + 1) * (n_max + 2)
}

pub(crate) fn coeff_at(coeffs: &[f64], n: usize, m: usize) -> Complex64 {
    let k = loc(n, m);
    Complex64::new(coeffs[k], coeffs[k + 1])
}

/// Row of normalized Legendre values `P̄_n^m` for `m = 0..=n`, built from the
/// two previous degree rows. The `m = n - 1` tip uses the closed form, the
/// `m = n` tip the sectoral step.
pub(crate) fn next_row(n: usize, x: f64, prev: &DegreeBuf, prev2: &DegreeBuf) -> DegreeBuf {
    let mut row = DegreeBuf::new();
    for m in 0..n - 1 {
        row.push(legendre::recycle_step(n, m, x, prev[m], prev2[m]));
    }
    let tip = prev[n - 1];
    row.push(x * convert::f64_from_usize(2 * n + 1).sqrt() * tip);
    row.push(legendre::nn_step(n, x, tip));
    row
}

/// Contribution of degree `n` to the radius sum at azimuth `phi`.
pub(crate) fn degree_term(coeffs: &[f64], n: usize, row: &DegreeBuf, phi: f64) -> f64 {
    let mut term = coeff_at(coeffs, n, 0).re * row[0];
    for m in 1..=n {
        let a = coeff_at(coeffs, n, m);
        let (sin_m, cos_m) = (convert::f64_from_usize(m) * phi).sin_cos();
        term += 2.0 * a.re.mul_add(cos_m, -(a.im * sin_m)) * row[m];
    }
    term
}

/// Cumulative partial radius sums `r_0, r_1, ..., r_n_max` at one direction.
pub(crate) fn degree_sums_of(coeffs: &[f64], n_max: usize, theta: f64, phi: f64) -> DegreeBuf {
    let x = theta.cos();
    let mut sums = DegreeBuf::new();
    let mut prev2 = DegreeBuf::new();
    let mut prev = DegreeBuf::new();
    prev.push(legendre::seed_mm(0, x));
    let mut r = coeff_at(coeffs, 0, 0).re * prev[0];
    sums.push(r);
    for n in 1..=n_max {
        let row = next_row(n, x, &prev, &prev2);
        r += degree_term(coeffs, n, &row, phi);
        sums.push(r);
        prev2 = std::mem::replace(&mut prev, row);
    }
    sums
}

fn nudged(mut theta: f64, mut phi: f64) -> (f64, f64) {
    if theta.sin() == 0.0 {
        theta += POLE_NUDGE;
    }
    if phi.sin() == 0.0 {
        phi += POLE_NUDGE;
    }
    (theta, phi)
}

/// An immutable spherical-harmonic particle shape.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Shape {
    n_max: usize,
    coeffs: Vec<f64>,
    n_quad: usize,
    angles: Array2<f64>,
    weights: Vec<f64>,
    quad_rads: Vec<f64>,
    max_rad: f64,
    expfacts: Vec<f64>,
    volume: f64,
    principal_inertia: [f64; 3],
    quat_init: UnitQuaternion<f64>,
}

impl Shape {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        n_max: usize,
        coeffs: Vec<f64>,
        n_quad: usize,
        angles: Array2<f64>,
        weights: Vec<f64>,
        quad_rads: Vec<f64>,
        max_rad: f64,
        expfacts: Vec<f64>,
        volume: f64,
        principal_inertia: [f64; 3],
        quat_init: UnitQuaternion<f64>,
    ) -> Self {
        debug_assert_eq!(coeffs.len(), coeff_len(n_max));
        debug_assert_eq!(expfacts.len(), n_max + 1);
        Self {
            n_max,
            coeffs,
            n_quad,
            angles,
            weights,
            quad_rads,
            max_rad,
            expfacts,
            volume,
            principal_inertia,
            quat_init,
        }
    }

    /// Truncation degree of the expansion.
    #[must_use]
    pub const fn n_max(&self) -> usize {
        self.n_max
    }

    /// Interleaved `(re, im)` coefficient storage, indexed by [`loc`].
    #[must_use]
    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    /// Complex coefficient `a(n, m)` for `0 <= m <= n <= n_max`; negative
    /// orders follow from `a(n, -m) = (-1)^m conj(a(n, m))` and are not
    /// stored.
    ///
    /// # Panics
    ///
    /// Panics if `m > n` or `n > n_max`.
    #[must_use]
    pub fn a(&self, n: usize, m: usize) -> Complex64 {
        assert!(
            m <= n && n <= self.n_max,
            "coefficient index (n, m) = ({n}, {m}) is out of range for degree {}",
            self.n_max
        );
        coeff_at(&self.coeffs, n, m)
    }

    /// Order of the surface quadrature grid along each angle.
    #[must_use]
    pub const fn n_quad(&self) -> usize {
        self.n_quad
    }

    /// `(θ, φ)` pairs of the surface quadrature grid, one column per point.
    #[must_use]
    pub fn angles(&self) -> ArrayView2<'_, f64> {
        self.angles.view()
    }

    /// Gauss–Legendre weights shared by both grid directions.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Surface radii tabulated on the quadrature grid.
    #[must_use]
    pub fn quad_rads(&self) -> &[f64] {
        &self.quad_rads
    }

    /// Bounding-sphere radius, scaled by the safety factor.
    #[must_use]
    pub const fn max_rad(&self) -> f64 {
        self.max_rad
    }

    /// Per-degree expansion factors; `expfacts()[n] * r_n` bounds the full
    /// radius from above, and the last entry is exactly one.
    #[must_use]
    pub fn expfacts(&self) -> &[f64] {
        &self.expfacts
    }

    /// Particle volume from the surface quadrature.
    #[must_use]
    pub const fn volume(&self) -> f64 {
        self.volume
    }

    /// Volume-normalized eigenvalues of the inertia tensor.
    #[must_use]
    pub const fn principal_inertia(&self) -> [f64; 3] {
        self.principal_inertia
    }

    /// Rotation taking the body frame onto the inertia eigenbasis.
    #[must_use]
    pub const fn quat_init(&self) -> UnitQuaternion<f64> {
        self.quat_init
    }

    pub(crate) fn degree_sums(&self, theta: f64, phi: f64) -> DegreeBuf {
        degree_sums_of(&self.coeffs, self.n_max, theta, phi)
    }

    /// Surface radius `r(θ, φ)`.
    #[must_use]
    pub fn radius(&self, theta: f64, phi: f64) -> f64 {
        self.degree_sums(theta, phi).last().copied().unwrap_or_default()
    }

    /// Surface radius and its partial derivatives `(r, ∂r/∂φ, ∂r/∂θ)`.
    ///
    /// The θ-derivative combines unnormalized Legendre values through the
    /// identity `sin θ dP̄_n^m/dθ = f_nm ((n - m + 1) P_{n+1}^m - (n + 1) x
    /// P_n^m)` with the explicit normalization factor `f_nm`.
    #[must_use]
    pub fn radius_and_gradients(&self, theta: f64, phi: f64) -> (f64, f64, f64) {
        let (theta, phi) = nudged(theta, phi);
        let x = theta.cos();
        let sin_t = theta.sin();
        let mut prev2 = DegreeBuf::new();
        let mut prev = DegreeBuf::new();
        prev.push(legendre::seed_mm(0, x));
        let mut r = coeff_at(&self.coeffs, 0, 0).re * prev[0];
        let mut r_phi = 0.0;
        let mut r_theta = 0.0;
        for n in 1..=self.n_max {
            let row = next_row(n, x, &prev, &prev2);
            let nf = convert::f64_from_usize(n);
            for m in 0..=n {
                let a = coeff_at(&self.coeffs, n, m);
                let mf = convert::f64_from_usize(m);
                let (sin_m, cos_m) = (mf * phi).sin_cos();
                let (trig, dtrig) = if m == 0 {
                    (a.re, 0.0)
                } else {
                    (
                        2.0 * a.re.mul_add(cos_m, -(a.im * sin_m)),
                        -2.0 * mf * a.re.mul_add(sin_m, a.im * cos_m),
                    )
                };
                r += trig * row[m];
                r_phi += dtrig * row[m];
                let dp = (nf - mf + 1.0).mul_add(
                    legendre::plgndr_raw(n + 1, m, x),
                    -((nf + 1.0) * x * legendre::plgndr_raw(n, m, x)),
                );
                r_theta += trig * legendre::norm_factor(n, m) * dp / sin_t;
            }
            prev2 = std::mem::replace(&mut prev, row);
        }
        (r, r_phi, r_theta)
    }

    /// Surface radius and the outward, non-unit surface normal in the frame
    /// of evaluation.
    #[must_use]
    pub fn radius_and_normal(&self, theta: f64, phi: f64) -> (f64, Vector3<f64>) {
        let (theta, phi) = nudged(theta, phi);
        let (r, r_phi, r_theta) = self.radius_and_gradients(theta, phi);
        let (st, ct) = theta.sin_cos();
        let (sp, cp) = phi.sin_cos();
        let nx = r * (cp * r * st * st + sp * r_phi - cp * ct * st * r_theta);
        let ny = r * (r * sp * st * st - cp * r_phi - ct * sp * st * r_theta);
        let nz = r * st * ct.mul_add(r, st * r_theta);
        (r, Vector3::new(nx, ny, nz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ShapeParams;
    use float_cmp::assert_approx_eq;
    use std::f64::consts::PI;

    fn sphere_coeffs(n_max: usize, radius: f64) -> Vec<f64> {
        let mut coeffs = vec![0.0; coeff_len(n_max)];
        coeffs[loc(0, 0)] = radius * (4.0 * PI).sqrt();
        coeffs
    }

    fn lumpy_coeffs(n_max: usize) -> Vec<f64> {
        let mut coeffs = sphere_coeffs(n_max, 1.0);
        coeffs[loc(2, 0)] = 0.13;
        coeffs[loc(2, 2)] = 0.05;
        coeffs[loc(2, 2) + 1] = -0.04;
        coeffs[loc(3, 1)] = 0.06;
        coeffs[loc(3, 1) + 1] = 0.02;
        coeffs[loc(4, 3)] = -0.03;
        coeffs
    }

    fn build(coeffs: Vec<f64>, n_max: usize) -> Shape {
        ShapeParams::new(n_max, 30, 1.0).build_shape(coeffs).unwrap()
    }

    #[test]
    fn interleaved_layout_is_contiguous() {
        assert_eq!(loc(0, 0), 0);
        assert_eq!(loc(1, 1), 2);
        assert_eq!(loc(1, 0), 4);
        assert_eq!(loc(2, 2), 6);
        assert_eq!(loc(2, 0), 10);
        for n_max in [0_usize, 1, 5, 20] {
            assert_eq!(loc(n_max, 0) + 2, coeff_len(n_max));
        }
    }

    #[test]
    fn sphere_radius_is_constant() {
        let shape = build(sphere_coeffs(6, 1.0), 6);
        for (theta, phi) in [(0.01, 0.4), (1.2, 3.3), (2.9, 5.1), (PI / 2.0, 0.0)] {
            assert_approx_eq!(f64, shape.radius(theta, phi), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn sphere_normal_is_radial() {
        let shape = build(sphere_coeffs(4, 1.0), 4);
        for (theta, phi) in [(0.7, 1.9), (2.2, 4.0), (1.5707, 0.3)] {
            let (r, normal) = shape.radius_and_normal(theta, phi);
            let radial = Vector3::new(
                theta.sin() * phi.cos(),
                theta.sin() * phi.sin(),
                theta.cos(),
            );
            assert_approx_eq!(f64, normal.cross(&radial).norm(), 0.0, epsilon = 1e-12);
            assert!(normal.dot(&radial) > 0.0);
            assert_approx_eq!(f64, normal.norm(), r * r * theta.sin(), epsilon = 1e-12);
        }
    }

    #[test]
    fn gradients_match_finite_differences() {
        let shape = build(lumpy_coeffs(4), 4);
        let h = 1e-6;
        for (theta, phi) in [(0.8, 1.1), (1.9, 4.7), (2.6, 0.5)] {
            let (r, r_phi, r_theta) = shape.radius_and_gradients(theta, phi);
            assert_approx_eq!(f64, r, shape.radius(theta, phi), epsilon = 1e-12);
            let fd_phi = (shape.radius(theta, phi + h) - shape.radius(theta, phi - h)) / (2.0 * h);
            let fd_theta =
                (shape.radius(theta + h, phi) - shape.radius(theta - h, phi)) / (2.0 * h);
            assert_approx_eq!(f64, r_phi, fd_phi, epsilon = 1e-6);
            assert_approx_eq!(f64, r_theta, fd_theta, epsilon = 1e-6);
        }
    }

    #[test]
    fn pole_evaluation_is_finite() {
        let shape = build(lumpy_coeffs(4), 4);
        let (r, normal) = shape.radius_and_normal(0.0, 0.0);
        assert!(r.is_finite());
        assert!(normal.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn partial_sums_terminate_at_full_radius() {
        let coeffs = lumpy_coeffs(5);
        let sums = degree_sums_of(&coeffs, 5, 1.3, 0.9);
        assert_eq!(sums.len(), 6);
        let shape = build(coeffs, 5);
        assert_approx_eq!(f64, sums[5], shape.radius(1.3, 0.9), epsilon = 1e-14);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn coefficient_accessor_checks_range() {
        let shape = build(sphere_coeffs(3, 1.0), 3);
        let _ = shape.a(2, 3);
    }
}
