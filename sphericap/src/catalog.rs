//! Shape initialization and the shape catalog.
//!
//! [`ShapeParams`] ingests spherical-harmonic coefficients from a text
//! stream or a prepared vector and runs the full setup pipeline: the
//! quadrature grid, the tabulated surface radii, volume and inertia, the
//! principal frame, the bounding radius and the per-degree expansion
//! factors. The resulting [`Shape`]s are collected in a [`ShapeCatalog`]
//! and referenced by index from then on.

use super::error::{Error, Result};
use super::inertia;
use super::quadrature;
use super::shape::{self, MAX_DEGREE_PLUS_ONE, Shape};
use itertools::izip;
use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::io::BufRead;

/// Shape initialization parameters.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct ShapeParams {
    n_max: usize,
    n_quad: usize,
    safety: f64,
}

impl Default for ShapeParams {
    fn default() -> Self {
        Self {
            n_max: 20,
            n_quad: 40,
            safety: 1.0,
        }
    }
}

impl ShapeParams {
    /// Constructor.
    ///
    /// # Panics
    ///
    /// Panics if `n_max` exceeds the rolling-buffer capacity, if the
    /// quadrature order is below two, or if the safety factor shrinks the
    /// bounds it is meant to widen.
    #[must_use]
    pub fn new(n_max: usize, n_quad: usize, safety: f64) -> Self {
        // the recursion buffers are stack arrays of fixed capacity
        assert!(n_max < MAX_DEGREE_PLUS_ONE);
        assert!(n_quad >= 2);
        assert!(safety >= 1.0);
        Self {
            n_max,
            n_quad,
            safety,
        }
    }

    /// Truncation degree of the expansion.
    #[must_use]
    pub const fn n_max(&self) -> usize {
        self.n_max
    }

    /// Quadrature order along each surface angle.
    #[must_use]
    pub const fn n_quad(&self) -> usize {
        self.n_quad
    }

    /// Multiplier widening the bounding radius and the expansion factors.
    #[must_use]
    pub const fn safety(&self) -> f64 {
        self.safety
    }

    /// Reads one coefficient stream and builds the shape.
    ///
    /// # Errors
    ///
    /// Returns the parse and pipeline failures of
    /// [`parse_coefficients`] and [`Self::build_shape`].
    pub fn read_shape(&self, reader: impl BufRead) -> Result<Shape> {
        let coeffs = parse_coefficients(self.n_max, reader)?;
        self.build_shape(coeffs)
    }

    /// Runs the initialization pipeline on a prepared coefficient vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Domain`] if the vector length does not match the
    /// truncation degree, [`Error::VolumeZero`] if the integrated volume is
    /// not positive, and [`Error::JacobiNonConverged`] if the inertia
    /// eigensolve stalls.
    pub fn build_shape(&self, coeffs: Vec<f64>) -> Result<Shape> {
        if coeffs.len() != shape::coeff_len(self.n_max) {
            return Err(Error::Domain(format!(
                "coefficient vector of length {} does not fit degree {} (expected {})",
                coeffs.len(),
                self.n_max,
                shape::coeff_len(self.n_max)
            )));
        }
        let q = self.n_quad;
        let nodes = quadrature::gl_nodes(q)?;
        let weights: Vec<f64> = nodes.iter().map(|&(_, w)| w).collect();
        let thetas: Vec<f64> = nodes.iter().map(|&(x, _)| 0.5 * PI * (x + 1.0)).collect();
        let phis: Vec<f64> = nodes.iter().map(|&(x, _)| PI * (x + 1.0)).collect();

        let mut angles = Array2::zeros((2, q * q));
        let mut quad_rads = vec![0.0; q * q];
        let mut alphas = vec![1.0_f64; self.n_max];
        let mut max_rad = 0.0_f64;
        let mut volume = 0.0;
        let mut moments = [0.0_f64; 6];
        for (i, (&wi, &theta)) in izip!(&weights, &thetas).enumerate() {
            let (st, ct) = theta.sin_cos();
            for (j, (&wj, &phi)) in izip!(&weights, &phis).enumerate() {
                let k = i * q + j;
                angles[[0, k]] = theta;
                angles[[1, k]] = phi;
                let sums = shape::degree_sums_of(&coeffs, self.n_max, theta, phi);
                let r = sums[self.n_max];
                quad_rads[k] = r;
                max_rad = max_rad.max(r);
                for (alpha, pair) in alphas.iter_mut().zip(sums.windows(2)) {
                    *alpha = alpha.max(pair[1] / pair[0]);
                }
                let (sp, cp) = phi.sin_cos();
                let ww = wi * wj;
                volume += ww * r.powi(3) * st / 3.0;
                let fac = 0.2 * ww * r.powi(5) * st;
                moments[0] += fac * (cp * st).mul_add(-(cp * st), 1.0);
                moments[1] += fac * (sp * st).mul_add(-(sp * st), 1.0);
                moments[2] += fac * ct.mul_add(-ct, 1.0);
                moments[3] -= fac * cp * sp * st * st;
                moments[4] -= fac * cp * ct * st;
                moments[5] -= fac * sp * ct * st;
            }
        }

        // Jacobian of the (θ, φ) map from the [-1, 1]² Gauss grid
        let jac = 0.5 * PI * PI;
        volume *= jac;
        if volume <= 0.0 {
            return Err(Error::VolumeZero(volume));
        }
        for moment in &mut moments {
            *moment *= jac / volume;
        }
        let tensor = [
            [moments[0], moments[3], moments[4]],
            [moments[3], moments[1], moments[5]],
            [moments[4], moments[5], moments[2]],
        ];
        let (principal_inertia, quat_init) = inertia::principal_frame(tensor)?;

        let mut expfacts = vec![1.0; self.n_max + 1];
        let mut growth = 1.0;
        for n in (0..self.n_max).rev() {
            growth *= alphas[n] * self.safety;
            expfacts[n] = growth;
        }
        max_rad *= self.safety;

        debug!(
            "shape initialized: n_max = {}, volume = {volume:.6e}, max radius = {max_rad:.6e}, \
             principal inertia = {principal_inertia:?}",
            self.n_max
        );
        Ok(Shape::from_parts(
            self.n_max,
            coeffs,
            q,
            angles,
            weights,
            quad_rads,
            max_rad,
            expfacts,
            volume,
            principal_inertia,
            quat_init,
        ))
    }
}

/// Parses a coefficient stream with `n m re im` records.
///
/// Comment lines start with `#`, an optional leading line with a single
/// integer declares the record count, records with `m < 0` are skipped
/// because the conjugate partners are implicit, and reading stops at the
/// first record beyond the truncation degree.
///
/// # Errors
///
/// Returns [`Error::CoefficientParse`] with the offending line number for
/// malformed records, [`Error::ShapeFileOverflow`] if the declared count
/// exceeds the coefficient capacity, and [`Error::Io`] for reader failures.
pub fn parse_coefficients(n_max: usize, reader: impl BufRead) -> Result<Vec<f64>> {
    let capacity = shape::coeff_len(n_max) / 2;
    let mut coeffs = vec![0.0; shape::coeff_len(n_max)];
    let mut header_allowed = true;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = index + 1;
        let record = line.trim();
        if record.is_empty() || record.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = record.split_whitespace().collect();
        if header_allowed && fields.len() == 1 {
            let count: usize = fields[0].parse().map_err(|_| Error::CoefficientParse {
                line: lineno,
                reason: format!("header `{record}` is not an integer record count"),
            })?;
            if count > capacity {
                return Err(Error::ShapeFileOverflow { count, capacity });
            }
            header_allowed = false;
            continue;
        }
        header_allowed = false;
        if fields.len() != 4 {
            return Err(Error::CoefficientParse {
                line: lineno,
                reason: format!("expected 4 fields `n m re im`, found {}", fields.len()),
            });
        }
        let n: usize = fields[0].parse().map_err(|_| Error::CoefficientParse {
            line: lineno,
            reason: format!("degree `{}` is not a non-negative integer", fields[0]),
        })?;
        let m: i64 = fields[1].parse().map_err(|_| Error::CoefficientParse {
            line: lineno,
            reason: format!("order `{}` is not an integer", fields[1]),
        })?;
        let re: f64 = fields[2].parse().map_err(|_| Error::CoefficientParse {
            line: lineno,
            reason: format!("real part `{}` is not a number", fields[2]),
        })?;
        let im: f64 = fields[3].parse().map_err(|_| Error::CoefficientParse {
            line: lineno,
            reason: format!("imaginary part `{}` is not a number", fields[3]),
        })?;
        if m < 0 {
            continue;
        }
        if n > n_max {
            break;
        }
        let m = usize::try_from(m).map_err(|_| Error::CoefficientParse {
            line: lineno,
            reason: format!("order `{m}` overflows"),
        })?;
        if m > n {
            return Err(Error::CoefficientParse {
                line: lineno,
                reason: format!("order {m} exceeds degree {n}"),
            });
        }
        let k = shape::loc(n, m);
        coeffs[k] = re;
        coeffs[k + 1] = im;
    }
    Ok(coeffs)
}

/// Ordered, read-only collection of initialized shapes, referenced by
/// integer handle.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ShapeCatalog {
    shapes: Vec<Shape>,
}

impl ShapeCatalog {
    /// An empty catalog.
    #[must_use]
    pub const fn new() -> Self {
        Self { shapes: Vec::new() }
    }

    /// Appends a shape and returns its handle.
    pub fn push(&mut self, shape: Shape) -> usize {
        self.shapes.push(shape);
        self.shapes.len() - 1
    }

    /// The shape behind a handle, if any.
    #[must_use]
    pub fn get(&self, sht: usize) -> Option<&Shape> {
        self.shapes.get(sht)
    }

    /// Number of shapes in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Whether the catalog holds no shapes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Iterates over the shapes in handle order.
    pub fn iter(&self) -> std::slice::Iter<'_, Shape> {
        self.shapes.iter()
    }
}

impl<'a> IntoIterator for &'a ShapeCatalog {
    type Item = &'a Shape;
    type IntoIter = std::slice::Iter<'a, Shape>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
