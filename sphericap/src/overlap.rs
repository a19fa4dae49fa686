//! Pairwise overlap volume, force and torque between two shapes.
//!
//! The integrator restricts the quadrature to the spherical cap of particle
//! `i` that faces particle `j`, tightens the cap half-angle to the outermost
//! contacting ring, and evaluates the overlap volume and the surface
//! integrals by a Gauss–Legendre rule in the polar direction crossed with a
//! uniform azimuthal rule. The force follows a volume-penalty law
//! `F = -m k V^(m-1) S`.

use super::convert;
use super::error::{Error, Result};
use super::quadrature;
use super::shape::{POLE_NUDGE, Shape};
use log::trace;
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Parameters of the pair force law and the cap quadrature.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct OverlapParams {
    stiffness: f64,
    exponent: f64,
    pole_quad: usize,
    radius_tol: f64,
}

impl Default for OverlapParams {
    fn default() -> Self {
        Self {
            stiffness: 1.0,
            exponent: 1.5,
            pole_quad: 30,
            radius_tol: 1e-3,
        }
    }
}

impl OverlapParams {
    /// Constructor.
    ///
    /// # Panics
    ///
    /// Panics if the exponent is not positive, if fewer than two polar
    /// nodes are requested, or if the bisection tolerance is not positive.
    #[must_use]
    pub fn new(stiffness: f64, exponent: f64, pole_quad: usize, radius_tol: f64) -> Self {
        assert!(exponent > 0.0);
        assert!(pole_quad >= 2);
        assert!(radius_tol > 0.0);
        Self {
            stiffness,
            exponent,
            pole_quad,
            radius_tol,
        }
    }

    /// Pair stiffness `k` of the penalty law.
    #[must_use]
    pub const fn stiffness(&self) -> f64 {
        self.stiffness
    }

    /// Volume exponent `m` of the penalty law.
    #[must_use]
    pub const fn exponent(&self) -> f64 {
        self.exponent
    }

    /// Number of Gauss–Legendre nodes across the cap.
    #[must_use]
    pub const fn pole_quad(&self) -> usize {
        self.pole_quad
    }

    /// Radial bisection tolerance, relative to the bounding radius.
    #[must_use]
    pub const fn radius_tol(&self) -> f64 {
        self.radius_tol
    }
}

/// Result of a contacting pair evaluation.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct PairContact {
    /// Overlap volume of the two particles.
    pub volume: f64,
    /// Force on particle `i`.
    pub force: Vector3<f64>,
    /// Torque on particle `i` about its center.
    pub torque: Vector3<f64>,
    /// Point through which the pair force acts; feeds [`Self::reaction`].
    pub contact_point: Vector3<f64>,
}

impl PairContact {
    /// Force and torque exerted on the partner particle centered at `x_j`,
    /// per Newton's third law.
    #[must_use]
    pub fn reaction(&self, x_j: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
        (-self.force, self.force.cross(&(self.contact_point - x_j)))
    }
}

/// Polar angle of the quadrature ring at cap-frame abscissa `x`, for a cap
/// of half-angle `alpha`.
fn ring_angle(x: f64, alpha: f64) -> f64 {
    let cos_alpha = alpha.cos();
    0.5f64
        .mul_add(x * (1.0 - cos_alpha), 0.5 * (1.0 + cos_alpha))
        .clamp(-1.0, 1.0)
        .acos()
}

/// Cap-frame unit direction of a quadrature node.
fn cap_direction(theta_pole: f64, phi_pole: f64) -> Vector3<f64> {
    let (st, ct) = theta_pole.sin_cos();
    let (sp, cp) = phi_pole.sin_cos();
    Vector3::new(st * cp, st * sp, ct)
}

/// Body-frame polar angles of a unit direction.
fn spherical_of(dir: &Vector3<f64>) -> (f64, f64) {
    (dir.z.clamp(-1.0, 1.0).acos(), dir.y.atan2(dir.x))
}

/// Whether the space point `point` lies inside the shape centered at `x`
/// with orientation `q`.
fn inside_shape(shape: &Shape, x: &Vector3<f64>, q: &UnitQuaternion<f64>, point: &Vector3<f64>) -> bool {
    let offset = point - x;
    let dist = offset.norm();
    if dist > shape.max_rad() {
        return false;
    }
    if dist == 0.0 {
        return true;
    }
    let body = q.inverse_transform_vector(&offset) / dist;
    let (theta, phi) = spherical_of(&body);
    shape.check_contact(phi, theta, dist).is_some()
}

/// Overlap volume, force and torque for one particle pair.
///
/// Particle `i` carries the cap quadrature; particle `j` is probed through
/// its contact test. Positions are in the space frame, quaternions rotate
/// body-frame vectors into the space frame. `Ok(None)` is the regular
/// no-contact result.
///
/// # Errors
///
/// Returns [`Error::CenterInsideOther`] if the centers are closer than the
/// bounding radius of `j`, in which case no facing cap exists.
pub fn pair_overlap(
    shape_i: &Shape,
    shape_j: &Shape,
    x_i: &Vector3<f64>,
    x_j: &Vector3<f64>,
    q_i: &UnitQuaternion<f64>,
    q_j: &UnitQuaternion<f64>,
    params: &OverlapParams,
) -> Result<Option<PairContact>> {
    let sep = x_j - x_i;
    let dist = sep.norm();
    if dist >= shape_i.max_rad() + shape_j.max_rad() {
        return Ok(None);
    }
    if dist <= shape_j.max_rad() {
        return Err(Error::CenterInsideOther {
            distance: dist,
            max_rad: shape_j.max_rad(),
        });
    }

    // quaternion taking the cap-frame pole onto the center-center axis
    let q_cap = UnitQuaternion::rotation_between(&Vector3::z(), &sep)
        .unwrap_or_else(|| UnitQuaternion::from_axis_angle(&Vector3::x_axis(), PI));
    let q_body_i = q_i.inverse() * q_cap;
    let alpha0 = (shape_j.max_rad() / dist).asin();

    let qp = params.pole_quad();
    let n_phi = 2 * qp - 1;
    let nodes = quadrature::gl_nodes(qp)?;

    // tighten the cap to the outermost ring that still touches the partner
    let mut alpha = None;
    'rings: for &(x_node, _) in &nodes {
        let theta_pole = ring_angle(x_node, alpha0);
        for ell in 0..n_phi {
            let phi_pole = 2.0 * PI * convert::f64_from_usize(ell) / convert::f64_from_usize(n_phi);
            let g = cap_direction(theta_pole, phi_pole);
            let (theta_a, phi_a) = spherical_of(&(q_body_i * g));
            let r_a = shape_i.radius(theta_a, phi_a);
            let point = x_i + r_a * (q_cap * g);
            if inside_shape(shape_j, x_j, q_j, &point) {
                alpha = Some(theta_pole);
                break 'rings;
            }
        }
    }
    let Some(alpha) = alpha else {
        return Ok(None);
    };
    trace!("cap refined from {alpha0:.6} to {alpha:.6} for centers {dist:.6} apart");

    let tol = params.radius_tol() * shape_i.max_rad();
    let mut vol_sum = 0.0;
    let mut surface = Vector3::zeros();
    let mut moment = Vector3::zeros();
    for &(x_node, w) in &nodes {
        let theta_pole = ring_angle(x_node, alpha);
        for ell in 0..n_phi {
            let phi_pole = 2.0 * PI * convert::f64_from_usize(ell) / convert::f64_from_usize(n_phi);
            let g = cap_direction(theta_pole, phi_pole);
            let (mut theta_a, phi_a) = spherical_of(&(q_body_i * g));
            if theta_a.sin() == 0.0 {
                theta_a += POLE_NUDGE;
            }
            let (r_a, normal) = shape_i.radius_and_normal(theta_a, phi_a);
            let dir_space = q_cap * g;
            let point = x_i + r_a * dir_space;
            if !inside_shape(shape_j, x_j, q_j, &point) {
                continue;
            }
            // the partner surface crossing along the radial ray
            let mut lower = 0.0;
            let mut upper = r_a;
            while upper - lower > tol {
                let mid = 0.5 * (upper + lower);
                if inside_shape(shape_j, x_j, q_j, &(x_i + mid * dir_space)) {
                    upper = mid;
                } else {
                    lower = mid;
                }
            }
            vol_sum += w * (r_a.powi(3) - upper.powi(3));
            let scaled = (q_i * normal) * (w / theta_a.sin());
            surface += scaled;
            moment += (point - x_i).cross(&scaled);
        }
    }
    let fac = 0.5 * (1.0 - alpha.cos()) * 2.0 * PI / convert::f64_from_usize(n_phi);
    let volume = fac * vol_sum / 3.0;
    if volume <= 0.0 {
        return Ok(None);
    }
    let surface = fac * surface;
    let moment = fac * moment;

    let penalty =
        params.exponent() * params.stiffness() * volume.powf(params.exponent() - 1.0);
    let force = -penalty * surface;
    let torque = -penalty * moment;
    let contact_point = if force.norm_squared() > 0.0 {
        x_i + torque.cross(&force) / force.norm_squared()
    } else {
        *x_i
    };
    Ok(Some(PairContact {
        volume,
        force,
        torque,
        contact_point,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ShapeParams;
    use crate::shape::{coeff_len, loc};
    use float_cmp::assert_approx_eq;

    fn unit_sphere(n_max: usize) -> Shape {
        let mut coeffs = vec![0.0; coeff_len(n_max)];
        coeffs[loc(0, 0)] = (4.0 * PI).sqrt();
        ShapeParams::new(n_max, 24, 1.0).build_shape(coeffs).unwrap()
    }

    fn lens_volume(r: f64, d: f64) -> f64 {
        PI * 4.0f64.mul_add(r, d) * (2.0 * r - d).powi(2) / 12.0
    }

    #[test]
    fn separated_spheres_do_not_interact() {
        let sphere = unit_sphere(2);
        let result = pair_overlap(
            &sphere,
            &sphere,
            &Vector3::zeros(),
            &Vector3::new(2.5, 0.0, 0.0),
            &UnitQuaternion::identity(),
            &UnitQuaternion::identity(),
            &OverlapParams::default(),
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn touching_spheres_recover_the_lens_volume() {
        let sphere = unit_sphere(2);
        for d in [1.5_f64, 1.9] {
            let contact = pair_overlap(
                &sphere,
                &sphere,
                &Vector3::zeros(),
                &Vector3::new(d, 0.0, 0.0),
                &UnitQuaternion::identity(),
                &UnitQuaternion::identity(),
                &OverlapParams::default(),
            )
            .unwrap()
            .expect("overlapping spheres must touch");
            let expected = lens_volume(1.0, d);
            assert!((contact.volume - expected).abs() < 0.02 * expected);
            // central force: pushes i away from j, no torque
            assert!(contact.force.x < 0.0);
            assert!(contact.force.y.abs() < 1e-10 * contact.force.x.abs());
            assert!(contact.force.z.abs() < 1e-10 * contact.force.x.abs());
            assert!(contact.torque.norm() < 1e-10 * contact.force.norm());
        }
    }

    #[test]
    fn sphere_force_matches_cap_surface_vector() {
        let sphere = unit_sphere(2);
        let d = 1.9_f64;
        let params = OverlapParams::new(1.0, 1.5, 30, 1e-3);
        let contact = pair_overlap(
            &sphere,
            &sphere,
            &Vector3::zeros(),
            &Vector3::new(d, 0.0, 0.0),
            &UnitQuaternion::identity(),
            &UnitQuaternion::identity(),
            &params,
        )
        .unwrap()
        .unwrap();
        let rim_sq = 4.0f64.mul_add(-(0.25 * d * d), 4.0) / 4.0;
        let expected = 1.5 * contact.volume.sqrt() * PI * rim_sq;
        assert!((contact.force.norm() - expected).abs() < 0.05 * expected);
    }

    #[test]
    fn overlapping_centers_are_rejected() {
        let sphere = unit_sphere(2);
        let result = pair_overlap(
            &sphere,
            &sphere,
            &Vector3::zeros(),
            &Vector3::new(0.8, 0.0, 0.0),
            &UnitQuaternion::identity(),
            &UnitQuaternion::identity(),
            &OverlapParams::default(),
        );
        assert!(matches!(result, Err(Error::CenterInsideOther { .. })));
    }

    #[test]
    fn antiparallel_axis_is_handled() {
        let sphere = unit_sphere(2);
        let contact = pair_overlap(
            &sphere,
            &sphere,
            &Vector3::zeros(),
            &Vector3::new(0.0, 0.0, -1.9),
            &UnitQuaternion::identity(),
            &UnitQuaternion::identity(),
            &OverlapParams::default(),
        )
        .unwrap()
        .unwrap();
        assert!(contact.force.z > 0.0);
        assert!((contact.volume - lens_volume(1.0, 1.9)).abs() < 0.02 * lens_volume(1.0, 1.9));
    }

    #[test]
    fn reaction_balances_the_pair() {
        let sphere = unit_sphere(2);
        let x_j = Vector3::new(1.2, 1.0, 0.6);
        let contact = pair_overlap(
            &sphere,
            &sphere,
            &Vector3::zeros(),
            &x_j,
            &UnitQuaternion::identity(),
            &UnitQuaternion::identity(),
            &OverlapParams::default(),
        )
        .unwrap()
        .unwrap();
        let (force_j, _) = contact.reaction(&x_j);
        assert_approx_eq!(f64, (contact.force + force_j).norm(), 0.0, epsilon = 0.0);
    }

    #[test]
    fn bisection_tolerance_controls_the_volume_drift() {
        let sphere = unit_sphere(2);
        let coarse = pair_overlap(
            &sphere,
            &sphere,
            &Vector3::zeros(),
            &Vector3::new(1.7, 0.0, 0.0),
            &UnitQuaternion::identity(),
            &UnitQuaternion::identity(),
            &OverlapParams::new(1.0, 1.5, 30, 1e-3),
        )
        .unwrap()
        .unwrap();
        let fine = pair_overlap(
            &sphere,
            &sphere,
            &Vector3::zeros(),
            &Vector3::new(1.7, 0.0, 0.0),
            &UnitQuaternion::identity(),
            &UnitQuaternion::identity(),
            &OverlapParams::new(1.0, 1.5, 30, 1e-5),
        )
        .unwrap()
        .unwrap();
        assert!((coarse.volume - fine.volume).abs() < 1e-2 * fine.volume);
    }
}
