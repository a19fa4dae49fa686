//! Inertia-tensor diagonalization and eigenframe extraction.

use super::error::{Error, Result};
use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

const MAX_SWEEPS: usize = 50;
const EIGENVALUE_CLAMP: f64 = 1e-7;

/// Diagonalizes the symmetric 3×3 matrix `a` by cyclic Jacobi rotations.
/// Returns the eigenvalues and the matrix whose columns are the
/// corresponding eigenvectors.
pub(crate) fn jacobi(mut a: [[f64; 3]; 3]) -> Result<([f64; 3], [[f64; 3]; 3])> {
    let mut v = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    for sweep in 0..MAX_SWEEPS {
        let off = a[0][1].abs() + a[0][2].abs() + a[1][2].abs();
        if off == 0.0 {
            return Ok(([a[0][0], a[1][1], a[2][2]], v));
        }
        let tresh = if sweep < 3 { 0.2 * off / 9.0 } else { 0.0 };
        for (p, q) in [(0_usize, 1_usize), (0, 2), (1, 2)] {
            let apq = a[p][q];
            let small = 100.0 * apq.abs();
            if sweep > 3
                && a[p][p].abs() + small == a[p][p].abs()
                && a[q][q].abs() + small == a[q][q].abs()
            {
                a[p][q] = 0.0;
                a[q][p] = 0.0;
                continue;
            }
            if apq.abs() <= tresh {
                continue;
            }
            let theta = 0.5 * (a[q][q] - a[p][p]) / apq;
            let t = if theta >= 0.0 {
                1.0 / (theta + theta.hypot(1.0))
            } else {
                1.0 / (theta - theta.hypot(1.0))
            };
            let c = 1.0 / t.hypot(1.0);
            let s = t * c;
            for k in 0..3 {
                let akp = a[k][p];
                let akq = a[k][q];
                a[k][p] = c.mul_add(akp, -(s * akq));
                a[k][q] = s.mul_add(akp, c * akq);
            }
            for k in 0..3 {
                let apk = a[p][k];
                let aqk = a[q][k];
                a[p][k] = c.mul_add(apk, -(s * aqk));
                a[q][k] = s.mul_add(apk, c * aqk);
            }
            for row in &mut v {
                let vkp = row[p];
                let vkq = row[q];
                row[p] = c.mul_add(vkp, -(s * vkq));
                row[q] = s.mul_add(vkp, c * vkq);
            }
        }
    }
    Err(Error::JacobiNonConverged(MAX_SWEEPS))
}

/// Principal inertia values and the rotation from the body frame onto the
/// eigenbasis. Eigenvalues below `1e-7` of the largest are clamped to zero
/// and the eigenbasis is made right-handed.
pub(crate) fn principal_frame(tensor: [[f64; 3]; 3]) -> Result<([f64; 3], UnitQuaternion<f64>)> {
    let (mut values, vectors) = jacobi(tensor)?;
    let e1 = Vector3::new(vectors[0][0], vectors[1][0], vectors[2][0]);
    let e2 = Vector3::new(vectors[0][1], vectors[1][1], vectors[2][1]);
    let mut e3 = Vector3::new(vectors[0][2], vectors[1][2], vectors[2][2]);
    if e1.cross(&e2).dot(&e3) < 0.0 {
        e3 = -e3;
    }
    let largest = values.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()));
    for value in &mut values {
        if *value < EIGENVALUE_CLAMP * largest {
            *value = 0.0;
        }
    }
    let basis = Matrix3::from_columns(&[e1, e2, e3]);
    let quat = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(basis));
    Ok((values, quat))
}
