//! Progressive-degree point-inclusion test.

use super::legendre;
use super::shape::{self, DegreeBuf, Shape};

impl Shape {
    /// Tests whether a point at distance `dist` along the body-frame
    /// direction `(θ, φ)` lies inside the surface. Returns the full surface
    /// radius on contact.
    ///
    /// The partial radius sum `r_n` is accumulated degree by degree;
    /// `expfacts()[n] * r_n` bounds the full radius from above, so the test
    /// bails out at the lowest degree that already proves the point outside.
    #[must_use]
    pub fn check_contact(&self, phi: f64, theta: f64, dist: f64) -> Option<f64> {
        let x = theta.cos();
        let expfacts = self.expfacts();
        let mut prev2 = DegreeBuf::new();
        let mut prev = DegreeBuf::new();
        prev.push(legendre::seed_mm(0, x));
        let mut r = self.a(0, 0).re * prev[0];
        if dist > expfacts[0] * r {
            return None;
        }
        for n in 1..=self.n_max() {
            let row = shape::next_row(n, x, &prev, &prev2);
            r += shape::degree_term(self.coeffs(), n, &row, phi);
            if dist > expfacts[n] * r {
                return None;
            }
            prev2 = std::mem::replace(&mut prev, row);
        }
        (dist <= r).then_some(r)
    }
}
