//! Error types of this crate.

use thiserror::Error;

/// Catch-all error for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An argument fell outside the domain of a Legendre or surface
    /// evaluation, or a coefficient vector has the wrong length.
    #[error("argument out of domain: {0}")]
    Domain(String),
    /// A record in a coefficient stream could not be parsed.
    #[error("coefficient parse error on line {line}: {reason}")]
    CoefficientParse {
        /// One-based line number of the offending record.
        line: usize,
        /// Why the record was rejected.
        reason: String,
    },
    /// A coefficient stream declares more records than the truncation degree
    /// can hold.
    #[error("coefficient stream declares {count} records, capacity is {capacity}")]
    ShapeFileOverflow {
        /// Declared record count from the stream header.
        count: usize,
        /// Number of `m >= 0` coefficients a shape of this degree stores.
        capacity: usize,
    },
    /// The numerical volume came out non-positive during initialization.
    #[error("numerical volume {0} is not positive")]
    VolumeZero(f64),
    /// The Jacobi eigendecomposition of the inertia tensor did not converge.
    #[error("Jacobi eigendecomposition did not converge within {0} sweeps")]
    JacobiNonConverged(usize),
    /// The particle centers are closer than the partner's bounding radius,
    /// which the cap construction cannot represent.
    #[error("center distance {distance} does not exceed the partner bounding radius {max_rad}")]
    CenterInsideOther {
        /// Distance between the two particle centers.
        distance: f64,
        /// Bounding-sphere radius of the partner particle.
        max_rad: f64,
    },
    /// The Euler angle β lies outside `[0, π]`.
    #[error("Euler angle beta = {0} lies outside [0, pi]")]
    RotationDegenerate(f64),
    /// Failure while reading a coefficient stream.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Error that does not originate from this crate.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Shorthand for results carrying [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
