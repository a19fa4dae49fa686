/// Converts grid and degree indices into the floating-point factors the
/// recursions need. Index magnitudes in this crate stay far below `u32::MAX`.
pub fn f64_from_usize(x: usize) -> f64 {
    f64::from(u32::try_from(x).unwrap())
}
