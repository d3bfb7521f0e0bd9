/// Squared euclidean distance, accumulated in `f64`.
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (f64::from(x) - f64::from(y)).powi(2))
        .sum()
}

/// Euclidean distance between two vectors of the same length.
#[inline]
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    squared_l2(a, b).sqrt() as f32
}
