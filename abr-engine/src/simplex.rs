//! Euclidean projection onto the probability simplex
//!
//! Sort-based algorithm from Chen & Ye, "Projection onto a simplex"
//! (arXiv:1101.6081).

/// Project `y` onto `{x : x >= 0, sum(x) = 1}`
///
/// Returns the point of the simplex closest to `y` in Euclidean distance.
/// Entries may be negative or all equal; an empty input gives an empty output.
pub fn project_onto_simplex(y: &[f64]) -> Vec<f64> {
    let m = y.len();
    if m == 0 {
        return Vec::new();
    }

    let mut sorted = y.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumsum = 0.0;
    let mut tau = None;
    for k in 1..m {
        cumsum += sorted[k - 1];
        let candidate = (cumsum - 1.0) / k as f64;
        if candidate >= sorted[k] {
            tau = Some(candidate);
            break;
        }
    }
    let tau = tau.unwrap_or_else(|| (sorted.iter().sum::<f64>() - 1.0) / m as f64);

    y.iter().map(|&v| (v - tau).max(0.0)).collect()
}

/// Dot product of two equally sized vectors
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
