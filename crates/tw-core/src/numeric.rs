/// Linear interpolation in a sorted table, clamped at both ends.
///
/// `xs` must be ascending. Returns `None` only for an empty table.
pub fn interp_clamped(xs: &[f64], ys: &[f64], x: f64) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return None;
    }
    if n == 1 || x <= xs[0] {
        return Some(ys[0]);
    }
    if x >= xs[n - 1] {
        return Some(ys[n - 1]);
    }
    // first index with xs[i] > x
    let hi = xs[..n].partition_point(|&v| v <= x);
    let lo = hi - 1;
    let span = xs[hi] - xs[lo];
    if span <= 0.0 {
        return Some(ys[lo]);
    }
    let w = (x - xs[lo]) / span;
    Some(ys[lo] + w * (ys[hi] - ys[lo]))
}
