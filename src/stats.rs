/// Sample standard deviation (n - 1 denominator) of the finite values.
/// Fewer than two finite values give 0.
pub fn sample_std_dev<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    // Welford's running update.
    let mut n = 0usize;
    let mut mean = 0.0;
    let mut m2 = 0.0;
    for x in values.into_iter().filter(|x| x.is_finite()) {
        n += 1;
        let delta = x - mean;
        mean += delta / n as f64;
        m2 += delta * (x - mean);
    }
    if n < 2 {
        0.0
    } else {
        (m2 / (n - 1) as f64).sqrt()
    }
}

/// Divisor for standardizing: the standard deviation, or 1 when it is zero
/// or undefined.
pub fn scale_divisor(std_dev: f64) -> f64 {
    if std_dev == 0.0 || !std_dev.is_finite() {
        1.0
    } else {
        std_dev
    }
}
