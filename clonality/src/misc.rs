//! Log-space numerics shared by the densities and the samplers.
use statrs::function::factorial::ln_binomial;
use statrs::function::gamma::ln_gamma;

/// LogSumExp(xs). Negative infinities do not contribute to the sum.
/// If the vector is empty, or all the elements are negative infinity, it returns negative infinity.
pub fn logsumexp(xs: &[f64]) -> f64 {
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max.is_infinite() {
        return max;
    }
    let sum = xs.iter().map(|x| (x - max).exp()).sum::<f64>().ln();
    assert!(sum >= 0., "{:?}->{}", xs, sum);
    max + sum
}

/// Streaming version of [logsumexp](logsumexp).
pub fn logsumexp_str<I: Iterator<Item = f64>>(xs: I) -> f64 {
    let (mut max, mut accum) = (f64::NEG_INFINITY, 0f64);
    for x in xs.filter(|&x| x != f64::NEG_INFINITY) {
        if x <= max {
            accum += (x - max).exp();
        } else {
            accum = (max - x).exp() * accum + 1f64;
            max = x;
        }
    }
    match max == f64::NEG_INFINITY {
        true => max,
        false => accum.ln() + max,
    }
}

/// Normalize log-scaled weights into probabilities.
/// Entries of negative infinity get probability zero.
/// Return None if no entry has positive weight.
pub fn normalize_log_weights(log_weights: &[f64]) -> Option<Vec<f64>> {
    let total = logsumexp(log_weights);
    if !total.is_finite() {
        return None;
    }
    let probs = log_weights.iter().map(|w| (w - total).exp()).collect();
    Some(probs)
}

// x * ln(y), with 0 * ln(0) = 0.
fn xlny(x: u64, y: f64) -> f64 {
    match x {
        0 => 0f64,
        _ => x as f64 * y.ln(),
    }
}

/// Log Binomial(k|n,p). The caller should guarantee k <= n and 0 <= p <= 1.
pub fn log_binomial_pdf(k: u64, n: u64, p: f64) -> f64 {
    debug_assert!(k <= n, "{}>{}", k, n);
    ln_binomial(n, k) + xlny(k, p) + xlny(n - k, 1f64 - p)
}

fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

/// Log BetaBinomial(k|n,a,b). If either a or b is zero, the distribution
/// degenerates to the point mass at k=0 or k=n.
pub fn log_beta_binomial_pdf(k: u64, n: u64, a: f64, b: f64) -> f64 {
    debug_assert!(k <= n, "{}>{}", k, n);
    if a <= 0f64 {
        return if k == 0 { 0f64 } else { f64::NEG_INFINITY };
    } else if b <= 0f64 {
        return if k == n { 0f64 } else { f64::NEG_INFINITY };
    }
    let (k_f, n_f) = (k as f64, n as f64);
    ln_binomial(n, k) + ln_beta(k_f + a, n_f - k_f + b) - ln_beta(a, b)
}

/// Log Gamma(x|shape,rate).
pub fn log_gamma_pdf(x: f64, shape: f64, rate: f64) -> f64 {
    if x <= 0f64 {
        return f64::NEG_INFINITY;
    }
    shape * rate.ln() - ln_gamma(shape) + (shape - 1f64) * x.ln() - rate * x
}
