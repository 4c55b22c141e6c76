//! Log-space arithmetic helpers.

/// `ln(exp(a) + exp(b))` without overflow. Either side may be `-inf`.
#[inline]
pub fn log_add(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let max = a.max(b);
    max + ((a - max).exp() + (b - max).exp()).ln()
}

/// `ln(Σ exp(x))` over an iterator. Empty input gives `-inf`.
pub fn log_sum_exp<I>(xs: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    xs.into_iter().fold(f64::NEG_INFINITY, log_add)
}

/// Natural log of a probability, mapping zero to `-inf`.
#[inline]
pub(crate) fn ln_or_neg_inf(p: f64) -> f64 {
    if p > 0.0 { p.ln() } else { f64::NEG_INFINITY }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_add_matches_direct() {
        let a = 0.3f64.ln();
        let b = 0.2f64.ln();
        assert!((log_add(a, b) - 0.5f64.ln()).abs() < 1e-12);
        assert_eq!(log_add(f64::NEG_INFINITY, b), b);
        assert_eq!(log_add(a, f64::NEG_INFINITY), a);
    }

    #[test]
    fn test_log_sum_exp_stability() {
        let xs = [-1000.0, -1000.0];
        let expected = -1000.0 + 2f64.ln();
        assert!((log_sum_exp(xs) - expected).abs() < 1e-9);
        assert_eq!(log_sum_exp(std::iter::empty()), f64::NEG_INFINITY);
    }

    #[test]
    fn test_ln_or_neg_inf() {
        assert_eq!(ln_or_neg_inf(0.0), f64::NEG_INFINITY);
        assert_eq!(ln_or_neg_inf(1.0), 0.0);
    }
}
