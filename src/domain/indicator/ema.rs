//! Exponential moving average with recursive (`adjust=false`) smoothing.
//!
//! alpha = 2/(span+1), EMA[0] = x[0], then EMA[i] = x[i]*alpha + EMA[i-1]*(1-alpha).
//! There is no SMA seed and no finite-window renormalization, so every index has
//! a value; the first few are warm-up artifacts.

pub fn smoothing_factor(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

pub fn ewm_adjust_false(values: &[f64], span: usize) -> Vec<f64> {
    if values.is_empty() || span == 0 {
        return Vec::new();
    }

    let alpha = smoothing_factor(span);
    let mut out = Vec::with_capacity(values.len());
    let mut ema = values[0];
    out.push(ema);

    for &x in &values[1..] {
        ema = x * alpha + ema * (1.0 - alpha);
        out.push(ema);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ema_first_value_is_first_input() {
        let out = ewm_adjust_false(&[10.0, 20.0, 30.0], 3);
        assert_eq!(out[0], 10.0);
    }

    #[test]
    fn ema_recursive_calculation() {
        let out = ewm_adjust_false(&[10.0, 20.0, 30.0, 40.0], 3);
        let k = 0.5;
        let e1 = 20.0 * k + 10.0 * (1.0 - k);
        let e2 = 30.0 * k + e1 * (1.0 - k);
        let e3 = 40.0 * k + e2 * (1.0 - k);
        assert_relative_eq!(out[1], e1);
        assert_relative_eq!(out[2], e2);
        assert_relative_eq!(out[3], e3);
    }

    #[test]
    fn ema_span_1_tracks_input() {
        let out = ewm_adjust_false(&[3.0, 1.0, 4.0, 1.0, 5.0], 1);
        assert_eq!(out, vec![3.0, 1.0, 4.0, 1.0, 5.0]);
    }

    #[test]
    fn ema_constant_input() {
        let out = ewm_adjust_false(&[100.0; 10], 12);
        assert!(out.iter().all(|v| (v - 100.0).abs() < 1e-12));
    }

    #[test]
    fn ema_empty_or_zero_span() {
        assert!(ewm_adjust_false(&[], 3).is_empty());
        assert!(ewm_adjust_false(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn ema_smoothing_factor() {
        assert_relative_eq!(smoothing_factor(10), 2.0 / 11.0);
    }
}
