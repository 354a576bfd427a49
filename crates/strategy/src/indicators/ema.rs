/// Exponential moving average.
///
/// Seeds at position `period - 1` with the SMA of the first `period` values,
/// then applies `k = 2 / (period + 1)`. Earlier positions are `None`.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut prev = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(prev);

    for (i, &price) in values.iter().enumerate().skip(period) {
        prev = price * k + prev * (1.0 - k);
        out[i] = Some(prev);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_seeds_with_sma() {
        let out = ema(&[2.0, 4.0, 6.0, 8.0], 3);
        assert_eq!(out[..2], [None, None]);
        assert_eq!(out[2], Some(4.0));
        // k = 0.5: 8*0.5 + 4*0.5
        assert_eq!(out[3], Some(6.0));
    }

    #[test]
    fn ema_constant_series_is_constant() {
        let out = ema(&[5.0; 60], 45);
        assert!(out[44..]
            .iter()
            .all(|v| v.is_some_and(|x| (x - 5.0).abs() < 1e-9)));
    }

    #[test]
    fn ema_short_input_is_all_none() {
        assert!(ema(&[1.0; 44], 45).iter().all(Option::is_none));
    }
}
