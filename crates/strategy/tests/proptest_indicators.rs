use proptest::prelude::*;
use strategy::indicators::{ema, rsi, sma};

fn prices(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.01f64..100_000.0f64, 0..max_len)
}

proptest! {
    /// Inputs shorter than the period yield an all-undefined sequence of the same length.
    #[test]
    fn short_inputs_are_all_undefined(period in 2usize..60, values in prices(60)) {
        prop_assume!(values.len() < period);
        for out in [sma(&values, period), ema(&values, period), rsi(&values, period)] {
            prop_assert_eq!(out.len(), values.len());
            prop_assert!(out.iter().all(Option::is_none));
        }
    }

    /// Output length always matches input length.
    #[test]
    fn lengths_are_preserved(period in 1usize..30, values in prices(200)) {
        prop_assert_eq!(sma(&values, period).len(), values.len());
        prop_assert_eq!(ema(&values, period).len(), values.len());
        prop_assert_eq!(rsi(&values, period.max(2)).len(), values.len());
    }

    /// RSI is never NaN and always within [0, 100].
    #[test]
    fn rsi_is_bounded(period in 2usize..30, values in prices(300)) {
        for v in rsi(&values, period).into_iter().flatten() {
            prop_assert!(!v.is_nan());
            prop_assert!((0.0..=100.0).contains(&v), "rsi out of range: {}", v);
        }
    }

    /// SMA stays within the window's min/max.
    #[test]
    fn sma_is_bounded_by_window(period in 1usize..20, values in prices(100)) {
        let out = sma(&values, period);
        for (i, v) in out.iter().enumerate() {
            if let Some(v) = v {
                let window = &values[i + 1 - period..=i];
                let lo = window.iter().cloned().fold(f64::INFINITY, f64::min);
                let hi = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                prop_assert!(*v >= lo - 1e-6 && *v <= hi + 1e-6);
            }
        }
    }
}

#[test]
fn flat_series_rsi_is_exactly_100() {
    let out = rsi(&[42.0; 30], 13);
    assert!(out.iter().flatten().all(|&v| v == 100.0));
}
