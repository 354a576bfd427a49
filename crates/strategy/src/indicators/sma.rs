/// Simple moving average: each defined position is the mean of the trailing
/// `period` values. Positions `< period - 1` are `None`.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    // Sum each window directly; a rolling sum drifts on long flat series.
    for (i, window) in values.windows(period).enumerate() {
        out[i + period - 1] = Some(window.iter().sum::<f64>() / period as f64);
    }
    out
}

/// SMA over a partially-defined series (e.g. an RSI line).
///
/// The warm-up prefix of `series` is skipped and the result is realigned,
/// so position `i` averages the `period` defined values ending at `i`.
pub fn sma_of_defined(series: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; series.len()];
    let Some(first) = series.iter().position(Option::is_some) else {
        return out;
    };

    let tail: Vec<f64> = series[first..]
        .iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();

    for (i, v) in sma(&tail, period).into_iter().enumerate() {
        out[first + i] = v.filter(|x| x.is_finite());
    }
    out
}
