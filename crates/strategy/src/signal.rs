use serde::Serialize;
use tracing::debug;

use common::{Bias, Entry, Result};

use crate::indicators::{ema, ensure_len, last_value, rsi, sma_of_defined};

/// Bias and entry for one evaluation. Derived fresh every time, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct SignalState {
    pub bias: Option<Bias>,
    pub entry: Entry,
}

/// Two-level signal: an EMA bias on the higher timeframe gates an RSI entry
/// on the lower timeframe.
///
/// While bullish only `ConfirmedBuy` or `Wait` can be emitted; while bearish
/// only `ConfirmedSell` or `Wait`.
#[derive(Debug, Clone)]
pub struct SignalComposer {
    pub bias_ema: usize,
    pub rsi_period: usize,
    pub rsi_smoothing: usize,
}

impl Default for SignalComposer {
    fn default() -> Self {
        Self::new(45, 13, 14)
    }
}

impl SignalComposer {
    pub const RSI_MIDLINE: f64 = 50.0;

    pub fn new(bias_ema: usize, rsi_period: usize, rsi_smoothing: usize) -> Self {
        assert!(bias_ema >= 1, "bias EMA period must be >= 1");
        assert!(rsi_period >= 2, "RSI period must be >= 2");
        assert!(rsi_smoothing >= 1, "RSI smoothing period must be >= 1");
        Self {
            bias_ema,
            rsi_period,
            rsi_smoothing,
        }
    }

    /// `Bullish` when the last close is above the EMA, otherwise `Bearish`.
    pub fn bias(&self, closes: &[f64]) -> Result<Bias> {
        ensure_len(closes.len(), self.bias_ema)?;
        let line = ema(closes, self.bias_ema);
        let (Some(close), Some(ema_last)) = (closes.last().copied(), last_value(&line)) else {
            return Err(common::Error::InsufficientData {
                needed: self.bias_ema,
                available: closes.len(),
            });
        };
        Ok(if close > ema_last { Bias::Bullish } else { Bias::Bearish })
    }

    /// Entry on the lower timeframe, gated by `bias`.
    pub fn entry(&self, bias: Bias, closes: &[f64]) -> Result<Entry> {
        let needed = self.rsi_period + self.rsi_smoothing;
        ensure_len(closes.len(), needed)?;

        let rsi_line = rsi(closes, self.rsi_period);
        let smoothed = sma_of_defined(&rsi_line, self.rsi_smoothing);
        let (Some(r), Some(avg)) = (last_value(&rsi_line), last_value(&smoothed)) else {
            return Err(common::Error::InsufficientData {
                needed,
                available: closes.len(),
            });
        };

        let entry = match bias {
            Bias::Bullish if r < Self::RSI_MIDLINE && r > avg => Entry::ConfirmedBuy,
            Bias::Bearish if r > Self::RSI_MIDLINE && r < avg => Entry::ConfirmedSell,
            _ => Entry::Wait,
        };
        Ok(entry)
    }

    /// Compose both levels; insufficient data degrades to no bias / `Wait`.
    pub fn compose(&self, higher: &[f64], lower: &[f64]) -> SignalState {
        let bias = match self.bias(higher) {
            Ok(b) => b,
            Err(e) => {
                debug!(error = %e, "Bias undefined");
                return SignalState::default();
            }
        };

        let entry = self.entry(bias, lower).unwrap_or_else(|e| {
            debug!(error = %e, "Entry undefined, waiting");
            Entry::Wait
        });

        SignalState {
            bias: Some(bias),
            entry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    fn falling(n: usize) -> Vec<f64> {
        (0..n).map(|i| 200.0 - i as f64).collect()
    }

    #[test]
    fn bias_follows_close_vs_ema() {
        let c = SignalComposer::default();
        assert_eq!(c.bias(&rising(60)).unwrap(), Bias::Bullish);
        assert_eq!(c.bias(&falling(60)).unwrap(), Bias::Bearish);
    }

    #[test]
    fn bias_undefined_below_period() {
        let c = SignalComposer::default();
        assert!(matches!(
            c.bias(&rising(44)),
            Err(common::Error::InsufficientData { needed: 45, available: 44 })
        ));
    }

    #[test]
    fn flat_close_equal_to_ema_is_bearish() {
        let c = SignalComposer::default();
        assert_eq!(c.bias(&[10.0; 45]).unwrap(), Bias::Bearish);
    }

    /// Long decline, then a two-bar bounce: RSI is below 50 but turning up
    /// through its own average.
    fn dip_then_bounce() -> Vec<f64> {
        let mut closes: Vec<f64> = (0..40).map(|i| 200.0 - i as f64 * 2.0).collect();
        let last = *closes.last().unwrap();
        closes.push(last + 1.5);
        closes.push(last + 3.0);
        closes
    }

    /// Long advance, then a two-bar pullback.
    fn rally_then_dip() -> Vec<f64> {
        let mut closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 2.0).collect();
        let last = *closes.last().unwrap();
        closes.push(last - 1.5);
        closes.push(last - 3.0);
        closes
    }

    #[test]
    fn bullish_bias_confirms_buy_on_rsi_turn() {
        let c = SignalComposer::default();
        assert_eq!(c.entry(Bias::Bullish, &dip_then_bounce()).unwrap(), Entry::ConfirmedBuy);
    }

    #[test]
    fn bearish_bias_confirms_sell_on_rsi_turn() {
        let c = SignalComposer::default();
        assert_eq!(c.entry(Bias::Bearish, &rally_then_dip()).unwrap(), Entry::ConfirmedSell);
    }

    #[test]
    fn gating_blocks_opposite_signals() {
        let c = SignalComposer::default();
        // Sell setup while bullish and buy setup while bearish both wait.
        assert_eq!(c.entry(Bias::Bullish, &rally_then_dip()).unwrap(), Entry::Wait);
        assert_eq!(c.entry(Bias::Bearish, &dip_then_bounce()).unwrap(), Entry::Wait);
    }

    #[test]
    fn compose_without_bias_waits() {
        let c = SignalComposer::default();
        let state = c.compose(&rising(10), &dip_then_bounce());
        assert_eq!(state, SignalState { bias: None, entry: Entry::Wait });
    }

    #[test]
    fn compose_with_short_lower_timeframe_waits() {
        let c = SignalComposer::default();
        let state = c.compose(&rising(60), &rising(20));
        assert_eq!(state.bias, Some(Bias::Bullish));
        assert_eq!(state.entry, Entry::Wait);
    }
}
