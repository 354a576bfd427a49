//! Stateless indicator functions over a price sequence (oldest first).
//!
//! Every function returns a sequence of the same length as its input.
//! Positions inside the warm-up window are `None`.

pub mod ema;
pub mod rsi;
pub mod sma;

pub use ema::ema;
pub use rsi::rsi;
pub use sma::{sma, sma_of_defined};

use common::{Error, Result};

/// Fail with `InsufficientData` when fewer than `needed` values are available.
pub fn ensure_len(available: usize, needed: usize) -> Result<()> {
    if available < needed {
        return Err(Error::InsufficientData { needed, available });
    }
    Ok(())
}

/// Value at the final position, if it is defined.
pub fn last_value(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}
