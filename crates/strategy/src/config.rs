use serde::{Deserialize, Serialize};

use common::{Error, Instrument, Result};

/// Top-level universe file (TOML).
///
/// Example `config/universe.toml`:
/// ```toml
/// [params]
/// bias_ema = 45
///
/// [[instrument]]
/// symbol = "BTCUSDT"
/// asset_class = "crypto"
///
/// [[instrument]]
/// symbol = "EURUSD"
/// asset_class = "forex"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UniverseFile {
    #[serde(rename = "instrument", default)]
    pub instruments: Vec<Instrument>,
    #[serde(default)]
    pub params: EngineParams,
}

/// Indicator periods and lookbacks shared by every symbol in a scan.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineParams {
    pub fast_sma: usize,
    pub slow_sma: usize,
    pub bias_ema: usize,
    pub rsi_period: usize,
    pub rsi_smoothing: usize,
    pub daily_lookback: usize,
    pub hourly_lookback: usize,
    pub monthly_lookback: usize,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            fast_sma: 50,
            slow_sma: 200,
            bias_ema: 45,
            rsi_period: 13,
            rsi_smoothing: 14,
            daily_lookback: 365,
            hourly_lookback: 365,
            monthly_lookback: 60,
        }
    }
}

impl EngineParams {
    /// Reject periods the indicators cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.fast_sma == 0 || self.fast_sma >= self.slow_sma {
            return Err(Error::Config(format!(
                "fast_sma ({}) must be in 1..slow_sma ({})",
                self.fast_sma, self.slow_sma
            )));
        }
        if self.bias_ema == 0 || self.rsi_smoothing == 0 {
            return Err(Error::Config("bias_ema and rsi_smoothing must be >= 1".into()));
        }
        if self.rsi_period < 2 {
            return Err(Error::Config(format!("rsi_period ({}) must be >= 2", self.rsi_period)));
        }
        Ok(())
    }
}

impl UniverseFile {
    /// Load from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse universe config at '{path}': {e}")))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        file.params.validate()?;
        Ok(file)
    }
}
