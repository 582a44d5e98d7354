use serde::Deserialize;

use crate::error::AppError;

/// What a consumer asks for when opening a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StreamRequest {
    #[serde(default)]
    pub symbol: String,
    pub rsi_period: Option<usize>,
    pub sma_period: Option<usize>,
    pub ema_period: Option<usize>,
}

/// Effective periods after defaults are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Periods {
    pub rsi: usize,
    pub sma: usize,
    pub ema: usize,
}

fn resolve(name: &str, requested: Option<usize>, default: usize) -> Result<usize, AppError> {
    match requested {
        Some(0) => Err(AppError::invalid_period(name, 0)),
        Some(p) => Ok(p),
        None => Ok(default),
    }
}

impl StreamRequest {
    pub fn for_symbol(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            ..Self::default()
        }
    }

    pub fn with_periods(mut self, rsi: usize, sma: usize, ema: usize) -> Self {
        self.rsi_period = Some(rsi);
        self.sma_period = Some(sma);
        self.ema_period = Some(ema);
        self
    }

    /// Each period independently falls back to `default`; an explicit 0 is rejected.
    pub fn periods(&self, default: usize) -> Result<Periods, AppError> {
        Ok(Periods {
            rsi: resolve("RSI", self.rsi_period, default)?,
            sma: resolve("SMA", self.sma_period, default)?,
            ema: resolve("EMA", self.ema_period, default)?,
        })
    }

    /// Lower-cased instrument, or `default` when none was requested.
    ///
    /// Symbols end up in upstream URLs, so only ASCII letters and digits are accepted.
    pub fn resolved_symbol(&self, default: &str) -> Result<String, AppError> {
        let symbol = match self.symbol.trim() {
            "" => default.trim(),
            requested => requested,
        };
        if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::InvalidConfiguration(format!(
                "invalid symbol '{}'",
                symbol
            )));
        }
        Ok(symbol.to_ascii_lowercase())
    }
}
