//! JSON file backtest source adapter.

use crate::domain::error::AnalyticsError;
use crate::domain::normalize::BacktestPayload;
use crate::ports::source_port::BacktestSource;
use std::fs::File;
use std::io::BufReader;
use serde_json::Value;
use std::path::PathBuf;

/// Reads a saved backtest engine response body from disk.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BacktestSource for JsonFileSource {
    fn fetch_result(&self) -> Result<BacktestPayload, AnalyticsError> {
        let file = File::open(&self.path)?;
        let body: Value = serde_json::from_reader(BufReader::new(file))?;
        let payload = BacktestPayload::from_value(body)?;
        tracing::debug!(
            path = %self.path.display(),
            candles = payload.strat_candles.len(),
            trades = payload.trades.len(),
            "loaded backtest result"
        );
        Ok(payload)
    }
}
