//! Backtest result source port trait.

use crate::domain::error::AnalyticsError;
use crate::domain::normalize::BacktestPayload;

/// Where a finished backtest's raw result comes from.
pub trait BacktestSource {
    fn fetch_result(&self) -> Result<BacktestPayload, AnalyticsError>;
}
