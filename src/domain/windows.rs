//! Fixed-size sliding windows over a series, and strategy replay on top of them.

use crate::domain::error::AnalyticsError;
use crate::domain::series::CandleRecord;
use crate::domain::strategy::{Advice, Strategy};
use chrono::NaiveDateTime;

/// Windows of `size` consecutive rows starting at index 0 and advancing by
/// `step`. Every complete window is produced, including the one ending at the
/// last row. A zero `size` or `step` produces nothing.
pub fn sliding_windows<T>(rows: &[T], size: usize, step: usize) -> impl Iterator<Item = &[T]> {
    let count = if size == 0 || step == 0 || rows.len() < size {
        0
    } else {
        (rows.len() - size) / step + 1
    };
    (0..count).map(move |i| &rows[i * step..i * step + size])
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdviceRecord {
    /// Timestamp of the last candle in the window the advice applies to.
    pub timestamp: NaiveDateTime,
    pub advice: Advice,
}

/// Run `strategy` over every window of the candle series.
pub fn replay(
    strategy: &Strategy,
    candles: &[CandleRecord],
    step: usize,
) -> Result<Vec<AdviceRecord>, AnalyticsError> {
    let records = sliding_windows(candles, strategy.window_size(), step)
        .map(|window| {
            let advice = strategy.advice(window)?;
            let timestamp = window[window.len() - 1].timestamp;
            Ok(AdviceRecord { timestamp, advice })
        })
        .collect::<Result<Vec<_>, AnalyticsError>>()?;
    tracing::debug!(
        windows = records.len(),
        window_size = strategy.window_size(),
        step,
        "replayed strategy"
    );
    Ok(records)
}
