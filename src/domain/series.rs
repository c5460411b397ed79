//! Canonical time-indexed records produced from raw backtest output.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Prefix applied to every flattened indicator column.
pub const INDICATOR_PREFIX: &str = "ind_";

#[derive(Debug, Clone, PartialEq)]
pub struct CandleRecord {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Absent when the engine was configured to export prices only.
    pub volume: Option<f64>,
}

impl CandleRecord {
    /// Sum of the OHLC values plus volume when present.
    pub fn value_sum(&self) -> f64 {
        self.open + self.high + self.low + self.close + self.volume.unwrap_or(0.0)
    }
}

/// Indicator values at one timestamp, keyed by prefixed column name.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub timestamp: NaiveDateTime,
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(TradeAction::Buy),
            "sell" => Some(TradeAction::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeEvent {
    pub timestamp: NaiveDateTime,
    pub action: TradeAction,
    pub amount: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundTrip {
    pub entry_timestamp: NaiveDateTime,
    pub entry_balance: f64,
    pub exit_timestamp: NaiveDateTime,
    pub exit_balance: f64,
}

/// Run-level scalars reported by the backtest engine.
///
/// Fields other than `startBalance` are carried through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub start_balance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_price: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Report {
    pub fn new(start_balance: f64) -> Self {
        Self {
            start_balance,
            start_price: None,
            extra: BTreeMap::new(),
        }
    }
}

/// The four normalized series of one backtest run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedSeries {
    pub candles: Vec<CandleRecord>,
    pub indicators: Vec<IndicatorSnapshot>,
    pub trades: Vec<TradeEvent>,
    pub roundtrips: Vec<RoundTrip>,
}
