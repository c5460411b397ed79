#![allow(dead_code)]

use gekkostat::domain::analysis::Analysis;
use gekkostat::domain::error::AnalyticsError;
use gekkostat::domain::normalize::BacktestPayload;
use gekkostat::ports::report_port::ReportSink;
use gekkostat::ports::source_port::BacktestSource;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// Source that hands out a fixed payload, or fails with malformed input when
/// the body lacks a required series.
pub struct MockSource {
    pub body: Value,
}

impl MockSource {
    pub fn new(body: Value) -> Self {
        Self { body }
    }
}

impl BacktestSource for MockSource {
    fn fetch_result(&self) -> Result<BacktestPayload, AnalyticsError> {
        BacktestPayload::from_value(self.body.clone())
    }
}

/// Sink that records what it was asked to write.
#[derive(Default)]
pub struct RecordingSink {
    pub written: RefCell<Vec<(PathBuf, usize, usize)>>,
}

impl ReportSink for RecordingSink {
    fn write(&self, analysis: &Analysis, output_dir: &Path) -> Result<(), AnalyticsError> {
        self.written.borrow_mut().push((
            output_dir.to_path_buf(),
            analysis.table.len(),
            analysis.monthly.len(),
        ));
        Ok(())
    }
}

pub fn candle(start: i64, close: f64) -> Value {
    json!({
        "start": start,
        "open": close,
        "high": close,
        "low": close,
        "close": close,
        "volume": 1.0
    })
}

pub fn trade(date: i64, action: &str, amount: f64, balance: f64) -> Value {
    json!({"date": date, "action": action, "amount": amount, "balance": balance})
}

pub fn indicator(date: i64, indicators: Value) -> Value {
    json!({"date": date, "indicators": indicators})
}

pub fn roundtrip(entry_at: i64, entry_balance: f64, exit_at: i64, exit_balance: f64) -> Value {
    json!({
        "entryAt": entry_at,
        "entryBalance": entry_balance,
        "exitAt": exit_at,
        "exitBalance": exit_balance
    })
}

/// Three one-minute candles closing at 100, 110 and 90.
pub fn three_candles() -> Vec<Value> {
    vec![candle(0, 100.0), candle(60, 110.0), candle(120, 90.0)]
}

pub fn body(candles: Vec<Value>, trades: Vec<Value>, start_balance: f64) -> Value {
    json!({
        "stratCandles": candles,
        "trades": trades,
        "performanceReport": {"startBalance": start_balance}
    })
}

pub fn payload(candles: Vec<Value>, trades: Vec<Value>, start_balance: f64) -> BacktestPayload {
    BacktestPayload::from_value(body(candles, trades, start_balance)).unwrap()
}

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
