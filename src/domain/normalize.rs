//! Series normalizer: raw engine JSON records into canonical typed records.
//!
//! Records are validated field by field so a failure can name both the
//! missing field and the record's position in its series. Input order is
//! preserved; sorting is the joiner's job.

use crate::domain::error::AnalyticsError;
use crate::domain::series::{
    CandleRecord, INDICATOR_PREFIX, IndicatorSnapshot, NormalizedSeries, Report, RoundTrip,
    TradeAction, TradeEvent,
};
use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const CANDLES: &str = "stratCandles";
pub const INDICATORS: &str = "stratUpdates";
pub const TRADES: &str = "trades";
pub const ROUNDTRIPS: &str = "roundtrips";
pub const REPORT: &str = "performanceReport";
pub const PAYLOAD: &str = "payload";

/// The backtest engine's response body, still untyped per record.
#[derive(Debug, Clone, Default)]
pub struct BacktestPayload {
    pub roundtrips: Vec<Value>,
    pub strat_candles: Vec<Value>,
    pub strat_updates: Vec<Value>,
    pub trades: Vec<Value>,
    pub performance_report: Map<String, Value>,
}

impl BacktestPayload {
    /// Split a response body into its series. Candles and the report are
    /// required; the other series may be absent or null.
    pub fn from_value(value: Value) -> Result<Self, AnalyticsError> {
        let Value::Object(mut body) = value else {
            return Err(AnalyticsError::malformed(PAYLOAD, 0, "body", "is not an object"));
        };
        let performance_report = match body.remove(REPORT) {
            Some(Value::Object(map)) => map,
            Some(Value::Null) | None => {
                return Err(AnalyticsError::malformed(PAYLOAD, 0, REPORT, "is missing"));
            }
            Some(_) => {
                return Err(AnalyticsError::malformed(PAYLOAD, 0, REPORT, "is not an object"));
            }
        };
        Ok(Self {
            strat_candles: take_series(&mut body, CANDLES, true)?,
            strat_updates: take_series(&mut body, INDICATORS, false)?,
            trades: take_series(&mut body, TRADES, false)?,
            roundtrips: take_series(&mut body, ROUNDTRIPS, false)?,
            performance_report,
        })
    }
}

fn take_series(
    body: &mut Map<String, Value>,
    name: &str,
    required: bool,
) -> Result<Vec<Value>, AnalyticsError> {
    match body.remove(name) {
        Some(Value::Array(records)) => Ok(records),
        Some(Value::Null) | None if !required => Ok(Vec::new()),
        Some(Value::Null) | None => Err(AnalyticsError::malformed(PAYLOAD, 0, name, "is missing")),
        Some(_) => Err(AnalyticsError::malformed(PAYLOAD, 0, name, "is not an array")),
    }
}

/// Normalize every series of a payload plus its report.
pub fn normalize(payload: &BacktestPayload) -> Result<(NormalizedSeries, Report), AnalyticsError> {
    let series = NormalizedSeries {
        candles: normalize_candles(&payload.strat_candles)?,
        indicators: normalize_indicators(&payload.strat_updates)?,
        trades: normalize_trades(&payload.trades)?,
        roundtrips: normalize_roundtrips(&payload.roundtrips)?,
    };
    let report = normalize_report(&payload.performance_report)?;
    tracing::debug!(
        candles = series.candles.len(),
        indicators = series.indicators.len(),
        trades = series.trades.len(),
        roundtrips = series.roundtrips.len(),
        "normalized backtest series"
    );
    Ok((series, report))
}

pub fn normalize_candles(records: &[Value]) -> Result<Vec<CandleRecord>, AnalyticsError> {
    records
        .iter()
        .enumerate()
        .map(|(position, value)| {
            let record = as_record(value, CANDLES, position)?;
            Ok(CandleRecord {
                timestamp: timestamp_field(record, CANDLES, position, "start")?,
                open: number_field(record, CANDLES, position, "open")?,
                high: number_field(record, CANDLES, position, "high")?,
                low: number_field(record, CANDLES, position, "low")?,
                close: number_field(record, CANDLES, position, "close")?,
                volume: optional_number_field(record, CANDLES, position, "volume")?,
            })
        })
        .collect()
}

pub fn normalize_indicators(records: &[Value]) -> Result<Vec<IndicatorSnapshot>, AnalyticsError> {
    records
        .iter()
        .enumerate()
        .map(|(position, value)| {
            let record = as_record(value, INDICATORS, position)?;
            let timestamp = timestamp_field(record, INDICATORS, position, "date")?;
            let indicators = match record.get("indicators") {
                Some(Value::Object(map)) => map,
                Some(_) => {
                    return Err(AnalyticsError::malformed(
                        INDICATORS,
                        position,
                        "indicators",
                        "is not an object",
                    ));
                }
                None => {
                    return Err(AnalyticsError::malformed(
                        INDICATORS,
                        position,
                        "indicators",
                        "is missing",
                    ));
                }
            };
            let mut values = BTreeMap::new();
            flatten_indicators(indicators, INDICATOR_PREFIX, position, &mut values)?;
            Ok(IndicatorSnapshot { timestamp, values })
        })
        .collect()
}

/// Nested indicator objects become `parent_child` columns. Null values are
/// indicators still warming up and are left absent.
fn flatten_indicators(
    map: &Map<String, Value>,
    prefix: &str,
    position: usize,
    out: &mut BTreeMap<String, f64>,
) -> Result<(), AnalyticsError> {
    for (name, value) in map {
        let column = format!("{prefix}{name}");
        match value {
            Value::Null => {}
            Value::Number(n) => {
                let v = n.as_f64().ok_or_else(|| {
                    AnalyticsError::malformed(
                        INDICATORS,
                        position,
                        &column,
                        "is not representable as f64",
                    )
                })?;
                if out.insert(column.clone(), v).is_some() {
                    return Err(AnalyticsError::malformed(
                        INDICATORS,
                        position,
                        &column,
                        "collides with another indicator column",
                    ));
                }
            }
            Value::Object(inner) => {
                flatten_indicators(inner, &format!("{column}_"), position, out)?;
            }
            _ => {
                return Err(AnalyticsError::malformed(
                    INDICATORS,
                    position,
                    &column,
                    "is not a number",
                ));
            }
        }
    }
    Ok(())
}

pub fn normalize_trades(records: &[Value]) -> Result<Vec<TradeEvent>, AnalyticsError> {
    records
        .iter()
        .enumerate()
        .map(|(position, value)| {
            let record = as_record(value, TRADES, position)?;
            let action = match record.get("action") {
                Some(Value::String(s)) => TradeAction::parse(s).ok_or_else(|| {
                    AnalyticsError::malformed(
                        TRADES,
                        position,
                        "action",
                        format!("has unknown value `{s}`"),
                    )
                })?,
                Some(_) => {
                    return Err(AnalyticsError::malformed(
                        TRADES,
                        position,
                        "action",
                        "is not a string",
                    ));
                }
                None => {
                    return Err(AnalyticsError::malformed(
                        TRADES, position, "action", "is missing",
                    ));
                }
            };
            Ok(TradeEvent {
                timestamp: timestamp_field(record, TRADES, position, "date")?,
                action,
                amount: number_field(record, TRADES, position, "amount")?,
                balance: number_field(record, TRADES, position, "balance")?,
            })
        })
        .collect()
}

pub fn normalize_roundtrips(records: &[Value]) -> Result<Vec<RoundTrip>, AnalyticsError> {
    records
        .iter()
        .enumerate()
        .map(|(position, value)| {
            let record = as_record(value, ROUNDTRIPS, position)?;
            Ok(RoundTrip {
                entry_timestamp: timestamp_field(record, ROUNDTRIPS, position, "entryAt")?,
                entry_balance: number_field(record, ROUNDTRIPS, position, "entryBalance")?,
                exit_timestamp: timestamp_field(record, ROUNDTRIPS, position, "exitAt")?,
                exit_balance: number_field(record, ROUNDTRIPS, position, "exitBalance")?,
            })
        })
        .collect()
}

/// `startBalance` is required; every other report key is carried through.
pub fn normalize_report(map: &Map<String, Value>) -> Result<Report, AnalyticsError> {
    let start_balance = number_field(map, REPORT, 0, "startBalance")?;
    let extra = map
        .iter()
        .filter(|(k, _)| k.as_str() != "startBalance" && k.as_str() != "startPrice")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Ok(Report {
        start_balance,
        start_price: None,
        extra,
    })
}

/// Epoch seconds (integral or fractional) to a naive UTC timestamp.
pub fn epoch_seconds_to_timestamp(seconds: f64) -> Option<NaiveDateTime> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    let (whole, nanos) = if nanos >= 1_000_000_000 {
        (whole + 1.0, 0)
    } else {
        (whole, nanos)
    };
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp(whole as i64, nanos).map(|dt| dt.naive_utc())
}

fn as_record<'a>(
    value: &'a Value,
    series: &str,
    position: usize,
) -> Result<&'a Map<String, Value>, AnalyticsError> {
    value
        .as_object()
        .ok_or_else(|| AnalyticsError::malformed(series, position, "<record>", "is not an object"))
}

fn number_field(
    record: &Map<String, Value>,
    series: &str,
    position: usize,
    field: &str,
) -> Result<f64, AnalyticsError> {
    optional_number_field(record, series, position, field)?
        .ok_or_else(|| AnalyticsError::malformed(series, position, field, "is missing"))
}

fn optional_number_field(
    record: &Map<String, Value>,
    series: &str,
    position: usize,
    field: &str,
) -> Result<Option<f64>, AnalyticsError> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| AnalyticsError::malformed(series, position, field, "is out of range")),
        Some(_) => Err(AnalyticsError::malformed(
            series,
            position,
            field,
            "is not a number",
        )),
    }
}

fn timestamp_field(
    record: &Map<String, Value>,
    series: &str,
    position: usize,
    field: &str,
) -> Result<NaiveDateTime, AnalyticsError> {
    if let Some(secs) = record.get(field).and_then(Value::as_i64) {
        return DateTime::from_timestamp(secs, 0)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| {
                AnalyticsError::malformed(series, position, field, "is not a valid epoch time")
            });
    }
    let secs = number_field(record, series, position, field)?;
    epoch_seconds_to_timestamp(secs).ok_or_else(|| {
        AnalyticsError::malformed(series, position, field, "is not a valid epoch time")
    })
}
