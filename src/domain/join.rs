//! Temporal joiner: candle backbone plus sparse events, keyed on exact timestamps.

use crate::domain::error::AnalyticsError;
use crate::domain::normalize::{CANDLES, INDICATORS, TRADES};
use crate::domain::series::{CandleRecord, NormalizedSeries, TradeAction};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub const ROUNDTRIP_ENTRIES: &str = "roundtrips.entryAt";
pub const ROUNDTRIP_EXITS: &str = "roundtrips.exitAt";

/// One candle with whatever sparse events share its timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub candle: CandleRecord,
    pub indicators: BTreeMap<String, f64>,
    pub action: Option<TradeAction>,
    pub amount: Option<f64>,
    pub balance: Option<f64>,
    pub entry_balance: Option<f64>,
    pub exit_balance: Option<f64>,
}

impl JoinedRow {
    fn from_candle(candle: &CandleRecord) -> Self {
        Self {
            candle: candle.clone(),
            indicators: BTreeMap::new(),
            action: None,
            amount: None,
            balance: None,
            entry_balance: None,
            exit_balance: None,
        }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.candle.timestamp
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinedTable {
    /// Every indicator column seen in the snapshots, sorted by name.
    pub indicator_columns: Vec<String>,
    pub rows: Vec<JoinedRow>,
}

impl JoinedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Left-join every sparse series onto the candle timeline.
///
/// The output has exactly one row per candle, ascending by timestamp.
pub fn join(series: &NormalizedSeries) -> Result<JoinedTable, AnalyticsError> {
    let candles = sort_unique(&series.candles, |c| c.timestamp, CANDLES)?;

    let indicators = index_unique(&series.indicators, |s| s.timestamp, INDICATORS)?;
    let trades = index_unique(&series.trades, |t| t.timestamp, TRADES)?;
    let entries = index_unique(&series.roundtrips, |r| r.entry_timestamp, ROUNDTRIP_ENTRIES)?;
    let exits = index_unique(&series.roundtrips, |r| r.exit_timestamp, ROUNDTRIP_EXITS)?;

    let indicator_columns: Vec<String> = series
        .indicators
        .iter()
        .flat_map(|s| s.values.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let rows: Vec<JoinedRow> = candles
        .iter()
        .map(|candle| {
            let mut row = JoinedRow::from_candle(candle);
            let ts = candle.timestamp;
            if let Some(snapshot) = indicators.get(&ts) {
                row.indicators = snapshot.values.clone();
            }
            if let Some(trade) = trades.get(&ts) {
                row.action = Some(trade.action);
                row.amount = Some(trade.amount);
                row.balance = Some(trade.balance);
            }
            row.entry_balance = entries.get(&ts).map(|r| r.entry_balance);
            row.exit_balance = exits.get(&ts).map(|r| r.exit_balance);
            row
        })
        .collect();

    let backbone: BTreeSet<NaiveDateTime> = rows.iter().map(JoinedRow::timestamp).collect();
    warn_unmatched(INDICATORS, indicators.keys(), &backbone);
    warn_unmatched(TRADES, trades.keys(), &backbone);
    warn_unmatched(ROUNDTRIP_ENTRIES, entries.keys(), &backbone);
    warn_unmatched(ROUNDTRIP_EXITS, exits.keys(), &backbone);

    tracing::debug!(
        rows = rows.len(),
        indicator_columns = indicator_columns.len(),
        "joined series onto candle timeline"
    );

    Ok(JoinedTable {
        indicator_columns,
        rows,
    })
}

/// Candles ascending by timestamp, rejecting duplicates.
pub fn sort_candles(candles: &[CandleRecord]) -> Result<Vec<CandleRecord>, AnalyticsError> {
    Ok(sort_unique(candles, |c| c.timestamp, CANDLES)?
        .into_iter()
        .cloned()
        .collect())
}

/// Stable ascending sort by key, rejecting any repeated key.
fn sort_unique<'a, T, F>(
    records: &'a [T],
    key: F,
    series: &str,
) -> Result<Vec<&'a T>, AnalyticsError>
where
    F: Fn(&T) -> NaiveDateTime,
{
    let mut sorted: Vec<&T> = records.iter().collect();
    sorted.sort_by_key(|r| key(*r));
    if let Some(pair) = sorted.windows(2).find(|w| key(w[0]) == key(w[1])) {
        return Err(AnalyticsError::DuplicateTimestamp {
            series: series.to_string(),
            timestamp: key(pair[0]),
        });
    }
    Ok(sorted)
}

fn index_unique<'a, T, F>(
    records: &'a [T],
    key: F,
    series: &str,
) -> Result<HashMap<NaiveDateTime, &'a T>, AnalyticsError>
where
    F: Fn(&T) -> NaiveDateTime,
{
    let sorted = sort_unique(records, &key, series)?;
    Ok(sorted.into_iter().map(|r| (key(r), r)).collect())
}

fn warn_unmatched<'a>(
    series: &str,
    keys: impl Iterator<Item = &'a NaiveDateTime>,
    backbone: &BTreeSet<NaiveDateTime>,
) {
    let unmatched = keys.filter(|ts| !backbone.contains(*ts)).count();
    if unmatched > 0 {
        tracing::warn!(
            series,
            unmatched,
            "events without a matching candle were dropped by the join"
        );
    }
}
