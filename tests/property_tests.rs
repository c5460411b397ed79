//! Property tests for joint-table invariants.
//!
//! Uses proptest to verify:
//! 1. Row count: one joint row per candle
//! 2. Chronology: rows strictly ascending by timestamp
//! 3. Forward fill: lastAction is the most recent action, never a later one
//! 4. Running maxima: non-decreasing and never below the current value
//! 5. Drawdown bound: market and strategy drawdowns never positive
//! 6. Single-row months: zero market and strategy profit

mod common;

use common::*;
use gekkostat::domain::analysis::{Analysis, AnalysisConfig, analyze};
use gekkostat::domain::normalize::BacktestPayload;
use gekkostat::domain::series::TradeAction;
use proptest::prelude::*;
use serde_json::Value;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_close() -> impl Strategy<Value = f64> {
    (1.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

/// Distinct minute offsets, shuffled so the joiner has to sort them.
fn arb_minutes() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(0..500_000i64, 1..60)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

type TradeSpec = (i64, bool, f64, f64);

/// Candles plus trades on a random subset of candle timestamps. Sells may
/// leave the strategy with a zero balance.
fn arb_backtest() -> impl Strategy<Value = (Vec<(i64, f64)>, Vec<TradeSpec>)> {
    arb_minutes()
        .prop_flat_map(|minutes| {
            let n = minutes.len();
            (
                Just(minutes),
                prop::collection::vec(arb_close(), n),
                prop::collection::vec(
                    prop::option::weighted(
                        0.3,
                        (any::<bool>(), 0.1..5.0_f64, prop_oneof![Just(0.0), Just(100.0)]),
                    ),
                    n,
                ),
            )
        })
        .prop_map(|(minutes, closes, events)| {
            let candles: Vec<(i64, f64)> = minutes
                .iter()
                .map(|m| m * 60)
                .zip(closes)
                .collect();
            let trades = candles
                .iter()
                .zip(events)
                .filter_map(|(&(t, _), e)| e.map(|(buy, amount, balance)| (t, buy, amount, balance)))
                .collect();
            (candles, trades)
        })
}

fn run(
    candles: &[(i64, f64)],
    trades: &[TradeSpec],
    short_ratio: f64,
) -> Analysis {
    let candles: Vec<Value> = candles.iter().map(|&(t, c)| candle(t, c)).collect();
    let trades: Vec<Value> = trades
        .iter()
        .map(|&(t, buy, amount, balance)| {
            trade(t, if buy { "buy" } else { "sell" }, amount, balance)
        })
        .collect();
    let p: BacktestPayload = payload(candles, trades, 1_000.0);
    analyze(&p, &AnalysisConfig { short_ratio }).unwrap()
}

proptest! {
    #[test]
    fn one_row_per_candle(
        (candles, trades) in arb_backtest(),
        short_ratio in 0.0..=1.0_f64,
    ) {
        let analysis = run(&candles, &trades, short_ratio);
        prop_assert_eq!(analysis.table.len(), candles.len());
    }

    #[test]
    fn rows_are_strictly_ascending((candles, trades) in arb_backtest()) {
        let analysis = run(&candles, &trades, 0.0);
        for pair in analysis.table.rows.windows(2) {
            prop_assert!(pair[0].timestamp() < pair[1].timestamp());
        }
    }

    #[test]
    fn last_action_never_looks_ahead((candles, trades) in arb_backtest()) {
        let analysis = run(&candles, &trades, 0.0);
        let mut expected: Option<TradeAction> = None;
        for row in &analysis.table.rows {
            if let Some(action) = row.joined.action {
                expected = Some(action);
            }
            prop_assert_eq!(row.last_action, expected);
        }
    }

    #[test]
    fn running_maxima_are_monotone((candles, trades) in arb_backtest()) {
        let analysis = run(&candles, &trades, 0.0);
        let rows = &analysis.table.rows;
        for row in rows {
            prop_assert!(row.market_max >= row.market_p);
            prop_assert!(row.strat_max >= row.strat_p);
        }
        for pair in rows.windows(2) {
            prop_assert!(pair[1].market_max >= pair[0].market_max);
            prop_assert!(pair[1].strat_max >= pair[0].strat_max);
        }
    }

    #[test]
    fn drawdowns_are_never_positive(
        (candles, trades) in arb_backtest(),
        short_ratio in 0.0..=1.0_f64,
    ) {
        let analysis = run(&candles, &trades, short_ratio);
        for row in &analysis.table.rows {
            prop_assert!(row.market_drawdown <= 0.0);
            prop_assert!(row.strat_drawdown <= 0.0);
        }
    }

    #[test]
    fn single_row_months_have_zero_profit((candles, trades) in arb_backtest()) {
        let analysis = run(&candles, &trades, 0.0);
        for month in analysis.monthly.iter().filter(|m| m.rows == 1) {
            prop_assert_eq!(month.market_profit, Some(0.0));
            prop_assert_eq!(month.strat_profit, Some(0.0));
        }
    }
}
