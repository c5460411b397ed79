//! State and performance calculator over the joined timeline.
//!
//! A single forward pass carries the last trade state, marks the position to
//! market, and tracks running peaks for the market, strategy and
//! cumulative-profit curves.

use crate::domain::error::AnalyticsError;
use crate::domain::join::{JoinedRow, JoinedTable};
use crate::domain::series::{Report, TradeAction};
use chrono::NaiveDateTime;

/// Normalization baselines; both strictly positive and finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub start_balance: f64,
    pub start_price: f64,
}

impl Baseline {
    pub fn new(start_balance: f64, start_price: f64) -> Result<Self, AnalyticsError> {
        check_positive("startBalance", start_balance)?;
        check_positive("startPrice", start_price)?;
        Ok(Self {
            start_balance,
            start_price,
        })
    }

    /// Baseline from a report, falling back to the first row's close when
    /// the report carries no start price yet.
    pub fn from_report(report: &Report, table: &JoinedTable) -> Result<Option<Self>, AnalyticsError> {
        let Some(first) = table.rows.first() else {
            return Ok(None);
        };
        let start_price = report.start_price.unwrap_or(first.candle.close);
        Self::new(report.start_balance, start_price).map(Some)
    }
}

fn check_positive(name: &str, value: f64) -> Result<(), AnalyticsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AnalyticsError::DegenerateBaseline {
            name: name.to_string(),
            value,
        })
    }
}

/// A joined row plus every derived column.
#[derive(Debug, Clone, PartialEq)]
pub struct JointRow {
    pub joined: JoinedRow,
    pub last_action: Option<TradeAction>,
    pub last_amount: Option<f64>,
    pub last_balance: Option<f64>,
    pub profit: f64,
    pub cum_profit: f64,
    pub current_balance: f64,
    pub market_p: f64,
    pub strat_p: f64,
    pub market_max: f64,
    pub strat_max: f64,
    pub profit_max: f64,
    pub market_drawdown: f64,
    pub strat_drawdown: f64,
    pub profit_drawdown: f64,
}

impl JointRow {
    pub fn timestamp(&self) -> NaiveDateTime {
        self.joined.timestamp()
    }

    pub fn close(&self) -> f64 {
        self.joined.candle.close
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointTable {
    pub indicator_columns: Vec<String>,
    pub rows: Vec<JointRow>,
}

impl JointTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Compute every derived column. An empty table is returned as-is without
/// consulting the baselines.
pub fn compute(
    table: JoinedTable,
    report: &Report,
    short_ratio: f64,
) -> Result<JointTable, AnalyticsError> {
    let Some(baseline) = Baseline::from_report(report, &table)? else {
        return Ok(JointTable {
            indicator_columns: table.indicator_columns,
            rows: Vec::new(),
        });
    };
    Ok(compute_with_baseline(table, baseline, short_ratio))
}

pub fn compute_with_baseline(table: JoinedTable, baseline: Baseline, short_ratio: f64) -> JointTable {
    let mut rows = Vec::with_capacity(table.rows.len());

    let mut last_action: Option<TradeAction> = None;
    let mut last_amount: Option<f64> = None;
    let mut last_balance: Option<f64> = None;
    let mut prev_market_p: Option<f64> = None;
    let mut profit_sum = 0.0_f64;
    let mut market_max = f64::NEG_INFINITY;
    let mut strat_max = f64::NEG_INFINITY;
    let mut profit_max = f64::NEG_INFINITY;

    for joined in table.rows {
        if joined.action.is_some() {
            last_action = joined.action;
        }
        if joined.amount.is_some() {
            last_amount = joined.amount;
        }
        if joined.balance.is_some() {
            last_balance = joined.balance;
        }

        let close = joined.candle.close;
        let market_p = close / baseline.start_price;

        let step = prev_market_p.map_or(0.0, |prev| market_p - prev);
        let profit = match last_action {
            Some(TradeAction::Buy) => step * (1.0 - short_ratio),
            Some(TradeAction::Sell) => -step * short_ratio,
            None => 0.0,
        };
        profit_sum += profit;
        let cum_profit = 1.0 + profit_sum;

        let current_balance = match (last_action, last_amount, last_balance) {
            (Some(TradeAction::Sell), _, Some(balance)) => balance,
            (Some(TradeAction::Buy), Some(amount), _) => amount * close,
            _ => baseline.start_balance,
        };
        let strat_p = current_balance / baseline.start_balance;

        market_max = market_max.max(market_p);
        strat_max = strat_max.max(strat_p);
        profit_max = profit_max.max(cum_profit);

        rows.push(JointRow {
            joined,
            last_action,
            last_amount,
            last_balance,
            profit,
            cum_profit,
            current_balance,
            market_p,
            strat_p,
            market_max,
            strat_max,
            profit_max,
            market_drawdown: drawdown(market_p, market_max),
            strat_drawdown: drawdown(strat_p, strat_max),
            profit_drawdown: drawdown(cum_profit, profit_max),
        });
        prev_market_p = Some(market_p);
    }

    tracing::debug!(rows = rows.len(), short_ratio, "computed performance columns");

    JointTable {
        indicator_columns: table.indicator_columns,
        rows,
    }
}

/// Fractional decline from the running peak; zero at a new high or when
/// the peak is not positive.
fn drawdown(value: f64, peak: f64) -> f64 {
    if peak > 0.0 { value / peak - 1.0 } else { 0.0 }
}

/// Headline figures for the console summary.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub rows: usize,
    pub trades: usize,
    pub market_return: f64,
    pub strat_return: f64,
    pub max_market_drawdown: f64,
    pub max_strat_drawdown: f64,
    pub max_profit_drawdown: f64,
}

impl Summary {
    pub fn compute(table: &JointTable) -> Self {
        let last = table.rows.last();
        Summary {
            rows: table.rows.len(),
            trades: table.rows.iter().filter(|r| r.joined.action.is_some()).count(),
            market_return: last.map_or(0.0, |r| r.market_p - 1.0),
            strat_return: last.map_or(0.0, |r| r.strat_p - 1.0),
            max_market_drawdown: worst(&table.rows, |r| r.market_drawdown),
            max_strat_drawdown: worst(&table.rows, |r| r.strat_drawdown),
            max_profit_drawdown: worst(&table.rows, |r| r.profit_drawdown),
        }
    }
}

fn worst(rows: &[JointRow], column: impl Fn(&JointRow) -> f64) -> f64 {
    rows.iter().map(column).fold(0.0_f64, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::CandleRecord;
    use approx::assert_abs_diff_eq;
    use chrono::DateTime;
    use std::collections::BTreeMap;

    fn row(secs: i64, close: f64) -> JoinedRow {
        JoinedRow {
            candle: CandleRecord {
                timestamp: DateTime::from_timestamp(secs, 0).unwrap().naive_utc(),
                open: close,
                high: close,
                low: close,
                close,
                volume: None,
            },
            indicators: BTreeMap::new(),
            action: None,
            amount: None,
            balance: None,
            entry_balance: None,
            exit_balance: None,
        }
    }

    fn with_trade(mut r: JoinedRow, action: TradeAction, amount: f64, balance: f64) -> JoinedRow {
        r.action = Some(action);
        r.amount = Some(amount);
        r.balance = Some(balance);
        r
    }

    fn table(rows: Vec<JoinedRow>) -> JoinedTable {
        JoinedTable {
            indicator_columns: Vec::new(),
            rows,
        }
    }

    fn baseline() -> Baseline {
        Baseline::new(100.0, 100.0).unwrap()
    }

    #[test]
    fn market_curve_without_trades() {
        let t = table(vec![row(0, 100.0), row(60, 110.0), row(120, 90.0)]);
        let out = compute_with_baseline(t, baseline(), 0.0);

        let market_p: Vec<f64> = out.rows.iter().map(|r| r.market_p).collect();
        assert_abs_diff_eq!(market_p[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(market_p[1], 1.1, epsilon = 1e-12);
        assert_abs_diff_eq!(market_p[2], 0.9, epsilon = 1e-12);

        assert_abs_diff_eq!(out.rows[2].market_max, 1.1, epsilon = 1e-12);
        assert_eq!(out.rows[0].market_drawdown, 0.0);
        assert_eq!(out.rows[1].market_drawdown, 0.0);
        assert_abs_diff_eq!(out.rows[2].market_drawdown, 0.9 / 1.1 - 1.0, epsilon = 1e-12);

        for r in &out.rows {
            assert_eq!(r.last_action, None);
            assert_eq!(r.current_balance, 100.0);
            assert_eq!(r.strat_p, 1.0);
            assert_eq!(r.profit, 0.0);
            assert_eq!(r.cum_profit, 1.0);
        }
    }

    #[test]
    fn buy_marks_position_to_close() {
        let t = table(vec![
            row(0, 100.0),
            with_trade(row(60, 110.0), TradeAction::Buy, 1.0, 0.0),
            row(120, 90.0),
        ]);
        let out = compute_with_baseline(t, baseline(), 0.0);

        assert_eq!(out.rows[0].last_action, None);
        assert_eq!(out.rows[1].last_action, Some(TradeAction::Buy));
        assert_abs_diff_eq!(out.rows[1].current_balance, 110.0, epsilon = 1e-12);
        assert_eq!(out.rows[2].last_action, Some(TradeAction::Buy));
        assert_eq!(out.rows[2].last_amount, Some(1.0));
        assert_abs_diff_eq!(out.rows[2].current_balance, 90.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.rows[2].strat_p, 0.9, epsilon = 1e-12);
        assert_abs_diff_eq!(out.rows[2].strat_max, 1.1, epsilon = 1e-12);
    }

    #[test]
    fn sell_holds_balance() {
        let t = table(vec![
            with_trade(row(0, 100.0), TradeAction::Buy, 1.0, 0.0),
            with_trade(row(60, 120.0), TradeAction::Sell, 0.0, 120.0),
            row(120, 80.0),
        ]);
        let out = compute_with_baseline(t, baseline(), 0.0);
        assert_abs_diff_eq!(out.rows[1].current_balance, 120.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.rows[2].current_balance, 120.0, epsilon = 1e-12);
        assert_eq!(out.rows[2].last_balance, Some(120.0));
        assert_eq!(out.rows[2].strat_drawdown, 0.0);
    }

    #[test]
    fn profit_is_scaled_by_short_ratio() {
        let t = table(vec![
            with_trade(row(0, 100.0), TradeAction::Buy, 1.0, 0.0),
            row(60, 110.0),
            with_trade(row(120, 110.0), TradeAction::Sell, 0.0, 110.0),
            row(180, 100.0),
        ]);
        let out = compute_with_baseline(t, baseline(), 0.25);

        assert_eq!(out.rows[0].profit, 0.0);
        // long leg keeps 75% of the +0.1 move
        assert_abs_diff_eq!(out.rows[1].profit, 0.075, epsilon = 1e-12);
        assert_abs_diff_eq!(out.rows[2].profit, 0.0, epsilon = 1e-12);
        // short leg earns 25% of the -0.1 move
        assert_abs_diff_eq!(out.rows[3].profit, 0.025, epsilon = 1e-12);
        assert_abs_diff_eq!(out.rows[3].cum_profit, 1.1, epsilon = 1e-12);
    }

    #[test]
    fn profit_drawdown_tracks_cumulative_curve() {
        let t = table(vec![
            with_trade(row(0, 100.0), TradeAction::Buy, 1.0, 0.0),
            row(60, 120.0),
            row(120, 108.0),
        ]);
        let out = compute_with_baseline(t, baseline(), 0.0);
        assert_abs_diff_eq!(out.rows[1].profit_max, 1.2, epsilon = 1e-12);
        assert_abs_diff_eq!(out.rows[2].cum_profit, 1.08, epsilon = 1e-12);
        assert_abs_diff_eq!(out.rows[2].profit_drawdown, 1.08 / 1.2 - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_start_price_is_degenerate() {
        let err = Baseline::new(100.0, 0.0).unwrap_err();
        assert!(matches!(err, AnalyticsError::DegenerateBaseline { ref name, .. } if name == "startPrice"));
    }

    #[test]
    fn negative_start_balance_is_degenerate() {
        let err = Baseline::new(-5.0, 10.0).unwrap_err();
        assert!(matches!(err, AnalyticsError::DegenerateBaseline { ref name, .. } if name == "startBalance"));
    }

    #[test]
    fn compute_rejects_zero_start_price_from_report() {
        let mut report = Report::new(100.0);
        report.start_price = Some(0.0);
        let err = compute(table(vec![row(0, 0.0)]), &report, 0.0).unwrap_err();
        assert!(matches!(err, AnalyticsError::DegenerateBaseline { .. }));
    }

    #[test]
    fn compute_on_empty_table_skips_baseline_checks() {
        let report = Report::new(0.0);
        let out = compute(table(Vec::new()), &report, 0.0).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn compute_falls_back_to_first_close() {
        let report = Report::new(50.0);
        let out = compute(table(vec![row(0, 20.0), row(60, 30.0)]), &report, 0.0).unwrap();
        assert_abs_diff_eq!(out.rows[1].market_p, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn summary_reports_worst_drawdowns() {
        let t = table(vec![
            row(0, 100.0),
            with_trade(row(60, 110.0), TradeAction::Buy, 1.0, 0.0),
            row(120, 88.0),
            row(180, 99.0),
        ]);
        let out = compute_with_baseline(t, baseline(), 0.0);
        let summary = Summary::compute(&out);
        assert_eq!(summary.rows, 4);
        assert_eq!(summary.trades, 1);
        assert_abs_diff_eq!(summary.market_return, -0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.max_market_drawdown, 0.88 / 1.1 - 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.max_strat_drawdown, 0.88 / 1.1 - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn summary_of_empty_table_is_flat() {
        let summary = Summary::compute(&JointTable::default());
        assert_eq!(summary.rows, 0);
        assert_eq!(summary.market_return, 0.0);
        assert_eq!(summary.max_strat_drawdown, 0.0);
    }
}
