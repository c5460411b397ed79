//! Calendar-month aggregation of the joint table.

use crate::domain::performance::{JointRow, JointTable};
use chrono::{Datelike, NaiveDate};

/// First and last values of one calendar month, plus their fractional changes.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyProfitRow {
    pub year: i32,
    pub month: u32,
    pub rows: usize,
    pub first_close: f64,
    pub last_close: f64,
    pub first_balance: f64,
    pub last_balance: f64,
    pub first_cum_profit: f64,
    pub last_cum_profit: f64,
    /// `None` when the month opened at a zero close.
    pub market_profit: Option<f64>,
    /// `None` when the month opened at a zero balance.
    pub strat_profit: Option<f64>,
    pub cum_profit_change: Option<f64>,
}

impl MonthlyProfitRow {
    fn open(first: &JointRow) -> Self {
        let date = first.timestamp().date();
        Self {
            year: date.year(),
            month: date.month(),
            rows: 0,
            first_close: first.close(),
            last_close: first.close(),
            first_balance: first.current_balance,
            last_balance: first.current_balance,
            first_cum_profit: first.cum_profit,
            last_cum_profit: first.cum_profit,
            market_profit: None,
            strat_profit: None,
            cum_profit_change: None,
        }
    }

    fn extend(&mut self, row: &JointRow) {
        self.rows += 1;
        self.last_close = row.close();
        self.last_balance = row.current_balance;
        self.last_cum_profit = row.cum_profit;
    }

    fn close_out(mut self) -> Self {
        self.market_profit = fractional_change(self.first_close, self.last_close);
        self.strat_profit = fractional_change(self.first_balance, self.last_balance);
        self.cum_profit_change = fractional_change(self.first_cum_profit, self.last_cum_profit);
        self
    }

    fn key(&self) -> (i32, u32) {
        (self.year, self.month)
    }

    /// Last calendar day of the month, the label used for the bucket.
    pub fn month_end(&self) -> Option<NaiveDate> {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1).and_then(|d| d.pred_opt())
    }
}

/// `(last - first) / first`. An unchanged value is zero change even when
/// it is zero; any other change from zero is undefined.
pub fn fractional_change(first: f64, last: f64) -> Option<f64> {
    if first == last {
        Some(0.0)
    } else if first == 0.0 {
        None
    } else {
        Some((last - first) / first)
    }
}

/// Group rows by the calendar month of their timestamp.
///
/// Rows must already be ascending by timestamp, which the joint table
/// guarantees. Months without rows are absent from the output.
pub fn aggregate(table: &JointTable) -> Vec<MonthlyProfitRow> {
    let mut months: Vec<MonthlyProfitRow> = Vec::new();
    let mut current: Option<MonthlyProfitRow> = None;

    for row in &table.rows {
        let date = row.timestamp().date();
        let key = (date.year(), date.month());
        let mut bucket = match current.take() {
            Some(bucket) if bucket.key() == key => bucket,
            Some(finished) => {
                months.push(finished.close_out());
                MonthlyProfitRow::open(row)
            }
            None => MonthlyProfitRow::open(row),
        };
        bucket.extend(row);
        current = Some(bucket);
    }
    if let Some(last) = current {
        months.push(last.close_out());
    }

    tracing::debug!(months = months.len(), "aggregated monthly profits");
    months
}
