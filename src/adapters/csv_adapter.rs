//! CSV report adapter implementing ReportSink.
//!
//! Writes the joint table and the monthly table as CSV, and the run's report
//! scalars as JSON. Absent values are written as empty cells.

use crate::domain::analysis::Analysis;
use crate::domain::error::AnalyticsError;
use crate::domain::monthly::MonthlyProfitRow;
use crate::domain::performance::{JointRow, JointTable};
use crate::ports::report_port::ReportSink;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

pub const JOINT_FILE: &str = "joint.csv";
pub const MONTHLY_FILE: &str = "monthly.csv";
pub const REPORT_FILE: &str = "report.json";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const CANDLE_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

const EVENT_COLUMNS: [&str; 5] = ["action", "amount", "balance", "entryBalance", "exitBalance"];

const DERIVED_COLUMNS: [&str; 14] = [
    "lastAction",
    "lastAmount",
    "lastBalance",
    "profit",
    "cumProfit",
    "currentBalance",
    "marketP",
    "stratP",
    "marketMax",
    "stratMax",
    "profitMax",
    "marketDrawdown",
    "stratDrawdown",
    "profitDrawdown",
];

const MONTHLY_COLUMNS: [&str; 13] = [
    "monthEnd",
    "year",
    "month",
    "rows",
    "firstClose",
    "lastClose",
    "firstBalance",
    "lastBalance",
    "firstCumProfit",
    "lastCumProfit",
    "marketProfit",
    "stratProfit",
    "cumProfitChange",
];

pub struct CsvReportAdapter {
    include_indicators: bool,
}

impl CsvReportAdapter {
    pub fn new(include_indicators: bool) -> Self {
        Self { include_indicators }
    }

    fn write_joint(&self, table: &JointTable, path: &Path) -> Result<(), AnalyticsError> {
        let indicator_columns: &[String] = if self.include_indicators {
            &table.indicator_columns
        } else {
            &[]
        };

        let mut writer = csv::Writer::from_path(path)?;
        let header: Vec<&str> = CANDLE_COLUMNS
            .iter()
            .copied()
            .chain(indicator_columns.iter().map(String::as_str))
            .chain(EVENT_COLUMNS.iter().copied())
            .chain(DERIVED_COLUMNS.iter().copied())
            .collect();
        writer.write_record(&header)?;

        for row in &table.rows {
            writer.write_record(joint_record(row, indicator_columns))?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_monthly(&self, monthly: &[MonthlyProfitRow], path: &Path) -> Result<(), AnalyticsError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(MONTHLY_COLUMNS)?;
        for row in monthly {
            writer.write_record(monthly_record(row))?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl ReportSink for CsvReportAdapter {
    fn write(&self, analysis: &Analysis, output_dir: &Path) -> Result<(), AnalyticsError> {
        fs::create_dir_all(output_dir)?;

        self.write_joint(&analysis.table, &output_dir.join(JOINT_FILE))?;
        self.write_monthly(&analysis.monthly, &output_dir.join(MONTHLY_FILE))?;

        let mut report = BufWriter::new(File::create(output_dir.join(REPORT_FILE))?);
        serde_json::to_writer_pretty(&mut report, &analysis.report)?;
        report.write_all(b"\n")?;
        report.flush()?;

        tracing::info!(
            dir = %output_dir.display(),
            rows = analysis.table.len(),
            months = analysis.monthly.len(),
            "report written"
        );
        Ok(())
    }
}

fn cell(value: f64) -> String {
    value.to_string()
}

fn optional_cell(value: Option<f64>) -> String {
    value.map(cell).unwrap_or_default()
}

fn joint_record(row: &JointRow, indicator_columns: &[String]) -> Vec<String> {
    let joined = &row.joined;
    let candle = &joined.candle;
    let mut record = vec![
        candle.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        cell(candle.open),
        cell(candle.high),
        cell(candle.low),
        cell(candle.close),
        optional_cell(candle.volume),
    ];
    record.extend(
        indicator_columns
            .iter()
            .map(|column| optional_cell(joined.indicators.get(column).copied())),
    );
    record.extend([
        joined.action.map(|a| a.to_string()).unwrap_or_default(),
        optional_cell(joined.amount),
        optional_cell(joined.balance),
        optional_cell(joined.entry_balance),
        optional_cell(joined.exit_balance),
        row.last_action.map(|a| a.to_string()).unwrap_or_default(),
        optional_cell(row.last_amount),
        optional_cell(row.last_balance),
        cell(row.profit),
        cell(row.cum_profit),
        cell(row.current_balance),
        cell(row.market_p),
        cell(row.strat_p),
        cell(row.market_max),
        cell(row.strat_max),
        cell(row.profit_max),
        cell(row.market_drawdown),
        cell(row.strat_drawdown),
        cell(row.profit_drawdown),
    ]);
    record
}

fn monthly_record(row: &MonthlyProfitRow) -> Vec<String> {
    vec![
        row.month_end()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        row.year.to_string(),
        row.month.to_string(),
        row.rows.to_string(),
        cell(row.first_close),
        cell(row.last_close),
        cell(row.first_balance),
        cell(row.last_balance),
        cell(row.first_cum_profit),
        cell(row.last_cum_profit),
        optional_cell(row.market_profit),
        optional_cell(row.strat_profit),
        optional_cell(row.cum_profit_change),
    ]
}
