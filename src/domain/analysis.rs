//! Analysis pipeline: normalize, join, compute, aggregate.
//!
//! AnalysisConfig carries the caller-supplied parameters.

use crate::domain::config_validation::validate_short_ratio;
use crate::domain::error::AnalyticsError;
use crate::domain::join;
use crate::domain::monthly::{self, MonthlyProfitRow};
use crate::domain::normalize::{self, BacktestPayload};
use crate::domain::performance::{self, JointTable};
use crate::domain::series::Report;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisConfig {
    /// Fraction of capital held in a permanent offsetting short, in [0, 1].
    pub short_ratio: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { short_ratio: 0.0 }
    }
}

/// Everything produced for one backtest run.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub report: Report,
    pub table: JointTable,
    pub monthly: Vec<MonthlyProfitRow>,
}

/// Run every stage in order. Any failure aborts the whole run.
pub fn analyze(
    payload: &BacktestPayload,
    config: &AnalysisConfig,
) -> Result<Analysis, AnalyticsError> {
    validate_short_ratio(config.short_ratio)?;

    let (series, mut report) = normalize::normalize(payload)?;
    let joined = join::join(&series)?;

    report.start_price = joined.rows.first().map(|r| r.candle.close);

    let table = performance::compute(joined, &report, config.short_ratio)?;
    let monthly = monthly::aggregate(&table);

    tracing::info!(
        rows = table.len(),
        months = monthly.len(),
        start_price = ?report.start_price,
        start_balance = report.start_balance,
        "analysis complete"
    );

    Ok(Analysis {
        report,
        table,
        monthly,
    })
}
