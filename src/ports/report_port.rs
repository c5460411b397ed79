//! Report output port trait.

use crate::domain::analysis::Analysis;
use crate::domain::error::AnalyticsError;
use std::path::Path;

/// Port for persisting a completed analysis.
pub trait ReportSink {
    /// Write every artifact for `analysis` under `output_dir`, creating the
    /// directory if needed.
    fn write(&self, analysis: &Analysis, output_dir: &Path) -> Result<(), AnalyticsError>;
}
