//! Domain error types.

use chrono::NaiveDateTime;

/// Top-level error type for gekkostat.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("malformed {series} record at position {position}: field `{field}` {reason}")]
    MalformedInput {
        series: String,
        position: usize,
        field: String,
        reason: String,
    },

    #[error("duplicate timestamp {timestamp} in {series}")]
    DuplicateTimestamp {
        series: String,
        timestamp: NaiveDateTime,
    },

    #[error("degenerate baseline: {name} is {value}, must be positive")]
    DegenerateBaseline { name: String, value: f64 },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no strategy registered under `{name}`")]
    UnknownStrategy { name: String },

    #[error("insufficient window: strategy needs {needed} candles, got {got}")]
    InsufficientWindow { needed: usize, got: usize },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AnalyticsError {
    pub(crate) fn malformed(
        series: &str,
        position: usize,
        field: &str,
        reason: impl Into<String>,
    ) -> Self {
        AnalyticsError::MalformedInput {
            series: series.to_string(),
            position,
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&AnalyticsError> for std::process::ExitCode {
    fn from(err: &AnalyticsError) -> Self {
        let code: u8 = match err {
            AnalyticsError::Io(_) | AnalyticsError::Csv(_) => 1,
            AnalyticsError::ConfigParse { .. } | AnalyticsError::ConfigInvalid { .. } => 2,
            AnalyticsError::MalformedInput { .. }
            | AnalyticsError::DuplicateTimestamp { .. }
            | AnalyticsError::Json(_) => 3,
            AnalyticsError::DegenerateBaseline { .. } => 4,
            AnalyticsError::UnknownStrategy { .. } | AnalyticsError::InsufficientWindow { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
