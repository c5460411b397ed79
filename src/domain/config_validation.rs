//! Configuration validation.
//!
//! Validates config fields before an analysis runs.

use crate::domain::error::AnalyticsError;
use crate::ports::config_port::{ConfigPort, parse_bool};

pub fn validate_analysis_config(config: &dyn ConfigPort) -> Result<(), AnalyticsError> {
    validate_short_ratio_key(config)?;
    validate_include_indicators(config)?;
    Ok(())
}

fn validate_short_ratio_key(config: &dyn ConfigPort) -> Result<(), AnalyticsError> {
    let Some(raw) = config.get_string("analysis", "short_ratio") else {
        return Ok(());
    };
    let value: f64 = raw.trim().parse().map_err(|_| AnalyticsError::ConfigInvalid {
        section: "analysis".to_string(),
        key: "short_ratio".to_string(),
        reason: format!("`{raw}` is not a number"),
    })?;
    validate_short_ratio(value)
}

/// `short_ratio` must lie within [0, 1].
pub fn validate_short_ratio(value: f64) -> Result<(), AnalyticsError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(AnalyticsError::ConfigInvalid {
            section: "analysis".to_string(),
            key: "short_ratio".to_string(),
            reason: "short_ratio must be between 0 and 1".to_string(),
        });
    }
    Ok(())
}

fn validate_include_indicators(config: &dyn ConfigPort) -> Result<(), AnalyticsError> {
    match config.get_string("output", "include_indicators") {
        Some(raw) if parse_bool(&raw).is_none() => Err(AnalyticsError::ConfigInvalid {
            section: "output".to_string(),
            key: "include_indicators".to_string(),
            reason: format!("`{raw}` is not a boolean"),
        }),
        _ => Ok(()),
    }
}
