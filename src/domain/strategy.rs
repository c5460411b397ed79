//! Advice strategies and their registry.
//!
//! A strategy sees a window of the most recent candles and recommends a
//! position for the last candle in it.

use crate::domain::error::AnalyticsError;
use crate::domain::series::CandleRecord;
use std::collections::BTreeMap;
use std::fmt;

pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advice {
    Long,
    Short,
    Hold,
}

impl Advice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Advice::Long => "long",
            Advice::Short => "short",
            Advice::Hold => "hold",
        }
    }
}

impl fmt::Display for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Never takes a position.
    Hold,
    /// Checksum of the window's values modulo 3; useful for exercising a
    /// consumer without any real signal.
    Dummy,
    /// Long when the window's last close is above its first, short when below.
    Momentum { lookback: usize },
}

impl Strategy {
    pub fn window_size(&self) -> usize {
        match self {
            Strategy::Hold => 1,
            Strategy::Dummy => 5,
            Strategy::Momentum { lookback } => (*lookback).max(2),
        }
    }

    pub fn protocol_version(&self) -> u32 {
        PROTOCOL_VERSION
    }

    /// Advice for the last candle of `window`. Only the trailing
    /// `window_size()` candles are considered.
    pub fn advice(&self, window: &[CandleRecord]) -> Result<Advice, AnalyticsError> {
        let needed = self.window_size();
        if window.len() < needed {
            return Err(AnalyticsError::InsufficientWindow {
                needed,
                got: window.len(),
            });
        }
        let window = &window[window.len() - needed..];

        let advice = match self {
            Strategy::Hold => Advice::Hold,
            Strategy::Dummy => {
                let sum: f64 = window.iter().map(CandleRecord::value_sum).sum();
                match sum.ceil().rem_euclid(3.0) as u8 {
                    1 => Advice::Long,
                    2 => Advice::Short,
                    _ => Advice::Hold,
                }
            }
            Strategy::Momentum { .. } => {
                let first = window[0].close;
                let last = window[window.len() - 1].close;
                if last > first {
                    Advice::Long
                } else if last < first {
                    Advice::Short
                } else {
                    Advice::Hold
                }
            }
        };
        Ok(advice)
    }
}

/// Named strategies available to consumers.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Strategy>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in strategies under their canonical names.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("hold", Strategy::Hold);
        registry.register("dummy", Strategy::Dummy);
        registry.register("momentum", Strategy::Momentum { lookback: 10 });
        registry
    }

    /// Register `strategy` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: &str, strategy: Strategy) {
        self.strategies.insert(name.to_string(), strategy);
    }

    pub fn get(&self, name: &str) -> Result<&Strategy, AnalyticsError> {
        self.strategies
            .get(name)
            .ok_or_else(|| AnalyticsError::UnknownStrategy {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }
}
