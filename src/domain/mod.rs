//! Core domain types and logic.

pub mod error;
pub mod series;
pub mod normalize;
pub mod join;
pub mod performance;
pub mod monthly;
pub mod strategy;
pub mod windows;
pub mod analysis;
pub mod config_validation;
