//! TMA Common - Shared configuration, errors, and logging for the TMA toolkit.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Error types and handling utilities
//! - Logging setup
//! - Small numeric and formatting helpers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;

pub use config::{
    CollectorConfig, Config, IndicatorConfig, MonitorConfig, NotificationConfig,
    ObservabilityConfig,
};
pub use error::{CollectorError, Error, Result, ResultExt};
