//! Crate-level error type

use crate::account::LedgerError;
use crate::assumptions::ConfigError;
use crate::calendar::ScheduleError;
use crate::projection::SinkError;
use thiserror::Error;

/// Any failure of a projection run
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Output error: {0}")]
    Sink(#[from] SinkError),
}
