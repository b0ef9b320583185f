//! Monthly projection engine, its state and its outputs

mod cashflows;
mod engine;
mod sink;
mod state;

pub use cashflows::{PeriodRecord, ProjectionResult, ProjectionSummary, StopReason};
pub use engine::ProjectionEngine;
pub use sink::{CollectingSink, CsvSink, JsonLinesSink, PeriodSink, SinkError, StagedFile, TableSink};
pub use state::{LifecycleStage, ProjectionState};
