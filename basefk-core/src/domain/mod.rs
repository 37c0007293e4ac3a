//! Core domain types
//!
//! Schema targets, stage plans and reports. Pure data - no I/O.

pub mod plan;
pub mod result;
pub mod schema;

pub use plan::{PlannedStep, Stage, StagePlan, StageReport, StepOutcome, StepResult};
pub use schema::{ColumnType, FactTable, ForeignKeySpec, OnDelete};
