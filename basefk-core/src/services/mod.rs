//! Service layer - one service per pipeline stage
//!
//! Services read the schema through `SchemaPort`, build a plan, and execute
//! it. Plans are pure data so the CLI can show them before anything runs.

mod backfill;
mod executor;
mod extend;
mod finalize;
mod inspect;
mod verify;

pub use backfill::{BackfillPlan, BackfillReport, BackfillService, CreatedBase, TableBackfill};
pub use extend::ExtendService;
pub use finalize::FinalizeService;
pub use inspect::{InspectService, ObjectKind, ObjectStatus, RowCount, SchemaSnapshot};
pub use verify::{
    CheckResult, CheckStatus, VerificationReport, VerificationSummary, VerifyService, SAMPLE_LIMIT,
};
