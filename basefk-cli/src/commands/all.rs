//! All command - the full pipeline in order

use anyhow::Result;
use basefk_core::{MigrationContext, Stage};
use colored::Colorize;

use super::{backfill, extend, finalize, get_context, verify, GlobalArgs};
use crate::output;

fn header(stage: Stage) {
    println!("\n{}", format!("== {} ==", stage).bold());
}

pub fn run(args: &GlobalArgs, dry_run: bool, yes: bool) -> Result<()> {
    let ctx = get_context(args)?;
    execute(&ctx, dry_run, yes)
}

fn execute(ctx: &MigrationContext, dry_run: bool, yes: bool) -> Result<()> {
    header(Stage::Extend);
    extend::execute(ctx, dry_run)?;

    if dry_run {
        // Later plans depend on the extend DDL having run
        output::info("Backfill, verify and finalize are planned against the current schema");
    }

    header(Stage::Backfill);
    backfill::execute(ctx, dry_run, yes)?;

    header(Stage::Verify);
    let report = verify::execute(ctx, false)?;
    if report.is_blocked() {
        if dry_run {
            output::warning("⚠ Finalize would be refused until the blocking checks pass");
            return Ok(());
        }
        anyhow::bail!(
            "Verification failed: {} blocking check(s); finalize not run",
            report.summary.blocking
        );
    }

    header(Stage::Finalize);
    finalize::execute(ctx, dry_run, yes)?;

    if !dry_run {
        output::success("\n✓ Migration complete");
    }
    Ok(())
}
