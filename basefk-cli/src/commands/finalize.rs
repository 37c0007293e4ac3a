//! Finalize command - FK constraints and legacy column drops

use anyhow::Result;
use basefk_core::{Error, MigrationContext};
use colored::Colorize;

use super::{confirm_typed, get_context, GlobalArgs};
use crate::output;

pub fn run(args: &GlobalArgs, dry_run: bool, yes: bool) -> Result<()> {
    let ctx = get_context(args)?;
    execute(&ctx, dry_run, yes)
}

pub fn execute(ctx: &MigrationContext, dry_run: bool, yes: bool) -> Result<()> {
    let plan = match ctx.finalize_service.plan() {
        Ok(plan) => plan,
        Err(Error::Consistency(msg)) => {
            anyhow::bail!("Finalize refused, {}. Run `basefk verify --verbose` for samples", msg)
        }
        Err(e) => return Err(e.into()),
    };
    output::print_plan(&plan);

    if plan.is_empty() {
        output::success("✓ Schema is already finalized");
        return Ok(());
    }
    if dry_run {
        output::warning("DRY RUN - No changes were made");
        return Ok(());
    }

    if plan.has_destructive_steps() {
        println!("\n{}", "The following steps cannot be undone:".red().bold());
        for step in plan.destructive_steps() {
            println!("  {}", step.sql.red());
        }
        if !confirm_typed("Legacy data will be dropped.", yes)? {
            println!("{}", "Cancelled".dimmed());
            return Err(Error::Aborted.into());
        }
    }

    let report = ctx.finalize_service.execute(&plan)?;
    output::print_report(&report);

    if let Some(failed) = report.failures().next() {
        let skipped = plan.steps.len() - report.results.len();
        anyhow::bail!(
            "Finalize stopped at '{}' ({} step(s) not run)",
            failed.step.name,
            skipped
        );
    }
    output::success("✓ Finalize complete");
    Ok(())
}
