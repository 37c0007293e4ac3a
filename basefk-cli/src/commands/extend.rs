//! Extend command - additive DDL

use anyhow::Result;
use basefk_core::MigrationContext;

use super::{get_context, GlobalArgs};
use crate::output;

pub fn run(args: &GlobalArgs, dry_run: bool) -> Result<()> {
    let ctx = get_context(args)?;
    execute(&ctx, dry_run)
}

pub fn execute(ctx: &MigrationContext, dry_run: bool) -> Result<()> {
    let plan = ctx.extend_service.plan()?;
    output::print_plan(&plan);

    if plan.is_empty() {
        output::success("✓ Schema is already extended");
        return Ok(());
    }
    if dry_run {
        output::warning("DRY RUN - No changes were made");
        return Ok(());
    }

    let report = ctx.extend_service.execute(&plan)?;
    output::print_report(&report);

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("{} extend step(s) failed", failed);
    }
    output::success(&format!("✓ Extend complete ({} step(s) applied)", report.applied_count()));
    Ok(())
}
