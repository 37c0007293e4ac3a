//! Backfill command - populate base_id from legacy base text

use anyhow::Result;
use basefk_core::services::{BackfillPlan, BackfillReport};
use basefk_core::{Error, MigrationContext};
use colored::Colorize;
use comfy_table::Cell;

use super::{confirm, get_context, GlobalArgs};
use crate::output;

pub fn run(args: &GlobalArgs, dry_run: bool, yes: bool) -> Result<()> {
    let ctx = get_context(args)?;
    execute(&ctx, dry_run, yes)
}

pub fn execute(ctx: &MigrationContext, dry_run: bool, yes: bool) -> Result<()> {
    let plan = ctx.backfill_service.plan()?;
    print_plan(ctx, &plan);

    if plan.is_empty() {
        output::success("✓ Nothing to backfill");
        return Ok(());
    }
    if dry_run {
        output::warning("DRY RUN - No changes were made");
        return Ok(());
    }

    if !plan.missing_bases.is_empty() {
        let prompt = format!("Create {} base(s) listed above?", plan.missing_bases.len());
        if !confirm(&prompt, yes)? {
            println!("{}", "Cancelled".dimmed());
            return Err(Error::Aborted.into());
        }
    }

    let report = ctx.backfill_service.execute(&plan)?;
    print_report(&report);
    Ok(())
}

fn print_plan(ctx: &MigrationContext, plan: &BackfillPlan) {
    for warn in &plan.warnings {
        output::warning(&format!("⚠ {}", warn));
    }

    if !plan.missing_bases.is_empty() {
        println!(
            "\n{}",
            format!(
                "{} legacy base value(s) have no row in bases and will be created:",
                plan.missing_bases.len()
            )
            .bold()
        );
        let mut table = output::create_table();
        table.set_header(vec!["Name / code", "Status", "Location", "Created by"]);
        for name in &plan.missing_bases {
            let base = ctx.config.new_base(name);
            table.add_row(vec![
                Cell::new(&base.name),
                Cell::new(&base.status),
                Cell::new(&base.location),
                Cell::new(base.created_by),
            ]);
        }
        println!("{}", table);
    }

    if !plan.code_conflicts.is_empty() {
        println!(
            "\n{}",
            "These legacy values match an existing base code, not a name; their rows stay unmatched:"
                .yellow()
                .bold()
        );
        for name in &plan.code_conflicts {
            println!("  {}", name.yellow());
        }
    }

    for fact in &plan.fact_tables {
        output::info(&format!("{}.{} will be filled from {}", fact.table, fact.fk_column, fact.legacy_column));
    }
    if plan.category_zero_rows > 0 {
        output::info(&format!(
            "{} row(s) with category_id = 0 will be set to NULL",
            plan.category_zero_rows
        ));
    }
}

fn print_report(report: &BackfillReport) {
    println!();
    for base in &report.created_bases {
        output::success(&format!("✓ Created base {} (id {})", base.name, base.id));
    }
    for table in &report.tables {
        output::success(&format!(
            "✓ {}: {} row(s) updated",
            table.table, table.rows_updated
        ));
    }
    if report.category_rows_normalized > 0 {
        output::success(&format!(
            "✓ {} category_id value(s) normalized to NULL",
            report.category_rows_normalized
        ));
    }
    for warn in &report.warnings {
        output::warning(&format!("⚠ {}", warn));
    }

    println!("\n{} Backfill complete", "✓".green());
    println!("  Bases created: {}", report.created_bases.len());
    println!("  Unmatched rows: {}", report.unmatched_total());
}
