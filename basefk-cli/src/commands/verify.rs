//! Verify command - referential integrity checks

use anyhow::Result;
use basefk_core::services::{CheckStatus, VerificationReport};
use basefk_core::MigrationContext;
use colored::Colorize;
use comfy_table::{Cell, Color};

use super::{get_context, GlobalArgs};
use crate::output;

pub fn run(args: &GlobalArgs, verbose: bool, json: bool) -> Result<()> {
    let ctx = get_context(args)?;
    let report = ctx.verify_service.run_checks()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, verbose);
    }

    if report.is_blocked() {
        anyhow::bail!(
            "Verification failed: {} blocking check(s)",
            report.summary.blocking
        );
    }
    Ok(())
}

/// Run the checks and print them; the caller decides what a block means
pub fn execute(ctx: &MigrationContext, verbose: bool) -> Result<VerificationReport> {
    let report = ctx.verify_service.run_checks()?;
    print_report(&report, verbose);
    Ok(report)
}

fn print_report(report: &VerificationReport, verbose: bool) {
    println!("{}", "Migration Integrity Check".bold());
    println!();

    let mut table = output::create_table();
    table.set_header(vec!["Check", "Status", "Message"]);

    for check in &report.checks {
        let status_cell = match check.status {
            CheckStatus::Pass => Cell::new("PASS").fg(Color::Green),
            CheckStatus::Warning => Cell::new("WARN").fg(Color::Yellow),
            CheckStatus::Error => Cell::new("BLOCK").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(&check.name),
            status_cell,
            Cell::new(&check.message),
        ]);

        if verbose {
            for sample in &check.samples {
                table.add_row(vec![
                    Cell::new(""),
                    Cell::new(""),
                    Cell::new(format!("  - {}", sample)),
                ]);
            }
        }
    }

    println!("{}", table);
    println!();

    println!(
        "Summary: {} passed, {} warnings, {} blocking",
        report.summary.passed.to_string().green(),
        report.summary.warnings.to_string().yellow(),
        report.summary.blocking.to_string().red(),
    );
}
