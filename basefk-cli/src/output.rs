//! Output formatting utilities

use basefk_core::{StagePlan, StageReport, StepOutcome};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Print the steps of a plan, its satisfied targets and warnings
pub fn print_plan(plan: &StagePlan) {
    for what in &plan.satisfied {
        success(&format!("✓ {} already exists", what));
    }
    for warn in &plan.warnings {
        warning(&format!("⚠ {}", warn));
    }
    if plan.is_empty() {
        return;
    }

    let mut table = create_table();
    table.set_header(vec!["#", "Step", "SQL"]);
    for (i, step) in plan.steps.iter().enumerate() {
        let description = if step.destructive {
            Cell::new(format!("{} (destructive)", step.description)).fg(Color::Red)
        } else {
            Cell::new(&step.description)
        };
        table.add_row(vec![Cell::new(i + 1), description, Cell::new(&step.sql)]);
    }
    println!("{}", table);
}

/// Print one line per executed step
pub fn print_report(report: &StageReport) {
    for result in &report.results {
        match &result.outcome {
            StepOutcome::Applied { rows } if *rows > 0 => success(&format!(
                "✓ {} ({} row(s))",
                result.step.description, rows
            )),
            StepOutcome::Applied { .. } => success(&format!("✓ {}", result.step.description)),
            StepOutcome::AlreadyExists { message } => warning(&format!(
                "⚠ {}: already exists ({})",
                result.step.description, message
            )),
            StepOutcome::Failed { error: e } => {
                error(&format!("✗ {}: {}", result.step.description, e))
            }
        }
    }
}
