//! Inspect command - show the tracked schema objects

use anyhow::Result;
use basefk_core::services::{ObjectKind, SchemaSnapshot};
use colored::Colorize;
use comfy_table::{Cell, Color};

use super::{get_context, GlobalArgs};
use crate::output;

fn kind_label(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Table => "table",
        ObjectKind::Column => "column",
        ObjectKind::Index => "index",
        ObjectKind::ForeignKey => "foreign key",
    }
}

pub fn run(args: &GlobalArgs, json: bool) -> Result<()> {
    let ctx = get_context(args)?;
    let snapshot = ctx.inspect_service.snapshot()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    print_snapshot(&snapshot);
    Ok(())
}

fn print_snapshot(snapshot: &SchemaSnapshot) {
    println!("{}", format!("Schema of {}", snapshot.database).bold());
    println!();

    let mut table = output::create_table();
    table.set_header(vec!["Kind", "Table", "Name", "Status", "Detail"]);
    for object in &snapshot.objects {
        let status = if object.present {
            Cell::new("present").fg(Color::Green)
        } else {
            Cell::new("missing").fg(Color::Yellow)
        };
        table.add_row(vec![
            Cell::new(kind_label(object.kind)),
            Cell::new(&object.table),
            Cell::new(&object.name),
            status,
            Cell::new(object.detail.as_deref().unwrap_or("")),
        ]);
    }
    println!("{}", table);

    if !snapshot.row_counts.is_empty() {
        let mut counts = output::create_table();
        counts.set_header(vec!["Table", "Rows"]);
        for row in &snapshot.row_counts {
            counts.add_row(vec![Cell::new(&row.table), Cell::new(row.rows)]);
        }
        println!("{}", counts);
    }

    let missing = snapshot.missing().count();
    println!();
    if missing == 0 {
        output::success("✓ Every tracked object is present");
    } else {
        output::info(&format!(
            "{} of {} tracked objects are missing",
            missing,
            snapshot.objects.len()
        ));
    }
}
