//! Terminal output: one table per batch, then the final layout.

use std::fmt::Write as _;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use viewmap_core::RecordedBatch;
use viewmap_model::ViewOperation;

use crate::replay::{ReplayReport, StepReport};
use crate::scenario::{Scenario, ScenarioStats};

pub fn print_report(report: &ReplayReport) {
    if let Some(name) = &report.name {
        println!("Scenario: {name}");
    }
    println!("Sink: {}", report.sink.name());
    for step in &report.steps {
        println!();
        println!("{}", step_heading(step));
        if step.batches.is_empty() {
            println!("  {}", idle_note(step));
        }
        for batch in &step.batches {
            println!("{}", batch_table(batch));
        }
    }
    println!();
    println!("Final layout:");
    println!("{}", layout_table(report));
    let rejected = report.rejected_batches();
    if rejected > 0 {
        eprintln!("{rejected} batch(es) were rejected by the view");
    }
    if !report.in_sync() {
        eprintln!("The view does not show the final layout");
    }
}

pub fn print_check(scenario: &Scenario, stats: &ScenarioStats) {
    if let Some(name) = &scenario.name {
        println!("Scenario: {name}");
    }
    let mut table = Table::new();
    table.set_header(vec![header_cell("Item"), header_cell("Count")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for (label, value) in [
        ("Sources", stats.sources),
        ("Groups", stats.groups),
        ("Rows", stats.rows),
        ("Initial mappings", stats.mappings),
        ("Steps", stats.steps),
        ("Commits", stats.commits),
        ("Edits", stats.edits),
    ] {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    table.add_row(vec![
        Cell::new("Final version").add_attribute(Attribute::Bold),
        Cell::new(stats.final_version).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
}

/// Plain-text rendering of a report, one line per operation.
pub fn render_report(report: &ReplayReport) -> String {
    let mut out = String::new();
    for step in &report.steps {
        let _ = writeln!(out, "{}", step_heading(step));
        if step.batches.is_empty() {
            let _ = writeln!(out, "  {}", idle_note(step));
        }
        for batch in &step.batches {
            let _ = writeln!(out, "  batch ({})", batch_status(batch));
            for op in &batch.operations {
                let _ = writeln!(out, "    {op}");
            }
        }
    }
    let _ = writeln!(out, "layout");
    for row in &report.layout {
        let _ = writeln!(
            out,
            "  {} {}/{} {}",
            row.section, row.mapping, row.group, row.items
        );
    }
    out
}

fn step_heading(step: &StepReport) -> String {
    format!("{}. {} @ {}", step.number, step.label, step.version)
}

fn idle_note(step: &StepReport) -> &'static str {
    if step.updates > 0 {
        "no view attached"
    } else {
        "no change"
    }
}

fn batch_status(batch: &RecordedBatch) -> &'static str {
    match (batch.finished, batch.animated) {
        (false, _) => "rejected",
        (true, true) => "animated",
        (true, false) => "reload",
    }
}

fn batch_table(batch: &RecordedBatch) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("#"),
        header_cell("Operation"),
        header_cell("Target"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    for (index, op) in batch.operations.iter().enumerate() {
        table.add_row(vec![
            dim_cell(index + 1),
            operation_cell(op, batch.finished),
            Cell::new(target(op)),
        ]);
    }
    if !batch.finished {
        table.add_row(vec![
            dim_cell("-"),
            Cell::new("rejected")
                .fg(Color::Red)
                .add_attribute(Attribute::Bold),
            dim_cell("view reloaded instead"),
        ]);
    }
    table
}

fn layout_table(report: &ReplayReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Section"),
        header_cell("Mapping"),
        header_cell("Group"),
        header_cell("Items"),
        header_cell("Shown"),
    ]);
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(100);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Right);
    for row in &report.layout {
        let shown = report
            .view_counts
            .as_ref()
            .map(|counts| counts.get(row.section).copied());
        let shown_cell = match shown {
            None => dim_cell("-"),
            Some(Some(count)) if count == row.items => Cell::new(count).fg(Color::Green),
            Some(Some(count)) => Cell::new(count).fg(Color::Red).add_attribute(Attribute::Bold),
            Some(None) => Cell::new("missing").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(row.section),
            Cell::new(&row.mapping)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(&row.group),
            Cell::new(row.items),
            shown_cell,
        ]);
    }
    table
}

fn target(op: &ViewOperation) -> String {
    // the display form is `name(args)`; the table already has the name
    let text = op.to_string();
    match text.split_once('(') {
        Some((_, args)) => args.trim_end_matches(')').to_string(),
        None => "all".to_string(),
    }
}

fn operation_cell(op: &ViewOperation, finished: bool) -> Cell {
    let color = match op {
        ViewOperation::ReloadAll | ViewOperation::ReloadItems { .. } => Color::Yellow,
        ViewOperation::DeleteSections { .. } | ViewOperation::DeleteItems { .. } => Color::Red,
        ViewOperation::InsertSections { .. } | ViewOperation::InsertItems { .. } => Color::Green,
        ViewOperation::MoveItem { .. } => Color::Cyan,
    };
    let cell = Cell::new(op.name());
    if finished {
        cell.fg(color)
    } else {
        cell.fg(Color::DarkGrey)
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(100);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use viewmap_model::Coordinate;

    use super::*;

    #[test]
    fn target_strips_operation_name() {
        assert_eq!(target(&ViewOperation::ReloadAll), "all");
        assert_eq!(
            target(&ViewOperation::DeleteSections {
                sections: BTreeSet::from([1, 2])
            }),
            "1, 2"
        );
        assert_eq!(
            target(&ViewOperation::MoveItem {
                from: Coordinate::new(0, 1),
                to: Coordinate::new(2, 0),
            }),
            "[0, 1] -> [2, 0]"
        );
    }

    #[test]
    fn rejected_batch_gets_extra_row() {
        let batch = RecordedBatch {
            operations: vec![ViewOperation::ReloadItems {
                items: vec![Coordinate::new(0, 0)],
            }],
            animated: true,
            finished: false,
        };
        assert_eq!(batch_status(&batch), "rejected");
        assert_eq!(batch_table(&batch).row_count(), 2);
    }
}
