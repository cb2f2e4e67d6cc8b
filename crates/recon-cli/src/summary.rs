use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use recon_ingest::parity::{kind_label, short_hash};
use recon_ingest::{ParityReport, ParityStatus, SourceValidation};
use recon_map::{RunReport, UnitAction, UnitOutcome};
use recon_model::{MappingRecord, MappingStatus};

use crate::commands::TypeReportRow;

pub fn print_run_summary(report: &RunReport) {
    println!(
        "Pages: {}  Environments: {}",
        report.pages_processed,
        report.environments.join(", ")
    );
    let counts = report.counts();
    let mut table = Table::new();
    table.set_header(vec![header_cell("Outcome"), header_cell("Units")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    let rows = [
        ("Mapped (exact)", counts.mapped_exact, Color::Green),
        ("Mapped (fuzzy)", counts.mapped_fuzzy, Color::Green),
        ("Unmapped (low score)", counts.unmapped_low_score, Color::Yellow),
        ("Unmapped (not exact)", counts.unmapped_not_exact, Color::Yellow),
        ("Unchanged definition", counts.unchanged, Color::Blue),
        ("Override kept", counts.override_kept, Color::Magenta),
        ("Deactivated orphan", counts.deactivated, Color::Yellow),
        ("Orphan kept by override", counts.override_masked_orphan, Color::Magenta),
        ("Skipped", counts.skipped, Color::Yellow),
        ("Failed", counts.failed, Color::Red),
    ];
    for (label, count, color) in rows {
        table.add_row(vec![Cell::new(label), count_cell(count, color)]);
    }
    println!("{table}");
    print_attention_table(report);
}

/// Skipped and failed units, failures first.
fn print_attention_table(report: &RunReport) {
    let mut units: Vec<&UnitOutcome> = report.failures().chain(report.skipped()).collect();
    if units.is_empty() {
        return;
    }
    units.sort_by_key(|unit| !unit.is_failure());
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Page"),
        header_cell("Env"),
        header_cell("Column"),
        header_cell("Result"),
        header_cell("Reason"),
    ]);
    apply_table_style(&mut table);
    for unit in units {
        let (result, reason) = match &unit.action {
            UnitAction::Failed { message } => (
                Cell::new("FAILED").fg(Color::Red).add_attribute(Attribute::Bold),
                message.clone(),
            ),
            UnitAction::Skipped(reason) => (Cell::new("skipped").fg(Color::Yellow), reason.to_string()),
            _ => continue,
        };
        table.add_row(vec![
            Cell::new(&unit.page_id),
            Cell::new(&unit.environment),
            unit.target_field_name
                .as_deref()
                .map_or_else(|| dim_cell("-"), Cell::new),
            result,
            Cell::new(reason),
        ]);
    }
    println!();
    println!("Needs attention:");
    println!("{table}");
}

pub fn print_mappings(records: &[MappingRecord]) {
    if records.is_empty() {
        println!("No mapping records match.");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Page"),
        header_cell("Target"),
        header_cell("Object"),
        header_cell("Env"),
        header_cell("Column"),
        header_cell("Score"),
        header_cell("Status"),
        header_cell("Last mapped"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 5, CellAlignment::Right);
    for record in records {
        table.add_row(vec![
            Cell::new(&record.key.page_id),
            Cell::new(&record.key.target_field_name),
            Cell::new(format!("{} ({})", record.key.fqdn, record.key.object_kind)),
            Cell::new(&record.key.environment),
            record
                .matched_column
                .as_deref()
                .map_or_else(|| dim_cell("-"), Cell::new),
            record
                .match_score
                .map_or_else(|| dim_cell("-"), |score| Cell::new(format!("{score:.0}"))),
            status_cell(record.status),
            Cell::new(record.last_mapped_on.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("{table}");
    println!("{} record(s)", records.len());
}

pub fn print_record(record: &MappingRecord) {
    println!("{}", record.key);
    println!("  status:  {}", record.status);
    println!(
        "  column:  {}",
        record.matched_column.as_deref().unwrap_or("-")
    );
    println!("  notes:   {}", record.notes);
}

pub fn print_types(rows: &[TypeReportRow]) {
    if rows.is_empty() {
        println!("No documented types.");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Documented"),
        header_cell("Resolved"),
        header_cell("Pages"),
        header_cell("Warnings"),
    ]);
    apply_table_style(&mut table);
    for row in rows {
        let resolved = if row.resolution.is_fallback() {
            Cell::new(&row.resolution.resolved).fg(Color::Yellow)
        } else {
            Cell::new(&row.resolution.resolved)
        };
        table.add_row(vec![
            Cell::new(&row.resolution.documented),
            resolved,
            Cell::new(row.pages.join(", ")),
            if row.resolution.warnings.is_empty() {
                dim_cell("-")
            } else {
                Cell::new(row.resolution.warnings.join("; ")).fg(Color::Yellow)
            },
        ]);
    }
    println!("{table}");
}

pub fn print_sources(report: &SourceValidation) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Documented source"),
        header_cell("Resolver entry"),
        header_cell("Targets"),
    ]);
    apply_table_style(&mut table);
    for mapped in &report.mapped {
        table.add_row(vec![
            Cell::new(&mapped.source),
            Cell::new(&mapped.entry).fg(Color::Green),
            Cell::new(&mapped.targets),
        ]);
    }
    for source in &report.unmapped {
        table.add_row(vec![
            Cell::new(source),
            Cell::new("missing").fg(Color::Red).add_attribute(Attribute::Bold),
            dim_cell("-"),
        ]);
    }
    println!("{table}");
    if !report.unused.is_empty() {
        println!();
        println!("Resolver entries not referenced by any page:");
        for entry in &report.unused {
            println!("- {entry}");
        }
    }
}

pub fn print_parity(report: &ParityReport) {
    if !report.changes.is_empty() {
        let mut table = Table::new();
        table.set_header(vec![
            header_cell("Changed definition"),
            header_cell("Env"),
            header_cell("Kind"),
            header_cell("Previous"),
            header_cell("Current"),
        ]);
        apply_table_style(&mut table);
        for change in &report.changes {
            table.add_row(vec![
                Cell::new(&change.fqdn),
                Cell::new(&change.environment),
                Cell::new(kind_label(change.object_kind)),
                dim_cell(short_hash(Some(change.previous_hash.as_str()))),
                Cell::new(short_hash(Some(change.current_hash.as_str()))).fg(Color::Yellow),
            ]);
        }
        println!("{table}");
        println!();
    }

    if report.rows.is_empty() {
        println!(
            "No definitions exported for {} or {}.",
            report.source_env, report.target_env
        );
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Object"),
        header_cell(&format!("{} kind", report.source_env)),
        header_cell(&format!("{} kind", report.target_env)),
        header_cell(&format!("{} hash", report.source_env)),
        header_cell(&format!("{} hash", report.target_env)),
        header_cell("Parity"),
    ]);
    apply_table_style(&mut table);
    for row in &report.rows {
        table.add_row(vec![
            Cell::new(&row.fqdn),
            Cell::new(kind_label(row.source_kind)),
            Cell::new(kind_label(row.target_kind)),
            dim_cell(short_hash(row.source_hash.as_deref())),
            dim_cell(short_hash(row.target_hash.as_deref())),
            parity_cell(row.status),
        ]);
    }
    println!("{table}");
    println!(
        "{} object(s): {} matching, {} differing, {} changed since previous export",
        report.rows.len(),
        report.count(ParityStatus::Match),
        report.rows.len() - report.count(ParityStatus::Match),
        report.changes.len()
    );
}

fn parity_cell(status: ParityStatus) -> Cell {
    let cell = Cell::new(status);
    match status {
        ParityStatus::Match => cell.fg(Color::Green),
        ParityStatus::HashMismatch | ParityStatus::KindMismatch => {
            cell.fg(Color::Red).add_attribute(Attribute::Bold)
        }
        ParityStatus::MissingInTarget | ParityStatus::MissingInSource => cell.fg(Color::Yellow),
    }
}

fn status_cell(status: MappingStatus) -> Cell {
    let cell = Cell::new(status);
    match status {
        MappingStatus::MappedExact | MappingStatus::MappedFuzzy => cell.fg(Color::Green),
        MappingStatus::MappedUserOverride => cell.fg(Color::Magenta),
        MappingStatus::InactiveOrphaned => cell.fg(Color::DarkGrey),
        MappingStatus::Unmapped
        | MappingStatus::UnmappedLowScore
        | MappingStatus::UnmappedNotExact => cell.fg(Color::Yellow),
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}
