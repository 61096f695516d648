//! Presentation of a [`RunReport`]: terminal tables, JSON and CSV export.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, Table};
use tracing::info;

use crate::config::RunConfig;
use crate::error::Result;
use crate::pipeline::{RunReport, SignificanceOutcome};
use crate::record::{AssignedRecord, Outcome};
use crate::significance::Verdict;

/// Default file name of the exported dataset.
pub const EXPORT_FILE_NAME: &str = "ab_test_data.csv";

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table
}

fn flag(v: bool) -> &'static str {
    if v {
        "1"
    } else {
        "0"
    }
}

fn count_title(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Converted => "Conversions",
        Outcome::Engaged => "Engagements",
        Outcome::SignedUp => "Signups",
    }
}

/// First `rows` records of the assigned dataset.
pub fn preview_table(report: &RunReport, rows: usize, digits: usize) -> Table {
    let outcomes = report.config.outcomes();
    let mut table = new_table();

    let mut hdr = vec!["user_id", "age", "location", "device", "click_rate"];
    hdr.extend(outcomes.iter().map(|o| o.column()));
    hdr.push("variant");
    table.set_header(hdr.iter().map(|h| Cell::new(*h)).collect::<Vec<_>>());

    for r in report.assigned.iter().take(rows) {
        let mut row = vec![
            Cell::new(&r.record.user_id),
            Cell::new(r.record.age.to_string()),
            Cell::new(&r.record.location),
            Cell::new(&r.record.device),
            Cell::new(format!("{:.1$}", r.record.click_rate, digits)),
        ];
        row.extend(
            outcomes
                .iter()
                .map(|o| Cell::new(o.value(&r.record).map(flag).unwrap_or(""))),
        );
        row.push(Cell::new(r.variant.label()));
        table.add_row(row);
    }
    table
}

/// Users, outcome sums and rates per variant, labelled with display names.
pub fn summary_table(report: &RunReport, digits: usize) -> Table {
    let config = &report.config;
    let outcomes = config.outcomes();
    let mut table = new_table();

    let mut hdr = vec!["Variant", "Name", "Users"];
    for o in outcomes {
        hdr.push(count_title(*o));
        hdr.push(o.rate_title());
    }
    table.set_header(hdr.iter().map(|h| Cell::new(*h)).collect::<Vec<_>>());

    for group in &report.summary {
        let mut row = vec![
            Cell::new(group.variant.label()),
            Cell::new(config.display_name(group.variant)),
            Cell::new(group.users.to_string()),
        ];
        for stats in &group.outcomes {
            row.push(Cell::new(stats.sum.to_string()));
            row.push(Cell::new(format!("{:.1$}", stats.rate_percent, digits)));
        }
        table.add_row(row);
    }
    table
}

pub fn significance_table(report: &RunReport, digits: usize) -> Table {
    let mut table = new_table();
    match &report.significance {
        SignificanceOutcome::Tested(result) => {
            table.set_header(vec!["Outcome", "Chi2", "DoF", "P-Value", "Verdict"]);
            let suffix = match result.verdict {
                Verdict::Significant => "*",
                Verdict::NotSignificant => "",
            };
            table.add_row(vec![
                Cell::new(result.outcome.column()),
                Cell::new(format!("{:.1$}", result.chi2, digits)),
                Cell::new(result.dof.to_string()),
                Cell::new(format!("{:.1$}{2}", result.p_value, digits, suffix)),
                Cell::new(result.verdict.to_string()),
            ]);
        }
        SignificanceOutcome::Undefined { reason } => {
            table.set_header(vec!["Outcome", "Verdict"]);
            table.add_row(vec![
                Cell::new(Outcome::Converted.column()),
                Cell::new(format!("undefined: {reason}")),
            ]);
        }
    }
    table
}

pub fn distribution_table(report: &RunReport) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Variant", report.config.distribution.title(), "Users"]);
    for row in &report.distribution {
        table.add_row(vec![
            Cell::new(row.variant.label()),
            Cell::new(&row.value),
            Cell::new(row.users.to_string()),
        ]);
    }
    table
}

/// All sections as printable text.
pub fn render_text(report: &RunReport, preview_rows: usize, digits: usize) -> String {
    let mut out = String::new();
    if preview_rows > 0 {
        out.push_str("User Data Preview\n");
        out.push_str(&preview_table(report, preview_rows, digits).to_string());
        out.push_str("\n\n");
    }
    out.push_str("Conversion Summary\n");
    out.push_str(&summary_table(report, digits).to_string());
    out.push_str("\n\nSignificance\n");
    out.push_str(&significance_table(report, digits).to_string());
    out.push_str(&format!(
        "\n\nUser Distribution by {}\n",
        report.config.distribution.title()
    ));
    out.push_str(&distribution_table(report).to_string());
    out.push('\n');
    out
}

pub fn render_json(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Write the assigned dataset as CSV. Outcome columns follow `config`; the
/// variant column holds the raw "A"/"B" label.
pub fn write_csv<W: Write>(
    config: &RunConfig,
    assigned: &[AssignedRecord],
    writer: W,
) -> Result<()> {
    let outcomes = config.outcomes();
    let mut wtr = csv::Writer::from_writer(writer);

    let mut hdr = vec!["user_id", "age", "location", "device", "click_rate"];
    hdr.extend(outcomes.iter().map(|o| o.column()));
    hdr.push("variant");
    wtr.write_record(&hdr)?;

    for r in assigned {
        let mut row = vec![
            r.record.user_id.clone(),
            r.record.age.to_string(),
            r.record.location.clone(),
            r.record.device.clone(),
            r.record.click_rate.to_string(),
        ];
        row.extend(
            outcomes
                .iter()
                .map(|o| o.value(&r.record).map(flag).unwrap_or("").to_string()),
        );
        row.push(r.variant.label().to_string());
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn export_csv(report: &RunReport, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_csv(&report.config, &report.assigned, file)?;
    info!(path = %path.display(), rows = report.assigned.len(), "exported dataset");
    Ok(())
}
