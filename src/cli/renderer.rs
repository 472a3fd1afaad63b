use colored::{control, Colorize};

use crate::core::formatter::{format_cost_bar, format_currency, format_day};
use crate::core::models::usage::{LineItemRecord, UsageReport};

const BAR_WIDTH: usize = 12;
const NAME_WIDTH: usize = 24;

/// The reported total and the itemized sum come from different payload
/// fields; warn when they disagree by more than a cent instead of hiding it.
const DIVERGENCE_EPSILON: f64 = 0.01;

/// Render the headline metrics block.
///
/// ```text
///  Usage
///   Total        $1234.56
///   This month   $123.45
/// ```
pub fn render_metrics(all_time_total: f64, this_month_total: f64, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    lines.push(" Usage".bold().to_string());
    lines.push(format!(
        "  {}        {}",
        "Total".cyan(),
        format_currency(all_time_total)
    ));
    lines.push(format!(
        "  {}   {}",
        "This month".cyan(),
        format_currency(this_month_total)
    ));
    lines.join("\n")
}

/// Render one report as a per-model cost series.
///
/// ```text
///  Cost per model (this month)
///   gpt-4                     $105.00
///     2023-11-14     $5.00  [████████████]
///     2023-11-13     $4.20  [██████████░░]
///   gpt-3.5                    $18.45
///     2023-11-14     $2.00  [█████░░░░░░░]
/// ```
pub fn render_report(title: &str, report: &UsageReport, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!(" {}", title).bold().to_string());

    if report.records.is_empty() {
        lines.push("  No usage recorded for this range".to_string());
    }

    // Bars share one scale so models are comparable within the report
    let max_cost = report
        .records
        .iter()
        .map(|r| r.cost)
        .fold(0.0_f64, f64::max);

    for name in report.model_names() {
        let model_records: Vec<&LineItemRecord> = report
            .records
            .iter()
            .filter(|r| r.name == name)
            .collect();
        let model_total: f64 = model_records.iter().map(|r| r.cost).sum();
        // Pad before colorizing so ANSI escapes don't count toward the width
        let padded_name = format!("{:<width$}", name, width = NAME_WIDTH);
        lines.push(format!(
            "  {} {:>9}",
            padded_name.cyan(),
            format_currency(model_total),
        ));
        for record in model_records {
            lines.push(format!(
                "    {}  {:>8}  {}",
                format_day(&record.datetime),
                format_currency(record.cost),
                format_cost_bar(record.cost, max_cost, BAR_WIDTH),
            ));
        }
    }

    if let Some(warning) = divergence_warning(report) {
        lines.push(format!("  {}  {}", "Warning".yellow(), warning));
    }

    lines.join("\n")
}

/// Render the billed-records table (records with cost > 0), newest first.
///
/// ```text
///  Records (all time, cost > 0)
///   Date        Model                        Cost
///   2023-11-14  gpt-4                       $5.00
/// ```
pub fn render_records_table(title: &str, report: &UsageReport, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!(" {}", title).bold().to_string());

    let billed: Vec<&LineItemRecord> = report.billed_records().collect();
    if billed.is_empty() {
        lines.push("  No billed records".to_string());
        return lines.join("\n");
    }

    lines.push(
        format!(
            "  {:<11} {:<width$} {:>9}",
            "Date",
            "Model",
            "Cost",
            width = NAME_WIDTH,
        )
        .cyan()
        .to_string(),
    );
    for record in billed {
        lines.push(format!(
            "  {:<11} {:<width$} {:>9}",
            format_day(&record.datetime),
            record.name,
            format_currency(record.cost),
            width = NAME_WIDTH,
        ));
    }
    lines.join("\n")
}

fn divergence_warning(report: &UsageReport) -> Option<String> {
    let itemized = report.itemized_total();
    if (itemized - report.total_cost).abs() > DIVERGENCE_EPSILON {
        Some(format!(
            "itemized records sum to {} but the endpoint reports {}",
            format_currency(itemized),
            format_currency(report.total_cost),
        ))
    } else {
        None
    }
}
