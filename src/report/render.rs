use std::fmt::Write;

use anyhow::{Context, Result};

use crate::models::{ComplianceReport, CriterionStatus};

pub fn to_json_pretty(report: &ComplianceReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize compliance report")
}

fn rate_cell(rate: Option<f64>) -> String {
    rate.map(|r| format!("{:.1}%", r * 100.0))
        .unwrap_or_else(|| "n/a".into())
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Markdown view of a report: pass rates, failures, then gap findings.
pub fn to_markdown(report: &ComplianceReport) -> String {
    let mut out = String::new();
    let overall = &report.summary.overall;

    let _ = writeln!(out, "# Widget compliance report");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Run `{}` at {}: {} widgets in {} batches.",
        report.run_id,
        report.timestamp.to_rfc3339(),
        report.total_widgets,
        report.batches.len()
    );
    let _ = writeln!(
        out,
        "Overall: {} pass, {} warn, {} fail, {} skip.",
        overall.pass, overall.warn, overall.fail, overall.skip
    );

    let _ = writeln!(out);
    let _ = writeln!(out, "## Pass rates");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Criterion | Pass | Warn | Fail | Skip | Pass rate |");
    let _ = writeln!(out, "|---|---|---|---|---|---|");
    for (criterion, summary) in &report.summary.criteria {
        let _ = writeln!(
            out,
            "| {} {} | {} | {} | {} | {} | {} |",
            criterion.id(),
            criterion.label(),
            summary.counts.pass,
            summary.counts.warn,
            summary.counts.fail,
            summary.counts.skip,
            rate_cell(summary.pass_rate)
        );
    }

    let failures: Vec<_> = report
        .widgets()
        .flat_map(|widget| {
            widget
                .criteria()
                .values()
                .filter(|result| result.status == CriterionStatus::Fail)
                .map(move |result| (widget, result))
        })
        .collect();

    let _ = writeln!(out);
    let _ = writeln!(out, "## Failures");
    let _ = writeln!(out);
    if failures.is_empty() {
        let _ = writeln!(out, "No failing criteria.");
    } else {
        let _ = writeln!(out, "| Widget | Type | Criterion | Details |");
        let _ = writeln!(out, "|---|---|---|---|");
        for (widget, result) in failures {
            let _ = writeln!(
                out,
                "| {}{} | {} | {} | {} |",
                escape_cell(widget.widget_id()),
                if widget.timed_out() { " (timed out)" } else { "" },
                escape_cell(widget.widget_type()),
                result.criterion.id(),
                escape_cell(&result.details)
            );
        }
    }

    let batch_errors: Vec<_> = report
        .batches
        .iter()
        .flat_map(|batch| batch.errors.iter())
        .collect();
    if !batch_errors.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Harness errors");
        let _ = writeln!(out);
        for error in batch_errors {
            let _ = writeln!(out, "- {error}");
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "## Gap analysis");
    let _ = writeln!(out);
    if report.gap_analysis.is_empty() {
        let _ = writeln!(out, "No gaps identified.");
    }
    for gap in &report.gap_analysis {
        let _ = writeln!(out, "### {} ({} priority)", gap.area, gap.priority.as_str());
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", gap.observation);
        let _ = writeln!(out);
        let _ = writeln!(out, "Suggested: {}", gap.suggested_improvement);
        let _ = writeln!(out);
    }

    out
}
