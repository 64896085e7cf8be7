use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    ComplianceReport, ComplianceSummary, Criterion, StatusCounts, WidgetComplianceResult,
};
use crate::orchestrator::OrchestratorRun;

use super::gaps::GapRegistry;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Roll flattened widget results into status counts. Pass rates are taken
/// over testable results only, so skips never inflate them.
pub fn summarize<'a>(
    widgets: impl IntoIterator<Item = &'a WidgetComplianceResult>,
) -> ComplianceSummary {
    let mut overall = StatusCounts::default();
    let mut per_criterion: BTreeMap<Criterion, StatusCounts> = Criterion::ALL
        .iter()
        .map(|criterion| (*criterion, StatusCounts::default()))
        .collect();
    let mut widgets_evaluated = 0;

    for widget in widgets {
        widgets_evaluated += 1;
        overall.add(widget.overall_status());
        for (criterion, result) in widget.criteria() {
            per_criterion
                .entry(*criterion)
                .or_default()
                .add(result.status);
        }
    }

    ComplianceSummary {
        widgets_evaluated,
        overall,
        criteria: per_criterion
            .into_iter()
            .map(|(criterion, counts)| (criterion, counts.into()))
            .collect(),
    }
}

/// Build the final report with the default gap heuristics.
pub fn build_report(run: OrchestratorRun) -> ComplianceReport {
    build_report_with(run, &GapRegistry::default())
}

pub fn build_report_with(run: OrchestratorRun, gaps: &GapRegistry) -> ComplianceReport {
    let summary = summarize(run.widget_results());
    let mut report = ComplianceReport {
        run_id: Uuid::new_v4(),
        timestamp: Utc::now(),
        total_widgets: run.total_widgets,
        batches: run.batches,
        summary,
        gap_analysis: Vec::new(),
    };
    report.gap_analysis = gaps.analyze(&report);

    log_info!(
        "report {}: {} widgets, {} pass / {} warn / {} fail / {} skip, {} gap findings",
        report.run_id,
        report.summary.widgets_evaluated,
        report.summary.overall.pass,
        report.summary.overall.warn,
        report.summary.overall.fail,
        report.summary.overall.skip,
        report.gap_analysis.len()
    );

    report
}
