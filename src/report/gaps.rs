//! Advisory heuristics over a finished report. Every rule is an independent
//! pure function; none of them can fail the run.

use std::collections::BTreeSet;

use crate::models::{ComplianceReport, Criterion, CriterionStatus, GapAnalysisEntry, Priority};

pub type GapRule = fn(&ComplianceReport) -> Vec<GapAnalysisEntry>;

/// Criteria skipped more often than this are flagged as coverage gaps.
pub const COVERAGE_SKIP_THRESHOLD: f64 = 0.5;
/// Distinct widget types failing `a` before contamination counts as systemic.
pub const SYSTEMIC_WIDGET_TYPES: usize = 3;
/// `c` pass rate below which streaming adoption is called out.
pub const LOW_STREAMING_PASS_RATE: f64 = 0.3;

pub struct GapRegistry {
    rules: Vec<(&'static str, GapRule)>,
}

impl GapRegistry {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn register(&mut self, name: &'static str, rule: GapRule) -> &mut Self {
        self.rules.push((name, rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|(name, _)| *name).collect()
    }

    /// Run every rule in registration order.
    pub fn analyze(&self, report: &ComplianceReport) -> Vec<GapAnalysisEntry> {
        self.rules
            .iter()
            .flat_map(|(_, rule)| rule(report))
            .collect()
    }
}

impl Default for GapRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register("coverage", coverage_gaps)
            .register("systemic-contamination", systemic_contamination)
            .register("caching", caching_gap)
            .register("streaming-adoption", streaming_adoption);
        registry
    }
}

fn entry(
    area: impl Into<String>,
    observation: impl Into<String>,
    suggested_improvement: impl Into<String>,
    priority: Priority,
) -> GapAnalysisEntry {
    GapAnalysisEntry {
        area: area.into(),
        observation: observation.into(),
        suggested_improvement: suggested_improvement.into(),
        priority,
    }
}

fn percent(rate: f64) -> String {
    format!("{:.0}%", rate * 100.0)
}

pub fn coverage_gaps(report: &ComplianceReport) -> Vec<GapAnalysisEntry> {
    report
        .summary
        .criteria
        .iter()
        .filter(|(_, summary)| summary.skip_rate > COVERAGE_SKIP_THRESHOLD)
        .map(|(criterion, summary)| {
            let priority = if summary.skip_rate > 0.9 {
                Priority::High
            } else if summary.skip_rate > 0.7 {
                Priority::Medium
            } else {
                Priority::Low
            };
            entry(
                format!("coverage: {} ({})", criterion.id(), criterion.label()),
                format!(
                    "{} of {} results skipped ({})",
                    summary.counts.skip,
                    summary.counts.total(),
                    percent(summary.skip_rate)
                ),
                "extend the sampling window or add the markers this criterion needs so it can be judged",
                priority,
            )
        })
        .collect()
}

pub fn systemic_contamination(report: &ComplianceReport) -> Vec<GapAnalysisEntry> {
    let failing_types: BTreeSet<&str> = report
        .widgets()
        .filter(|widget| {
            widget.status_of(Criterion::CleanLoadingState) == Some(CriterionStatus::Fail)
        })
        .map(|widget| widget.widget_type())
        .collect();

    if failing_types.len() < SYSTEMIC_WIDGET_TYPES {
        return Vec::new();
    }

    let types = failing_types.iter().copied().collect::<Vec<_>>().join(", ");
    vec![entry(
        "loading-state contamination",
        format!(
            "demo or stale data shown while loading across {} widget types: {types}",
            failing_types.len()
        ),
        "fix the shared loading path so fallback data is never rendered before live data arrives",
        Priority::High,
    )]
}

pub fn caching_gap(report: &ComplianceReport) -> Vec<GapAnalysisEntry> {
    let failing: Vec<&str> = report
        .widgets()
        .filter(|widget| widget.status_of(Criterion::WarmCacheHit) == Some(CriterionStatus::Fail))
        .map(|widget| widget.widget_id())
        .collect();

    if failing.is_empty() {
        return Vec::new();
    }

    vec![entry(
        "warm cache",
        format!(
            "{} widget(s) rendered no cached content on warm return: {}",
            failing.len(),
            failing.join(", ")
        ),
        "persist these widgets' last payload and hydrate from it before refetching",
        Priority::Medium,
    )]
}

pub fn streaming_adoption(report: &ComplianceReport) -> Vec<GapAnalysisEntry> {
    let Some(rate) = report
        .criterion_summary(Criterion::StreamConnection)
        .and_then(|summary| summary.pass_rate)
    else {
        return Vec::new();
    };

    if rate >= LOW_STREAMING_PASS_RATE {
        return Vec::new();
    }

    vec![entry(
        "streaming adoption",
        format!("only {} of judged widgets opened a stream connection", percent(rate)),
        "consider moving frequently refreshed widgets from polling to streams",
        Priority::Low,
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CriterionStatus::{Fail, Pass, Skip, Warn};
    use crate::report::aggregate::build_report_with;
    use crate::report::aggregate::fixtures::{run_of, widget};

    fn report_of(widgets: Vec<crate::models::WidgetComplianceResult>) -> ComplianceReport {
        build_report_with(run_of(widgets), &GapRegistry::empty())
    }

    #[test]
    fn default_registry_order() {
        assert_eq!(
            GapRegistry::default().rule_names(),
            vec!["coverage", "systemic-contamination", "caching", "streaming-adoption"]
        );
    }

    #[test]
    fn coverage_priority_scales_with_skip_rate() {
        let mut widgets = Vec::new();
        for i in 0..10 {
            let e = if i == 0 { Pass } else { Skip };
            let b = if i < 2 { Pass } else { Skip };
            let d = if i < 4 { Pass } else { Skip };
            widgets.push(widget(
                &format!("w-{i}"),
                "chart",
                &[
                    (Criterion::IncrementalRefresh, e),
                    (Criterion::RefreshIndicator, b),
                    (Criterion::LoadingTransition, d),
                    (Criterion::CleanLoadingState, Pass),
                ],
            ));
        }
        let report = report_of(widgets);

        let gaps = coverage_gaps(&report);
        let priority = |id: &str| {
            gaps.iter()
                .find(|g| g.area.starts_with(&format!("coverage: {id} ")))
                .map(|g| g.priority)
        };

        // e: 90% skipped is not above 0.9.
        assert_eq!(priority("e"), Some(Priority::Medium));
        assert_eq!(priority("b"), Some(Priority::Medium));
        assert_eq!(priority("d"), Some(Priority::Low));
        assert_eq!(priority("a"), None);
    }

    #[test]
    fn contamination_needs_three_widget_types() {
        let two = report_of(vec![
            widget("w-1", "chart", &[(Criterion::CleanLoadingState, Fail)]),
            widget("w-2", "chart", &[(Criterion::CleanLoadingState, Fail)]),
            widget("w-3", "table", &[(Criterion::CleanLoadingState, Fail)]),
        ]);
        assert!(systemic_contamination(&two).is_empty());

        let three = report_of(vec![
            widget("w-1", "chart", &[(Criterion::CleanLoadingState, Fail)]),
            widget("w-2", "table", &[(Criterion::CleanLoadingState, Fail)]),
            widget("w-3", "pods", &[(Criterion::CleanLoadingState, Fail)]),
        ]);
        let gaps = systemic_contamination(&three);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].priority, Priority::High);
        assert!(gaps[0].observation.contains("chart, pods, table"));
    }

    #[test]
    fn any_warm_failure_is_a_caching_gap() {
        let report = report_of(vec![
            widget("w-1", "chart", &[(Criterion::WarmCacheHit, Pass)]),
            widget("w-2", "chart", &[(Criterion::WarmCacheHit, Fail)]),
        ]);

        let gaps = caching_gap(&report);
        assert_eq!(gaps.len(), 1);
        assert!(gaps[0].observation.contains("w-2"));
    }

    #[test]
    fn low_streaming_adoption_is_informational() {
        let mut widgets = vec![widget("w-0", "chart", &[(Criterion::StreamConnection, Pass)])];
        for i in 1..5 {
            widgets.push(widget(
                &format!("w-{i}"),
                "chart",
                &[(Criterion::StreamConnection, Warn)],
            ));
        }
        let report = report_of(widgets);

        let gaps = streaming_adoption(&report);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].priority, Priority::Low);
        assert!(gaps[0].observation.contains("20%"));
    }

    #[test]
    fn clean_report_has_no_findings() {
        let report = report_of(vec![widget(
            "w-1",
            "chart",
            &[
                (Criterion::CleanLoadingState, Pass),
                (Criterion::StreamConnection, Pass),
                (Criterion::WarmCacheHit, Pass),
            ],
        )]);

        assert!(GapRegistry::default().analyze(&report).is_empty());
    }
}
