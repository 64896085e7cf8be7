//! Report-level data models: per-batch results, the run summary and
//! gap-analysis entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::compliance::{Criterion, CriterionResult, CriterionStatus, WidgetComplianceResult};

/// How a sampler run ended, without its data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionKind {
    Complete,
    GenuinelyEmpty,
    PartialTimeout,
    /// The regime never ran for this batch (navigation failed).
    NotRun,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegimeOutcome {
    pub resolution: ResolutionKind,
    pub ticks: u64,
    pub elapsed_ms: u64,
    pub widgets_sampled: usize,
}

impl RegimeOutcome {
    pub fn not_run() -> Self {
        Self {
            resolution: ResolutionKind::NotRun,
            ticks: 0,
            elapsed_ms: 0,
            widgets_sampled: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub batch_index: usize,
    pub widget_count: usize,
    pub cold: RegimeOutcome,
    pub warm: RegimeOutcome,
    /// Criterion f, evaluated once for the whole batch.
    pub storage: Option<CriterionResult>,
    pub widgets: Vec<WidgetComplianceResult>,
    /// Contained harness errors (navigation, cache clearing) for this batch.
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub pass: usize,
    pub fail: usize,
    pub warn: usize,
    pub skip: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: CriterionStatus) {
        match status {
            CriterionStatus::Pass => self.pass += 1,
            CriterionStatus::Fail => self.fail += 1,
            CriterionStatus::Warn => self.warn += 1,
            CriterionStatus::Skip => self.skip += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pass + self.fail + self.warn + self.skip
    }

    /// Results that carried enough signal to judge.
    pub fn testable(&self) -> usize {
        self.pass + self.fail + self.warn
    }

    /// `pass / testable`; `None` when everything was skipped.
    pub fn pass_rate(&self) -> Option<f64> {
        match self.testable() {
            0 => None,
            testable => Some(self.pass as f64 / testable as f64),
        }
    }

    pub fn skip_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.skip as f64 / total as f64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CriterionSummary {
    pub counts: StatusCounts,
    pub testable: usize,
    pub pass_rate: Option<f64>,
    pub skip_rate: f64,
}

impl From<StatusCounts> for CriterionSummary {
    fn from(counts: StatusCounts) -> Self {
        Self {
            testable: counts.testable(),
            pass_rate: counts.pass_rate(),
            skip_rate: counts.skip_rate(),
            counts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSummary {
    pub widgets_evaluated: usize,
    /// Overall widget statuses.
    pub overall: StatusCounts,
    pub criteria: BTreeMap<Criterion, CriterionSummary>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GapAnalysisEntry {
    pub area: String,
    pub observation: String,
    pub suggested_improvement: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub total_widgets: usize,
    pub batches: Vec<BatchResult>,
    pub summary: ComplianceSummary,
    pub gap_analysis: Vec<GapAnalysisEntry>,
}

impl ComplianceReport {
    pub fn widgets(&self) -> impl Iterator<Item = &WidgetComplianceResult> {
        self.batches.iter().flat_map(|batch| batch.widgets.iter())
    }

    pub fn criterion_summary(&self, criterion: Criterion) -> Option<&CriterionSummary> {
        self.summary.criteria.get(&criterion)
    }
}
