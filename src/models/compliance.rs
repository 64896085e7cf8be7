use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One independently evaluated compliance rule, serialized as its letter id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Criterion {
    /// No demo or stale-cache markers while loading.
    #[serde(rename = "a")]
    CleanLoadingState,
    /// Loading state shows a spinning refresh indicator.
    #[serde(rename = "b")]
    RefreshIndicator,
    /// A stream request was observed for the widget's data source.
    #[serde(rename = "c")]
    StreamConnection,
    /// Loading resolves into content.
    #[serde(rename = "d")]
    LoadingTransition,
    /// Refresh indicator recurs over already-rendered content.
    #[serde(rename = "e")]
    IncrementalRefresh,
    /// Persistent cache holds entries after a cold load.
    #[serde(rename = "f")]
    PersistentCache,
    /// Warm return renders cached content within the grace window.
    #[serde(rename = "g")]
    WarmCacheHit,
    /// Warm content stays stable and never falls back to demo data.
    #[serde(rename = "h")]
    WarmStability,
}

impl Criterion {
    pub const ALL: [Criterion; 8] = [
        Criterion::CleanLoadingState,
        Criterion::RefreshIndicator,
        Criterion::StreamConnection,
        Criterion::LoadingTransition,
        Criterion::IncrementalRefresh,
        Criterion::PersistentCache,
        Criterion::WarmCacheHit,
        Criterion::WarmStability,
    ];

    /// Criteria judged from a single cold-pass widget History.
    pub const COLD_PER_WIDGET: [Criterion; 5] = [
        Criterion::CleanLoadingState,
        Criterion::RefreshIndicator,
        Criterion::StreamConnection,
        Criterion::LoadingTransition,
        Criterion::IncrementalRefresh,
    ];

    pub const WARM: [Criterion; 2] = [Criterion::WarmCacheHit, Criterion::WarmStability];

    pub fn id(&self) -> &'static str {
        match self {
            Criterion::CleanLoadingState => "a",
            Criterion::RefreshIndicator => "b",
            Criterion::StreamConnection => "c",
            Criterion::LoadingTransition => "d",
            Criterion::IncrementalRefresh => "e",
            Criterion::PersistentCache => "f",
            Criterion::WarmCacheHit => "g",
            Criterion::WarmStability => "h",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Criterion::CleanLoadingState => "No demo data while loading",
            Criterion::RefreshIndicator => "Refresh indicator while loading",
            Criterion::StreamConnection => "Stream connection",
            Criterion::LoadingTransition => "Loading to content transition",
            Criterion::IncrementalRefresh => "Incremental refresh",
            Criterion::PersistentCache => "Persistent cache populated",
            Criterion::WarmCacheHit => "Warm return cache hit",
            Criterion::WarmStability => "Warm content stability",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CriterionStatus {
    Pass,
    Fail,
    Warn,
    /// Not enough signal to judge. Never counted as a pass.
    Skip,
}

impl CriterionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriterionStatus::Pass => "pass",
            CriterionStatus::Fail => "fail",
            CriterionStatus::Warn => "warn",
            CriterionStatus::Skip => "skip",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CriterionResult {
    pub criterion: Criterion,
    pub status: CriterionStatus,
    pub details: String,
}

impl CriterionResult {
    pub fn new(criterion: Criterion, status: CriterionStatus, details: impl Into<String>) -> Self {
        Self {
            criterion,
            status,
            details: details.into(),
        }
    }

    pub fn pass(criterion: Criterion, details: impl Into<String>) -> Self {
        Self::new(criterion, CriterionStatus::Pass, details)
    }

    pub fn fail(criterion: Criterion, details: impl Into<String>) -> Self {
        Self::new(criterion, CriterionStatus::Fail, details)
    }

    pub fn warn(criterion: Criterion, details: impl Into<String>) -> Self {
        Self::new(criterion, CriterionStatus::Warn, details)
    }

    pub fn skip(criterion: Criterion, details: impl Into<String>) -> Self {
        Self::new(criterion, CriterionStatus::Skip, details)
    }
}

/// Per-widget verdicts across both regimes.
///
/// `overall_status` is never set directly; it is recomputed from `criteria`
/// after every `record`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WidgetComplianceResult {
    widget_type: String,
    widget_id: String,
    criteria: BTreeMap<Criterion, CriterionResult>,
    overall_status: CriterionStatus,
    timed_out: bool,
}

impl WidgetComplianceResult {
    pub fn new(widget_id: impl Into<String>, widget_type: impl Into<String>) -> Self {
        Self {
            widget_type: widget_type.into(),
            widget_id: widget_id.into(),
            criteria: BTreeMap::new(),
            overall_status: CriterionStatus::Skip,
            timed_out: false,
        }
    }

    pub fn widget_id(&self) -> &str {
        &self.widget_id
    }

    pub fn widget_type(&self) -> &str {
        &self.widget_type
    }

    pub fn criteria(&self) -> &BTreeMap<Criterion, CriterionResult> {
        &self.criteria
    }

    pub fn get(&self, criterion: Criterion) -> Option<&CriterionResult> {
        self.criteria.get(&criterion)
    }

    pub fn status_of(&self, criterion: Criterion) -> Option<CriterionStatus> {
        self.criteria.get(&criterion).map(|r| r.status)
    }

    pub fn overall_status(&self) -> CriterionStatus {
        self.overall_status
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn mark_timed_out(&mut self) {
        self.timed_out = true;
    }

    /// Insert or replace one criterion verdict.
    pub fn record(&mut self, result: CriterionResult) {
        self.criteria.insert(result.criterion, result);
        self.overall_status = derive_overall_status(self.criteria.values().map(|r| r.status));
    }

    pub fn record_all(&mut self, results: impl IntoIterator<Item = CriterionResult>) {
        for result in results {
            self.record(result);
        }
    }
}

/// fail > warn > pass; skip only when every status is skip.
pub fn derive_overall_status(
    statuses: impl IntoIterator<Item = CriterionStatus>,
) -> CriterionStatus {
    let mut any_warn = false;
    let mut any_judged = false;

    for status in statuses {
        match status {
            CriterionStatus::Fail => return CriterionStatus::Fail,
            CriterionStatus::Warn => {
                any_warn = true;
                any_judged = true;
            }
            CriterionStatus::Pass => any_judged = true,
            CriterionStatus::Skip => {}
        }
    }

    if any_warn {
        CriterionStatus::Warn
    } else if any_judged {
        CriterionStatus::Pass
    } else {
        CriterionStatus::Skip
    }
}
