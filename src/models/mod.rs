pub mod compliance;
pub mod report;
pub mod snapshot;

pub use compliance::{
    derive_overall_status, Criterion, CriterionResult, CriterionStatus, WidgetComplianceResult,
};
pub use report::{
    BatchResult, ComplianceReport, ComplianceSummary, CriterionSummary, GapAnalysisEntry,
    Priority, RegimeOutcome, ResolutionKind, StatusCounts,
};
pub use snapshot::{History, Snapshot, WidgetDescriptor};
