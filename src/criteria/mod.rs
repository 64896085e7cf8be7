//! Criterion evaluators. Each is a pure function producing exactly one
//! `CriterionResult`; the helpers here bundle them per regime and contain
//! malformed input to the criterion it affects.

pub mod cache;
pub mod loading;
pub mod streaming;

pub use cache::{persistent_cache, warm_cache_hit, warm_stability, WARM_GRACE_SNAPSHOTS};
pub use loading::{clean_loading_state, incremental_refresh, loading_transition, refresh_indicator};
pub use streaming::stream_connection;

use crate::models::{Criterion, CriterionResult, History, WidgetDescriptor};

/// Run `evaluate` only on a well-formed history; otherwise skip with the
/// reason.
pub fn guarded(
    criterion: Criterion,
    history: &History,
    evaluate: impl FnOnce(&History) -> CriterionResult,
) -> CriterionResult {
    match history.validate() {
        Ok(()) => evaluate(history),
        Err(reason) => CriterionResult::skip(criterion, format!("malformed history: {reason}")),
    }
}

/// Criteria a through e for one widget's cold-pass history.
pub fn evaluate_cold(
    widget: &WidgetDescriptor,
    history: &History,
    stream_log: &[String],
) -> Vec<CriterionResult> {
    vec![
        guarded(Criterion::CleanLoadingState, history, clean_loading_state),
        guarded(Criterion::RefreshIndicator, history, refresh_indicator),
        stream_connection(widget, stream_log),
        guarded(Criterion::LoadingTransition, history, loading_transition),
        guarded(Criterion::IncrementalRefresh, history, incremental_refresh),
    ]
}

/// Criteria g and h for one widget's warm-pass history, if it had one.
pub fn evaluate_warm(history: Option<&History>, grace_snapshots: usize) -> Vec<CriterionResult> {
    match history {
        Some(history) => vec![
            guarded(Criterion::WarmCacheHit, history, |h| {
                warm_cache_hit(h, grace_snapshots)
            }),
            guarded(Criterion::WarmStability, history, warm_stability),
        ],
        None => Criterion::WARM
            .iter()
            .map(|criterion| CriterionResult::skip(*criterion, "no warm snapshots captured"))
            .collect(),
    }
}

/// Every per-widget cold criterion skipped for a widget that never rendered.
pub fn never_rendered(reason: &str) -> Vec<CriterionResult> {
    Criterion::COLD_PER_WIDGET
        .iter()
        .map(|criterion| CriterionResult::skip(*criterion, reason))
        .collect()
}
