//! Cold-load lifecycle criteria: a, b, d and e.

use crate::models::{Criterion, CriterionResult, History, Snapshot};

/// a: nothing shown while loading may carry demo or stale-cache markers.
pub fn clean_loading_state(history: &History) -> CriterionResult {
    let criterion = Criterion::CleanLoadingState;
    let loading: Vec<&Snapshot> = history.loading_snapshots().collect();
    if loading.is_empty() {
        return CriterionResult::skip(criterion, "no loading snapshots captured");
    }

    let demo = loading.iter().filter(|s| s.has_demo_indicator).count();
    let stale = loading
        .iter()
        .filter(|s| s.has_cache_contamination_marker)
        .count();

    if demo == 0 && stale == 0 {
        return CriterionResult::pass(
            criterion,
            format!("{} loading snapshots, none showed demo or stale data", loading.len()),
        );
    }

    let first = loading
        .iter()
        .find(|s| s.shows_fallback_data())
        .map(|s| s.elapsed_ms)
        .unwrap_or_default();
    CriterionResult::fail(
        criterion,
        format!(
            "{demo} demo and {stale} stale-cache snapshots out of {} while loading (first at {first}ms)",
            loading.len()
        ),
    )
}

/// b: the loading state must show a spinning refresh indicator.
pub fn refresh_indicator(history: &History) -> CriterionResult {
    let criterion = Criterion::RefreshIndicator;
    let loading: Vec<&Snapshot> = history.loading_snapshots().collect();
    if loading.is_empty() {
        return CriterionResult::skip(criterion, "no loading snapshots captured");
    }

    let spinning = loading
        .iter()
        .filter(|s| s.has_spinning_refresh_indicator)
        .count();
    if spinning > 0 {
        CriterionResult::pass(
            criterion,
            format!("refresh indicator spinning in {spinning}/{} loading snapshots", loading.len()),
        )
    } else {
        CriterionResult::fail(
            criterion,
            format!("no refresh indicator in {} loading snapshots", loading.len()),
        )
    }
}

/// d: loading must resolve into content.
pub fn loading_transition(history: &History) -> CriterionResult {
    let criterion = Criterion::LoadingTransition;
    let first_loading = history
        .snapshots
        .iter()
        .position(|s| s.effective_loading_flag);

    match first_loading {
        Some(start) => {
            let loaded = history.snapshots[start..]
                .iter()
                .find(|s| s.is_loaded());
            match loaded {
                Some(snapshot) => CriterionResult::pass(
                    criterion,
                    format!(
                        "loading at {}ms resolved to content at {}ms",
                        history.snapshots[start].elapsed_ms, snapshot.elapsed_ms
                    ),
                ),
                None if history.timed_out => CriterionResult::fail(
                    criterion,
                    format!(
                        "loading since {}ms never produced content before the hard timeout (timed out)",
                        history.snapshots[start].elapsed_ms
                    ),
                ),
                None => CriterionResult::fail(
                    criterion,
                    format!(
                        "loading since {}ms never produced content",
                        history.snapshots[start].elapsed_ms
                    ),
                ),
            }
        }
        None => match history.snapshots.iter().find(|s| s.has_content) {
            Some(snapshot) => CriterionResult::pass(
                criterion,
                format!(
                    "content present at {}ms with no loading state recorded",
                    snapshot.elapsed_ms
                ),
            ),
            None => CriterionResult::skip(criterion, "neither loading nor content observed"),
        },
    }
}

/// e: a refresh indicator recurring over rendered content proves the widget
/// refreshes incrementally instead of blanking. Never fails: the refresh
/// timer usually outlasts the sampling window.
pub fn incremental_refresh(history: &History) -> CriterionResult {
    let criterion = Criterion::IncrementalRefresh;
    let Some(first_content) = history.snapshots.iter().position(|s| s.has_content) else {
        return CriterionResult::skip(criterion, "no content phase captured");
    };

    let after = &history.snapshots[first_content + 1..];
    if after.is_empty() {
        return CriterionResult::skip(
            criterion,
            "no snapshots after first content; refresh timer window not reached",
        );
    }

    match after
        .iter()
        .find(|s| s.has_content && s.has_spinning_refresh_indicator)
    {
        Some(snapshot) => CriterionResult::pass(
            criterion,
            format!(
                "refresh indicator recurred over rendered content at {}ms",
                snapshot.elapsed_ms
            ),
        ),
        None => CriterionResult::skip(
            criterion,
            format!(
                "refresh timer window not reached within {} post-content snapshots",
                after.len()
            ),
        ),
    }
}
