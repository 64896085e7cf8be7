//! Cache criteria: f (environment-wide) and the warm-return pair g and h.

use crate::models::{Criterion, CriterionResult, History};
use crate::surface::StorageProbe;

/// Default grace window for warm hydration, in snapshots.
pub const WARM_GRACE_SNAPSHOTS: usize = 10;

/// f: the persistent cache holds at least one entry across both tiers.
///
/// A failed probe counts as zero entries: an empty cache is a compliance
/// failure, not a harness fault.
pub fn persistent_cache(probe: &Result<StorageProbe, String>) -> CriterionResult {
    let criterion = Criterion::PersistentCache;
    match probe {
        Ok(probe) => {
            let total = probe.total_entries();
            let breakdown = probe
                .tiers
                .iter()
                .map(|tier| format!("{}={}", tier.name, tier.entries))
                .collect::<Vec<_>>()
                .join(", ");
            if total > 0 {
                CriterionResult::pass(criterion, format!("{total} cache entries ({breakdown})"))
            } else {
                CriterionResult::fail(criterion, format!("no cache entries found ({breakdown})"))
            }
        }
        Err(err) => CriterionResult::fail(
            criterion,
            format!("storage probe failed ({err}); treated as empty"),
        ),
    }
}

/// g: cached content must show up, clean, within the grace window.
pub fn warm_cache_hit(history: &History, grace_snapshots: usize) -> CriterionResult {
    let criterion = Criterion::WarmCacheHit;
    let Some(first) = history.snapshots.first() else {
        return CriterionResult::skip(criterion, "no warm snapshots captured");
    };

    match history
        .snapshots
        .iter()
        .position(|s| s.shows_clean_content())
    {
        Some(0) => CriterionResult::pass(
            criterion,
            "cached content rendered immediately on warm return",
        ),
        Some(index) if index < grace_snapshots => CriterionResult::pass(
            criterion,
            format!(
                "cached content rendered after {index} snapshots ({}ms), within the {grace_snapshots}-snapshot grace window",
                history.snapshots[index].elapsed_ms
            ),
        ),
        Some(index) => CriterionResult::warn(
            criterion,
            format!(
                "content appeared after {index} snapshots ({}ms), beyond the {grace_snapshots}-snapshot grace window",
                history.snapshots[index].elapsed_ms
            ),
        ),
        None if first.has_content => CriterionResult::warn(
            criterion,
            "content present but the skeleton overlay never cleared",
        ),
        None => CriterionResult::fail(
            criterion,
            format!(
                "no cached content rendered in {} warm snapshots",
                history.snapshots.len()
            ),
        ),
    }
}

/// h: warm content must stay put and never fall back to demo data.
pub fn warm_stability(history: &History) -> CriterionResult {
    let criterion = Criterion::WarmStability;
    if history.is_empty() {
        return CriterionResult::skip(criterion, "no warm snapshots captured");
    }

    let demo = history
        .snapshots
        .iter()
        .filter(|s| s.has_demo_indicator)
        .count();
    if demo > 0 {
        return CriterionResult::fail(
            criterion,
            format!(
                "demo indicator reappeared in {demo}/{} warm snapshots",
                history.len()
            ),
        );
    }

    if history.snapshots.iter().all(|s| s.shows_clean_content()) {
        return CriterionResult::pass(
            criterion,
            format!("content stable across all {} warm snapshots", history.len()),
        );
    }

    let regressions = history
        .snapshots
        .windows(2)
        .filter(|pair| pair[0].shows_clean_content() && pair[1].has_skeleton_overlay)
        .count();
    let any_content = history.snapshots.iter().any(|s| s.has_content);

    match (any_content, regressions) {
        (true, 0) => CriterionResult::pass(
            criterion,
            "content present with no skeleton regressions",
        ),
        (true, n) => CriterionResult::warn(
            criterion,
            format!("{n} skeleton regression(s) after content was shown"),
        ),
        (false, _) => CriterionResult::warn(criterion, "no content observed during warm window"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::snapshot::fixtures::{history_of, SnapshotSeq};
    use crate::models::CriterionStatus;
    use crate::surface::StorageTier;

    #[test]
    fn immediate_warm_content_passes_g() {
        let mut seq = SnapshotSeq::new();
        let history = history_of(vec![seq.content(), seq.content()]);

        let result = warm_cache_hit(&history, WARM_GRACE_SNAPSHOTS);
        assert_eq!(result.status, CriterionStatus::Pass);
        assert!(result.details.contains("immediately"));
    }

    #[test]
    fn g_boundary_at_grace_window() {
        let mut seq = SnapshotSeq::new();
        let mut within: Vec<_> = (0..9).map(|_| seq.skeleton()).collect();
        within.push(seq.content());
        assert_eq!(
            warm_cache_hit(&history_of(within), WARM_GRACE_SNAPSHOTS).status,
            CriterionStatus::Pass
        );

        let mut seq = SnapshotSeq::new();
        let mut beyond: Vec<_> = (0..10).map(|_| seq.skeleton()).collect();
        beyond.push(seq.content());
        let result = warm_cache_hit(&history_of(beyond), WARM_GRACE_SNAPSHOTS);
        assert_eq!(result.status, CriterionStatus::Warn);
        assert!(result.details.contains("500ms"));
    }

    #[test]
    fn g_fails_when_content_never_appears() {
        let mut seq = SnapshotSeq::new();
        let history = history_of(vec![seq.skeleton(), seq.skeleton()]);

        assert_eq!(
            warm_cache_hit(&history, WARM_GRACE_SNAPSHOTS).status,
            CriterionStatus::Fail
        );
    }

    #[test]
    fn g_and_h_skip_without_warm_snapshots() {
        let history = history_of(Vec::new());

        assert_eq!(
            warm_cache_hit(&history, WARM_GRACE_SNAPSHOTS).status,
            CriterionStatus::Skip
        );
        assert_eq!(warm_stability(&history).status, CriterionStatus::Skip);
    }

    #[test]
    fn demo_during_warm_fails_h() {
        let mut seq = SnapshotSeq::new();
        let mut demo = seq.content();
        demo.has_demo_indicator = true;
        let history = history_of(vec![seq.content(), demo]);

        assert_eq!(warm_stability(&history).status, CriterionStatus::Fail);
    }

    #[test]
    fn skeleton_regression_warns_h() {
        let mut seq = SnapshotSeq::new();
        let history = history_of(vec![seq.content(), seq.skeleton(), seq.content()]);

        let result = warm_stability(&history);
        assert_eq!(result.status, CriterionStatus::Warn);
        assert!(result.details.starts_with("1 skeleton regression"));
    }

    #[test]
    fn late_but_steady_content_passes_h() {
        let mut seq = SnapshotSeq::new();
        let history = history_of(vec![seq.skeleton(), seq.content(), seq.content()]);

        assert_eq!(warm_stability(&history).status, CriterionStatus::Pass);
    }

    #[test]
    fn f_counts_both_tiers_and_treats_probe_errors_as_empty() {
        let populated = Ok(StorageProbe {
            tiers: vec![
                StorageTier {
                    name: "localStorage".into(),
                    entries: 0,
                },
                StorageTier {
                    name: "indexedDB".into(),
                    entries: 4,
                },
            ],
        });
        assert_eq!(persistent_cache(&populated).status, CriterionStatus::Pass);

        let empty = Ok(StorageProbe::default());
        assert_eq!(persistent_cache(&empty).status, CriterionStatus::Fail);

        let broken = Err("quota error".to_string());
        let result = persistent_cache(&broken);
        assert_eq!(result.status, CriterionStatus::Fail);
        assert!(result.details.contains("treated as empty"));
    }
}
