use serde::Serialize;
use std::collections::BTreeMap;

use super::timing::{NavigationScenario, TransitionTiming};

fn rank_index(len: usize, pct: usize) -> usize {
    // ceil(len * pct / 100), then 0-based.
    let rank = len.saturating_mul(pct).saturating_add(99) / 100;
    rank.saturating_sub(1).min(len.saturating_sub(1))
}

/// Nearest-rank percentile over an ascending slice.
pub fn percentile(sorted: &[u64], pct: usize) -> Option<u64> {
    if sorted.is_empty() {
        return None;
    }
    Some(sorted[rank_index(sorted.len(), pct)])
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhaseStats {
    pub samples: usize,
    pub min: u64,
    pub p50: u64,
    pub p90: u64,
    pub p95: u64,
    pub p99: u64,
    pub max: u64,
}

impl PhaseStats {
    pub fn from_samples(mut samples: Vec<u64>) -> Option<Self> {
        samples.sort_unstable();
        Some(Self {
            samples: samples.len(),
            min: *samples.first()?,
            p50: percentile(&samples, 50)?,
            p90: percentile(&samples, 90)?,
            p95: percentile(&samples, 95)?,
            p99: percentile(&samples, 99)?,
            max: *samples.last()?,
        })
    }
}

/// Phase percentiles for one scenario. Timed-out transitions count toward
/// `timed_out` and contribute only the phases they completed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioStats {
    pub scenario: NavigationScenario,
    pub transitions: usize,
    pub timed_out: usize,
    pub click_to_url: Option<PhaseStats>,
    pub url_to_first_content: Option<PhaseStats>,
    pub url_to_all_stable: Option<PhaseStats>,
}

pub fn summarize_timings(timings: &[TransitionTiming]) -> Vec<ScenarioStats> {
    let mut grouped: BTreeMap<NavigationScenario, Vec<&TransitionTiming>> = BTreeMap::new();
    for timing in timings {
        grouped.entry(timing.scenario).or_default().push(timing);
    }

    grouped
        .into_iter()
        .map(|(scenario, group)| {
            let phase = |pick: fn(&TransitionTiming) -> Option<u64>| {
                PhaseStats::from_samples(group.iter().filter_map(|t| pick(t)).collect())
            };
            ScenarioStats {
                scenario,
                transitions: group.len(),
                timed_out: group.iter().filter(|t| t.timed_out).count(),
                click_to_url: phase(|t| t.click_to_url_ms),
                url_to_first_content: phase(|t| t.url_to_first_content_ms),
                url_to_all_stable: phase(|t| t.url_to_all_stable_ms),
            }
        })
        .collect()
}
