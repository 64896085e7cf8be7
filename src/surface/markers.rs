//! Raw marker payloads as read off the rendered page, and the reader that
//! turns them into immutable Snapshots.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Snapshot;

/// Element kinds that count as visual content when present in a widget.
pub const VISUAL_CONTENT_TAGS: [&str; 7] =
    ["canvas", "svg", "iframe", "table", "img", "video", "code"];

/// Markers for one widget exactly as the in-page probe reports them.
///
/// `loading` is the only required field; a payload without it is treated as
/// an unreadable widget for that tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawMarkers {
    pub loading: bool,
    #[serde(default)]
    pub effective_loading: Option<bool>,
    #[serde(default)]
    pub demo: bool,
    #[serde(default)]
    pub stale: bool,
    #[serde(default)]
    pub skeleton: bool,
    #[serde(default)]
    pub refreshing: bool,
    #[serde(default)]
    pub text_length: usize,
    #[serde(default)]
    pub visual_elements: Vec<String>,
}

impl RawMarkers {
    pub fn has_visual_content(&self) -> bool {
        self.visual_elements.iter().any(|tag| {
            let tag = tag.to_ascii_lowercase();
            VISUAL_CONTENT_TAGS.contains(&tag.as_str())
        })
    }
}

/// Where a snapshot sits within its sampler run.
#[derive(Debug, Clone, Copy)]
pub struct TickStamp {
    pub tick: u64,
    pub elapsed_ms: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SnapshotReader {
    min_content_text_length: usize,
}

impl SnapshotReader {
    pub fn new(min_content_text_length: usize) -> Self {
        Self {
            min_content_text_length,
        }
    }

    pub fn read(&self, payload: &Value, stamp: TickStamp) -> Result<Snapshot> {
        let raw: RawMarkers =
            serde_json::from_value(payload.clone()).context("malformed widget markers")?;
        Ok(self.snapshot_from(&raw, stamp))
    }

    pub fn snapshot_from(&self, raw: &RawMarkers, stamp: TickStamp) -> Snapshot {
        let has_visual_content = raw.has_visual_content();
        let has_content =
            has_visual_content || raw.text_length >= self.min_content_text_length.max(1);

        Snapshot {
            timestamp: stamp.timestamp,
            elapsed_ms: stamp.elapsed_ms,
            tick: stamp.tick,
            loading_flag: raw.loading,
            effective_loading_flag: raw.effective_loading.unwrap_or(raw.loading),
            has_demo_indicator: raw.demo,
            has_cache_contamination_marker: raw.stale,
            has_skeleton_overlay: raw.skeleton,
            has_spinning_refresh_indicator: raw.refreshing,
            text_content_length: raw.text_length,
            has_visual_content,
            has_content,
        }
    }
}
