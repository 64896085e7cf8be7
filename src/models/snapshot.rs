//! Snapshot and History data models.
//!
//! A Snapshot is what one poll tick saw for one widget. A History is the
//! tick-ordered run of Snapshots for one widget within a single sampler run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable markers read for one widget at one tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    /// Milliseconds since the sampler run started.
    pub elapsed_ms: u64,
    pub tick: u64,
    pub loading_flag: bool,
    pub effective_loading_flag: bool,
    pub has_demo_indicator: bool,
    pub has_cache_contamination_marker: bool,
    pub has_skeleton_overlay: bool,
    pub has_spinning_refresh_indicator: bool,
    pub text_content_length: usize,
    pub has_visual_content: bool,
    /// Visual content, or enough rendered text to count as content. Derived
    /// by the reader at capture time.
    pub has_content: bool,
}

impl Snapshot {
    /// Terminal "loaded" state: real content, nothing still loading on top.
    pub fn is_loaded(&self) -> bool {
        self.has_content && !self.effective_loading_flag && !self.has_skeleton_overlay
    }

    /// Content is visible without a skeleton covering it.
    pub fn shows_clean_content(&self) -> bool {
        self.has_content && !self.has_skeleton_overlay
    }

    pub fn shows_fallback_data(&self) -> bool {
        self.has_demo_indicator || self.has_cache_contamination_marker
    }
}

/// Static identity of a widget as the manifest describes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDescriptor {
    pub widget_id: String,
    pub widget_type: String,
    /// Key that identifies this widget's stream endpoint, when it has one.
    #[serde(default)]
    pub data_source: Option<String>,
}

impl WidgetDescriptor {
    pub fn new(widget_id: impl Into<String>, widget_type: impl Into<String>) -> Self {
        Self {
            widget_id: widget_id.into(),
            widget_type: widget_type.into(),
            data_source: None,
        }
    }

    pub fn with_data_source(mut self, source: impl Into<String>) -> Self {
        self.data_source = Some(source.into());
        self
    }

    /// Stream URLs are matched against the data source, or the type if unset.
    pub fn stream_key(&self) -> &str {
        self.data_source.as_deref().unwrap_or(&self.widget_type)
    }
}

/// Ordered Snapshots for one widget within one sampler run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct History {
    pub widget_id: String,
    pub widget_type: String,
    pub snapshots: Vec<Snapshot>,
    /// Set when the run ended on its hard timeout before this widget loaded.
    pub timed_out: bool,
    /// Ticks where the widget was discovered but its markers could not be read.
    pub missed_reads: u32,
}

impl History {
    pub fn new(widget_id: impl Into<String>, widget_type: impl Into<String>) -> Self {
        Self {
            widget_id: widget_id.into(),
            widget_type: widget_type.into(),
            snapshots: Vec::new(),
            timed_out: false,
            missed_reads: 0,
        }
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn first_loaded_index(&self) -> Option<usize> {
        self.snapshots.iter().position(Snapshot::is_loaded)
    }

    pub fn is_terminal(&self) -> bool {
        self.first_loaded_index().is_some()
    }

    /// Number of snapshots recorded after the first loaded one.
    pub fn post_load_len(&self) -> usize {
        self.first_loaded_index()
            .map(|index| self.snapshots.len() - index - 1)
            .unwrap_or(0)
    }

    pub fn loading_snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter().filter(|s| s.effective_loading_flag)
    }

    /// Snapshots must be strictly ordered by tick and never go back in time.
    pub fn validate(&self) -> Result<(), String> {
        for pair in self.snapshots.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.tick <= prev.tick {
                return Err(format!(
                    "snapshot ticks out of order ({} after {})",
                    next.tick, prev.tick
                ));
            }
            if next.timestamp < prev.timestamp || next.elapsed_ms < prev.elapsed_ms {
                return Err(format!(
                    "snapshot timestamps go backwards at tick {}",
                    next.tick
                ));
            }
        }
        Ok(())
    }
}
