//! Scripted in-memory page used by the test suites. Widgets replay marker
//! frames indexed by how many scans have happened since navigation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use serde_json::{json, Value};

use super::bridge::{PageSurface, ScannedWidget, StorageProbe, StorageTier};

pub(crate) fn skeleton_frame() -> Value {
    json!({ "loading": true, "skeleton": true, "refreshing": true })
}

pub(crate) fn demo_loading_frame() -> Value {
    json!({ "loading": true, "skeleton": true, "demo": true, "textLength": 120 })
}

pub(crate) fn content_frame() -> Value {
    json!({ "loading": false, "textLength": 240, "visualElements": ["svg"] })
}

pub(crate) fn refreshing_content_frame() -> Value {
    json!({ "loading": false, "refreshing": true, "textLength": 240, "visualElements": ["svg"] })
}

pub(crate) fn demo_content_frame() -> Value {
    json!({ "loading": false, "demo": true, "textLength": 240, "visualElements": ["svg"] })
}

#[derive(Debug, Clone)]
pub(crate) struct ScriptedWidget {
    pub id: String,
    pub widget_type: String,
    /// Scans after navigation before the widget mounts.
    pub appears_after: u64,
    /// Frames by scans since mount; the last frame repeats.
    pub frames: Vec<Value>,
    /// Frame indices where the widget is discovered but unreadable.
    pub unreadable_at: Vec<u64>,
}

impl ScriptedWidget {
    pub fn new(id: &str, widget_type: &str, frames: Vec<Value>) -> Self {
        Self {
            id: id.into(),
            widget_type: widget_type.into(),
            appears_after: 0,
            frames,
            unreadable_at: Vec::new(),
        }
    }

    pub fn appearing_after(mut self, scans: u64) -> Self {
        self.appears_after = scans;
        self
    }

    pub fn unreadable_at(mut self, frames: Vec<u64>) -> Self {
        self.unreadable_at = frames;
        self
    }

    fn frame(&self, index: u64) -> Option<Value> {
        if self.unreadable_at.contains(&index) {
            return None;
        }
        let last = self.frames.len().checked_sub(1)?;
        self.frames.get((index as usize).min(last)).cloned()
    }
}

#[derive(Debug, Clone, Default)]
struct ScriptedPage {
    cold: Vec<ScriptedWidget>,
    warm: Vec<ScriptedWidget>,
    stream_urls: Vec<String>,
}

#[derive(Debug)]
struct ScriptState {
    pages: HashMap<String, ScriptedPage>,
    cached_pages: HashSet<String>,
    entries_per_page: usize,
    current_url: String,
    back_stack: Vec<String>,
    active: Vec<ScriptedWidget>,
    scans_since_nav: u64,
    stream_log: Vec<String>,
    links: HashMap<String, String>,
    broken_urls: HashSet<String>,
    probe_fails: bool,
    navigations: Vec<String>,
    clears: usize,
    /// URL reads and scans a click takes to commit.
    click_commit_delay: u32,
    pending_click: Option<(String, u32)>,
}

#[derive(Debug, Clone)]
pub(crate) struct ScriptedSurface {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedSurface {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                pages: HashMap::new(),
                cached_pages: HashSet::new(),
                entries_per_page: 3,
                current_url: "about:blank".into(),
                back_stack: Vec::new(),
                active: Vec::new(),
                scans_since_nav: 0,
                stream_log: Vec::new(),
                links: HashMap::new(),
                broken_urls: HashSet::new(),
                probe_fails: false,
                navigations: Vec::new(),
                clears: 0,
                click_commit_delay: 0,
                pending_click: None,
            })),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut ScriptState) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Register a page. An empty `warm` list replays `cold` on warm returns.
    pub fn add_page(&self, url: &str, cold: Vec<ScriptedWidget>, warm: Vec<ScriptedWidget>) {
        self.with_state(|state| {
            state.pages.insert(
                url.into(),
                ScriptedPage {
                    cold,
                    warm,
                    stream_urls: Vec::new(),
                },
            );
        });
    }

    pub fn set_stream_urls(&self, url: &str, stream_urls: Vec<&str>) {
        self.with_state(|state| {
            if let Some(page) = state.pages.get_mut(url) {
                page.stream_urls = stream_urls.into_iter().map(String::from).collect();
            }
        });
    }

    pub fn add_link(&self, selector: &str, url: &str) {
        self.with_state(|state| {
            state.links.insert(selector.into(), url.into());
        });
    }

    pub fn break_url(&self, url: &str) {
        self.with_state(|state| {
            state.broken_urls.insert(url.into());
        });
    }

    pub fn set_entries_per_page(&self, entries: usize) {
        self.with_state(|state| state.entries_per_page = entries);
    }

    pub fn fail_storage_probe(&self) {
        self.with_state(|state| state.probe_fails = true);
    }

    /// Clicks leave the URL unchanged until `polls` URL reads or scans later.
    pub fn delay_click_commits(&self, polls: u32) {
        self.with_state(|state| state.click_commit_delay = polls);
    }

    pub fn navigations(&self) -> Vec<String> {
        self.with_state(|state| state.navigations.clone())
    }

    pub fn clears(&self) -> usize {
        self.with_state(|state| state.clears)
    }

    fn commit(state: &mut ScriptState, url: &str) {
        let previous = state.current_url.clone();
        state.back_stack.push(previous);
        Self::load(state, url);
    }

    fn advance_pending_click(state: &mut ScriptState) {
        let Some((url, remaining)) = state.pending_click.take() else {
            return;
        };
        if remaining <= 1 {
            Self::commit(state, &url);
        } else {
            state.pending_click = Some((url, remaining - 1));
        }
    }

    fn load(state: &mut ScriptState, url: &str) {
        state.current_url = url.into();
        state.scans_since_nav = 0;
        state.navigations.push(url.into());

        match state.pages.get(url) {
            Some(page) => {
                let warm = state.cached_pages.contains(url) && !page.warm.is_empty();
                state.active = if warm {
                    page.warm.clone()
                } else {
                    page.cold.clone()
                };
                state.stream_log = page.stream_urls.clone();
                state.cached_pages.insert(url.into());
            }
            None => {
                state.active.clear();
                state.stream_log.clear();
            }
        }
    }
}

impl PageSurface for ScriptedSurface {
    fn scan(
        &mut self,
        max_widgets: usize,
        skip_reads: &HashSet<String>,
    ) -> Result<Vec<ScannedWidget>> {
        Ok(self.with_state(|state| {
            Self::advance_pending_click(state);
            let index = state.scans_since_nav;
            state.scans_since_nav += 1;

            state
                .active
                .iter()
                .filter(|widget| index >= widget.appears_after)
                .take(max_widgets)
                .map(|widget| ScannedWidget {
                    widget_id: widget.id.clone(),
                    widget_type: widget.widget_type.clone(),
                    markers: if skip_reads.contains(&widget.id) {
                        None
                    } else {
                        widget.frame(index - widget.appears_after)
                    },
                })
                .collect()
        }))
    }

    fn navigate(&mut self, url: &str) -> Result<()> {
        self.with_state(|state| {
            if state.broken_urls.contains(url) {
                bail!("navigation to {url} failed");
            }
            state.pending_click = None;
            Self::commit(state, url);
            Ok(())
        })
    }

    fn clear_persistent_state(&mut self) -> Result<()> {
        self.with_state(|state| {
            state.cached_pages.clear();
            state.clears += 1;
        });
        Ok(())
    }

    fn probe_storage(&mut self) -> Result<StorageProbe> {
        self.with_state(|state| {
            if state.probe_fails {
                bail!("storage tiers unavailable");
            }
            let entries = state.cached_pages.len() * state.entries_per_page;
            Ok(StorageProbe {
                tiers: vec![
                    StorageTier {
                        name: "localStorage".into(),
                        entries: entries / 2,
                    },
                    StorageTier {
                        name: "indexedDB".into(),
                        entries: entries - entries / 2,
                    },
                ],
            })
        })
    }

    fn stream_requests(&mut self) -> Result<Vec<String>> {
        Ok(self.with_state(|state| state.stream_log.clone()))
    }

    fn current_url(&mut self) -> Result<String> {
        Ok(self.with_state(|state| {
            Self::advance_pending_click(state);
            state.current_url.clone()
        }))
    }

    fn click(&mut self, selector: &str) -> Result<()> {
        let target = self
            .with_state(|state| state.links.get(selector).cloned())
            .ok_or_else(|| anyhow!("no element matches {selector}"))?;
        let delay = self.with_state(|state| state.click_commit_delay);
        if delay == 0 {
            return self.navigate(&target);
        }
        self.with_state(|state| {
            if state.broken_urls.contains(&target) {
                bail!("navigation to {target} failed");
            }
            state.pending_click = Some((target, delay));
            Ok(())
        })
    }

    fn go_back(&mut self) -> Result<()> {
        self.with_state(|state| {
            // An uncommitted click is abandoned, like a browser back mid-load.
            state.pending_click = None;
            let previous = state
                .back_stack
                .pop()
                .ok_or_else(|| anyhow!("history is empty"))?;
            Self::load(state, &previous);
            Ok(())
        })
    }
}
