use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::{History, RegimeOutcome, ResolutionKind, WidgetDescriptor};
use crate::surface::{ScannedWidget, SnapshotReader, SurfaceHandle, TickStamp};

use super::stability::PopulationTracker;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const SCAN_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub poll_interval: Duration,
    pub hard_timeout: Duration,
    pub stability_window: Duration,
    pub empty_population_timeout: Duration,
    pub max_widgets: usize,
    pub post_load_samples: usize,
    pub min_content_text_length: usize,
    pub verbose: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            hard_timeout: Duration::from_secs(20),
            stability_window: Duration::from_millis(500),
            empty_population_timeout: Duration::from_secs(8),
            max_widgets: 64,
            post_load_samples: 20,
            min_content_text_length: 10,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    /// Freeze each widget at its first loaded snapshot (plus the post-load
    /// budget) and resolve once everything is loaded and the population is
    /// stable, or on the hard timeout.
    UntilLoaded,
    /// Read every widget on every tick for a fixed window. Used for warm
    /// returns, where content is expected almost immediately.
    FixedWindow(Duration),
}

/// Histories gathered by one sampler run.
#[derive(Debug, Clone, Default)]
pub struct SampledPopulation {
    pub histories: BTreeMap<String, History>,
    /// Expected widget ids that never showed up.
    pub never_discovered: Vec<String>,
    pub ticks: u64,
    pub elapsed: Duration,
}

impl SampledPopulation {
    pub fn history(&self, widget_id: &str) -> Option<&History> {
        self.histories.get(widget_id)
    }

    pub fn timed_out_ids(&self) -> Vec<&str> {
        self.histories
            .values()
            .filter(|history| history.timed_out)
            .map(|history| history.widget_id.as_str())
            .collect()
    }
}

/// How a sampler run ended. Callers must handle all three outcomes.
#[derive(Debug, Clone)]
pub enum SamplerResolution {
    /// Every tracked widget loaded and the population held still.
    Complete(SampledPopulation),
    /// Nothing ever mounted: a stable empty page, not a slow one.
    GenuinelyEmpty { ticks: u64, elapsed: Duration },
    /// The hard timeout (or cancellation) hit first; widgets that never
    /// loaded are marked `timed_out`.
    PartialTimeout(SampledPopulation),
}

impl SamplerResolution {
    pub fn kind(&self) -> ResolutionKind {
        match self {
            SamplerResolution::Complete(_) => ResolutionKind::Complete,
            SamplerResolution::GenuinelyEmpty { .. } => ResolutionKind::GenuinelyEmpty,
            SamplerResolution::PartialTimeout(_) => ResolutionKind::PartialTimeout,
        }
    }

    pub fn population(&self) -> Option<&SampledPopulation> {
        match self {
            SamplerResolution::Complete(population)
            | SamplerResolution::PartialTimeout(population) => Some(population),
            SamplerResolution::GenuinelyEmpty { .. } => None,
        }
    }

    pub fn history(&self, widget_id: &str) -> Option<&History> {
        self.population()
            .and_then(|population| population.history(widget_id))
    }

    pub fn outcome(&self) -> RegimeOutcome {
        let (ticks, elapsed, widgets_sampled) = match self {
            SamplerResolution::Complete(population)
            | SamplerResolution::PartialTimeout(population) => (
                population.ticks,
                population.elapsed,
                population.histories.len(),
            ),
            SamplerResolution::GenuinelyEmpty { ticks, elapsed } => (*ticks, *elapsed, 0),
        };

        RegimeOutcome {
            resolution: self.kind(),
            ticks,
            elapsed_ms: elapsed.as_millis() as u64,
            widgets_sampled,
        }
    }
}

enum RunEnd {
    Complete,
    Empty,
    TimedOut,
    Cancelled,
}

/// Sampling state for exactly one run: created when the run starts and
/// consumed when it resolves.
struct SamplingSession {
    started_at: Instant,
    /// Wall time at start. Tick timestamps are this plus monotonic elapsed,
    /// so a clock step mid-run cannot reorder them.
    started_wall: DateTime<Utc>,
    tick: u64,
    tracker: PopulationTracker,
    histories: BTreeMap<String, History>,
    expected: Vec<String>,
    expected_filter: Option<HashSet<String>>,
}

impl SamplingSession {
    fn start(expected: &[WidgetDescriptor], config: &SamplerConfig, now: Instant) -> Self {
        let expected_ids: Vec<String> = expected.iter().map(|w| w.widget_id.clone()).collect();
        let expected_filter = if expected_ids.is_empty() {
            None
        } else {
            Some(expected_ids.iter().cloned().collect())
        };

        Self {
            started_at: now,
            started_wall: Utc::now(),
            tick: 0,
            tracker: PopulationTracker::new(
                now.into_std(),
                config.stability_window,
                config.empty_population_timeout,
            ),
            histories: BTreeMap::new(),
            expected: expected_ids,
            expected_filter,
        }
    }

    fn frozen_ids(&self, mode: SampleMode, post_load_samples: usize) -> HashSet<String> {
        match mode {
            SampleMode::FixedWindow(_) => HashSet::new(),
            SampleMode::UntilLoaded => self
                .histories
                .values()
                .filter(|history| {
                    history.is_terminal() && history.post_load_len() >= post_load_samples
                })
                .map(|history| history.widget_id.clone())
                .collect(),
        }
    }

    fn stamp(&self, now: Instant) -> TickStamp {
        let elapsed_ms = now.duration_since(self.started_at).as_millis() as u64;
        TickStamp {
            tick: self.tick,
            elapsed_ms,
            timestamp: self.started_wall + chrono::Duration::milliseconds(elapsed_ms as i64),
        }
    }

    fn ingest(
        &mut self,
        scanned: Vec<ScannedWidget>,
        frozen: &HashSet<String>,
        reader: &SnapshotReader,
        now: Instant,
        verbose: bool,
    ) {
        let discovered = scanned.len();
        if self.tracker.observe(discovered, now.into_std()) && verbose {
            log_debug!("tick {}: population changed to {}", self.tick, discovered);
        }

        let stamp = self.stamp(now);
        let mut seen = HashSet::with_capacity(discovered);

        for widget in scanned {
            if let Some(filter) = &self.expected_filter {
                if !filter.contains(&widget.widget_id) {
                    continue;
                }
            }
            if !seen.insert(widget.widget_id.clone()) {
                continue;
            }

            let history = self
                .histories
                .entry(widget.widget_id.clone())
                .or_insert_with(|| {
                    History::new(widget.widget_id.clone(), widget.widget_type.clone())
                });

            match widget.markers {
                Some(payload) => match reader.read(&payload, stamp) {
                    Ok(snapshot) => history.push(snapshot),
                    Err(err) => {
                        history.missed_reads += 1;
                        log_debug!("tick {}: {} unreadable: {err:#}", self.tick, widget.widget_id);
                    }
                },
                None if frozen.contains(&widget.widget_id) => {}
                None => {
                    history.missed_reads += 1;
                    log_debug!("tick {}: {} vanished mid-read", self.tick, widget.widget_id);
                }
            }
        }
    }

    fn check(&self, mode: SampleMode, config: &SamplerConfig, now: Instant) -> Option<RunEnd> {
        let elapsed = now.duration_since(self.started_at);
        let std_now = now.into_std();

        match mode {
            SampleMode::UntilLoaded => {
                let all_loaded = !self.histories.is_empty()
                    && self.histories.values().all(History::is_terminal);
                if all_loaded && self.tracker.is_stable(std_now) {
                    return Some(RunEnd::Complete);
                }
                if self.histories.is_empty() && self.tracker.is_genuinely_empty(std_now) {
                    return Some(RunEnd::Empty);
                }
                (elapsed >= config.hard_timeout).then_some(RunEnd::TimedOut)
            }
            SampleMode::FixedWindow(window) => {
                if elapsed < window {
                    return None;
                }
                if self.histories.is_empty() && !self.tracker.ever_discovered() {
                    Some(RunEnd::Empty)
                } else {
                    Some(RunEnd::Complete)
                }
            }
        }
    }

    fn finish(mut self, end: RunEnd, now: Instant) -> SamplerResolution {
        let elapsed = now.duration_since(self.started_at);
        let never_discovered = self
            .expected
            .iter()
            .filter(|id| !self.histories.contains_key(*id))
            .cloned()
            .collect();

        if matches!(end, RunEnd::TimedOut | RunEnd::Cancelled) {
            for history in self.histories.values_mut() {
                if !history.is_terminal() {
                    history.timed_out = true;
                }
            }
        }

        let population = SampledPopulation {
            histories: self.histories,
            never_discovered,
            ticks: self.tick,
            elapsed,
        };

        match end {
            RunEnd::Complete => SamplerResolution::Complete(population),
            RunEnd::Empty => SamplerResolution::GenuinelyEmpty {
                ticks: population.ticks,
                elapsed,
            },
            RunEnd::TimedOut | RunEnd::Cancelled => SamplerResolution::PartialTimeout(population),
        }
    }
}

/// Single cooperative polling loop over a page surface.
#[derive(Clone)]
pub struct Sampler {
    surface: SurfaceHandle,
    reader: SnapshotReader,
    config: SamplerConfig,
}

impl Sampler {
    pub fn new(surface: SurfaceHandle, config: SamplerConfig) -> Self {
        Self {
            reader: SnapshotReader::new(config.min_content_text_length),
            surface,
            config,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample until the run resolves. `expected` restricts tracking to those
    /// widget ids; an empty slice tracks everything discovered.
    pub async fn sample(
        &self,
        expected: &[WidgetDescriptor],
        mode: SampleMode,
        cancel: &CancellationToken,
    ) -> SamplerResolution {
        let mut session = SamplingSession::start(expected, &self.config, Instant::now());
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let scan_timeout = Duration::from_millis(SCAN_TIMEOUT_MS);

        log_info!(
            "sampler started: {} expected widgets, mode {:?}, poll {}ms",
            expected.len(),
            mode,
            self.config.poll_interval.as_millis()
        );

        let resolution = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let frozen = session.frozen_ids(mode, self.config.post_load_samples);
                    let scan = self.surface.scan(self.config.max_widgets, frozen.clone());

                    match tokio::time::timeout(scan_timeout, scan).await {
                        Ok(Ok(widgets)) => session.ingest(
                            widgets,
                            &frozen,
                            &self.reader,
                            Instant::now(),
                            self.config.verbose,
                        ),
                        Ok(Err(err)) => log_warn!("tick {}: scan failed: {err:#}", session.tick),
                        Err(_) => log_warn!(
                            "tick {}: scan timeout (> {}ms)",
                            session.tick,
                            SCAN_TIMEOUT_MS
                        ),
                    }
                    session.tick += 1;

                    let now = Instant::now();
                    if let Some(end) = session.check(mode, &self.config, now) {
                        break session.finish(end, now);
                    }
                }
                _ = cancel.cancelled() => {
                    log_info!("sampler cancelled after {} ticks", session.tick);
                    break session.finish(RunEnd::Cancelled, Instant::now());
                }
            }
        };

        let outcome = resolution.outcome();
        log_info!(
            "sampler resolved {:?} after {} ticks ({}ms), {} widgets",
            outcome.resolution,
            outcome.ticks,
            outcome.elapsed_ms,
            outcome.widgets_sampled
        );
        if let SamplerResolution::PartialTimeout(population) = &resolution {
            let timed_out = population.timed_out_ids();
            if !timed_out.is_empty() {
                log_warn!("widgets without a loaded snapshot: {}", timed_out.join(", "));
            }
        }

        resolution
    }
}
