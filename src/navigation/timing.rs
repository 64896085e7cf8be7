use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::sampling::{SampleMode, Sampler, SamplerConfig, SamplerResolution};
use crate::surface::SurfaceHandle;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone)]
pub struct NavigationConfig {
    pub sampler: SamplerConfig,
    /// How long to wait for the URL to change after a trigger.
    pub url_change_timeout: Duration,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            url_change_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum NavigationScenario {
    ColdNavigation,
    WarmNavigation,
    RapidSequentialClicks,
    BackButton,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationTrigger {
    Click { selector: String },
    Back,
}

/// Wall-clock phases of one route transition. A phase is `None` when the
/// transition never reached it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransitionTiming {
    pub scenario: NavigationScenario,
    pub target_url: String,
    pub click_to_url_ms: Option<u64>,
    pub url_to_first_content_ms: Option<u64>,
    /// URL change to the sampler resolving: every widget loaded and then
    /// held still for the stability window.
    pub url_to_all_stable_ms: Option<u64>,
    pub widgets: usize,
    pub timed_out: bool,
}

/// Repeated transitions for one scenario, starting from `origin` each time.
#[derive(Debug, Clone)]
pub struct ScenarioPlan {
    pub scenario: NavigationScenario,
    pub origin: String,
    /// Links to follow. Rapid clicks use all of them; the other scenarios
    /// use the first.
    pub selectors: Vec<String>,
    pub repetitions: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioRun {
    pub timings: Vec<TransitionTiming>,
    /// Repetitions that could not be driven at all.
    pub errors: Vec<String>,
}

pub struct NavigationTimingHarness {
    surface: SurfaceHandle,
    sampler: Sampler,
    config: NavigationConfig,
    cancel: CancellationToken,
}

impl NavigationTimingHarness {
    pub fn new(surface: SurfaceHandle, config: NavigationConfig) -> Self {
        // Timing only needs the first loaded snapshot per widget.
        let sampler_config = SamplerConfig {
            post_load_samples: 0,
            ..config.sampler.clone()
        };
        Self {
            sampler: Sampler::new(surface.clone(), sampler_config),
            surface,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn wait_for_url_change(&self, from: &str) -> Result<Option<(String, Instant)>> {
        let deadline = Instant::now() + self.config.url_change_timeout;
        loop {
            let url = self.surface.current_url().await?;
            let now = Instant::now();
            if url != from {
                return Ok(Some((url, now)));
            }
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.config.sampler.poll_interval).await;
        }
    }

    async fn fire(&self, trigger: &NavigationTrigger) -> Result<()> {
        match trigger {
            NavigationTrigger::Click { selector } => self.surface.click(selector).await,
            NavigationTrigger::Back => self.surface.go_back().await,
        }
    }

    /// Fire one trigger and time it through to a settled page.
    pub async fn measure(
        &self,
        scenario: NavigationScenario,
        trigger: &NavigationTrigger,
    ) -> Result<TransitionTiming> {
        let before = self.surface.current_url().await?;
        let fired_at = Instant::now();
        self.fire(trigger).await?;
        self.time_from(scenario, &before, fired_at).await
    }

    /// Click every selector back to back, timing from the last click.
    pub async fn rapid_clicks(&self, selectors: &[String]) -> Result<TransitionTiming> {
        let Some((last, rest)) = selectors.split_last() else {
            bail!("rapid click sequence needs at least one selector");
        };
        let before = self.surface.current_url().await?;
        for selector in rest {
            self.surface.click(selector).await?;
        }
        let fired_at = Instant::now();
        self.surface.click(last).await?;
        self.time_from(NavigationScenario::RapidSequentialClicks, &before, fired_at)
            .await
    }

    async fn time_from(
        &self,
        scenario: NavigationScenario,
        before: &str,
        fired_at: Instant,
    ) -> Result<TransitionTiming> {
        let Some((target_url, changed_at)) = self.wait_for_url_change(before).await? else {
            log_warn!(
                "{scenario:?}: URL stayed at {before} for {}ms",
                self.config.url_change_timeout.as_millis()
            );
            return Ok(TransitionTiming {
                scenario,
                target_url: before.to_string(),
                click_to_url_ms: None,
                url_to_first_content_ms: None,
                url_to_all_stable_ms: None,
                widgets: 0,
                timed_out: true,
            });
        };
        let click_to_url_ms = changed_at.duration_since(fired_at).as_millis() as u64;

        let resolution = self
            .sampler
            .sample(&[], SampleMode::UntilLoaded, &self.cancel)
            .await;

        // Snapshot elapsed times are measured from sampler start, which is
        // the URL change.
        let loaded_at: Vec<u64> = resolution
            .population()
            .map(|population| {
                population
                    .histories
                    .values()
                    .filter_map(|history| {
                        let index = history.first_loaded_index()?;
                        Some(history.snapshots[index].elapsed_ms)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let (all_stable, timed_out) = match &resolution {
            SamplerResolution::Complete(population) => {
                (Some(population.elapsed.as_millis() as u64), false)
            }
            SamplerResolution::GenuinelyEmpty { .. } => (None, false),
            SamplerResolution::PartialTimeout(_) => (None, true),
        };

        Ok(TransitionTiming {
            scenario,
            target_url,
            click_to_url_ms: Some(click_to_url_ms),
            url_to_first_content_ms: loaded_at.iter().min().copied(),
            url_to_all_stable_ms: all_stable,
            widgets: resolution.outcome().widgets_sampled,
            timed_out,
        })
    }

    async fn repetition(&self, plan: &ScenarioPlan) -> Result<TransitionTiming> {
        let Some(first) = plan.selectors.first() else {
            bail!("scenario {:?} has no selectors", plan.scenario);
        };
        let click = NavigationTrigger::Click {
            selector: first.clone(),
        };

        match plan.scenario {
            NavigationScenario::ColdNavigation => {
                self.surface.clear_persistent_state().await?;
                self.surface.navigate(&plan.origin).await?;
                self.measure(plan.scenario, &click).await
            }
            NavigationScenario::WarmNavigation => {
                self.surface.navigate(&plan.origin).await?;
                self.measure(plan.scenario, &click).await
            }
            NavigationScenario::RapidSequentialClicks => {
                self.surface.navigate(&plan.origin).await?;
                self.rapid_clicks(&plan.selectors).await
            }
            NavigationScenario::BackButton => {
                self.surface.navigate(&plan.origin).await?;
                self.surface.click(first).await?;
                // Back must leave a committed, settled page, not the origin.
                if self.wait_for_url_change(&plan.origin).await?.is_none() {
                    bail!("{first} never left {}", plan.origin);
                }
                self.sampler
                    .sample(&[], SampleMode::UntilLoaded, &self.cancel)
                    .await;
                self.measure(plan.scenario, &NavigationTrigger::Back).await
            }
        }
    }

    /// Run every repetition of a plan. A repetition that cannot be driven
    /// is recorded and the rest still run.
    pub async fn run_scenario(&self, plan: &ScenarioPlan) -> ScenarioRun {
        let mut run = ScenarioRun::default();

        if plan.scenario == NavigationScenario::WarmNavigation {
            // Prime the cache so every timed repetition is a warm return.
            if let Err(err) = self.repetition(plan).await {
                log_warn!("{:?}: priming failed: {err:#}", plan.scenario);
            }
        }

        for repetition in 0..plan.repetitions {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.repetition(plan).await {
                Ok(timing) => run.timings.push(timing),
                Err(err) => {
                    let message = format!("{:?} #{repetition}: {err:#}", plan.scenario);
                    log_warn!("{message}");
                    run.errors.push(message);
                }
            }
        }

        log_info!(
            "{:?}: {} transitions timed, {} errors",
            plan.scenario,
            run.timings.len(),
            run.errors.len()
        );
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::summarize_timings;
    use crate::surface::scripted::{
        content_frame, skeleton_frame, ScriptedSurface, ScriptedWidget,
    };

    fn fast_config() -> NavigationConfig {
        NavigationConfig {
            sampler: SamplerConfig {
                poll_interval: Duration::from_millis(5),
                hard_timeout: Duration::from_millis(400),
                stability_window: Duration::from_millis(30),
                empty_population_timeout: Duration::from_millis(100),
                max_widgets: 64,
                post_load_samples: 20,
                min_content_text_length: 10,
                verbose: false,
            },
            url_change_timeout: Duration::from_millis(100),
        }
    }

    fn slow_widget(id: &str) -> ScriptedWidget {
        ScriptedWidget::new(
            id,
            "chart",
            vec![skeleton_frame(), skeleton_frame(), skeleton_frame(), content_frame()],
        )
    }

    fn site() -> ScriptedSurface {
        let surface = ScriptedSurface::new();
        surface.add_page(
            "/home",
            vec![ScriptedWidget::new("nav", "menu", vec![content_frame()])],
            Vec::new(),
        );
        surface.add_page(
            "/clusters",
            vec![slow_widget("c-1"), slow_widget("c-2").appearing_after(2)],
            vec![
                ScriptedWidget::new("c-1", "chart", vec![content_frame()]),
                ScriptedWidget::new("c-2", "chart", vec![content_frame()]),
            ],
        );
        surface.add_page("/pods", vec![slow_widget("p-1")], Vec::new());
        surface.add_link("#clusters", "/clusters");
        surface.add_link("#pods", "/pods");
        surface
    }

    #[tokio::test]
    async fn click_is_timed_through_to_stable_content() {
        let surface = site();
        let handle = SurfaceHandle::spawn(surface).unwrap();
        handle.navigate("/home").await.unwrap();
        let harness = NavigationTimingHarness::new(handle, fast_config());

        let timing = harness
            .measure(
                NavigationScenario::ColdNavigation,
                &NavigationTrigger::Click {
                    selector: "#clusters".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(timing.target_url, "/clusters");
        assert!(!timing.timed_out);
        assert_eq!(timing.widgets, 2);
        let first = timing.url_to_first_content_ms.unwrap();
        let all = timing.url_to_all_stable_ms.unwrap();
        assert!(first > 0);
        assert!(all > first);
    }

    #[tokio::test]
    async fn all_stable_includes_the_stability_window() {
        let surface = site();
        let handle = SurfaceHandle::spawn(surface).unwrap();
        handle.navigate("/home").await.unwrap();
        let harness = NavigationTimingHarness::new(handle, fast_config());

        let timing = harness
            .measure(
                NavigationScenario::WarmNavigation,
                &NavigationTrigger::Click {
                    selector: "#pods".into(),
                },
            )
            .await
            .unwrap();

        // p-1 loads on its fourth scan; resolving also needs a still 30ms.
        let first = timing.url_to_first_content_ms.unwrap();
        let all = timing.url_to_all_stable_ms.unwrap();
        assert!(all >= first);
        assert!(all >= 30);
    }

    #[tokio::test]
    async fn dead_link_reports_url_timeout_without_error() {
        let surface = site();
        surface.add_link("#nowhere", "/home");
        let handle = SurfaceHandle::spawn(surface).unwrap();
        handle.navigate("/home").await.unwrap();
        let harness = NavigationTimingHarness::new(handle, fast_config());

        let timing = harness
            .measure(
                NavigationScenario::ColdNavigation,
                &NavigationTrigger::Click {
                    selector: "#nowhere".into(),
                },
            )
            .await
            .unwrap();

        assert!(timing.timed_out);
        assert_eq!(timing.click_to_url_ms, None);
    }

    #[tokio::test]
    async fn warm_scenario_is_faster_than_cold() {
        let surface = site();
        let handle = SurfaceHandle::spawn(surface).unwrap();
        let harness = NavigationTimingHarness::new(handle, fast_config());

        let plan = |scenario| ScenarioPlan {
            scenario,
            origin: "/home".into(),
            selectors: vec!["#clusters".into()],
            repetitions: 2,
        };
        let cold = harness.run_scenario(&plan(NavigationScenario::ColdNavigation)).await;
        let warm = harness.run_scenario(&plan(NavigationScenario::WarmNavigation)).await;

        assert!(cold.errors.is_empty());
        assert!(warm.errors.is_empty());
        let mut timings = cold.timings;
        timings.extend(warm.timings);
        let stats = summarize_timings(&timings);

        assert_eq!(stats.len(), 2);
        let cold_first = stats[0].url_to_first_content.as_ref().unwrap();
        let warm_first = stats[1].url_to_first_content.as_ref().unwrap();
        assert_eq!(cold_first.samples, 2);
        assert!(warm_first.max < cold_first.min);
    }

    #[tokio::test]
    async fn back_button_returns_to_origin() {
        let surface = site();
        let handle = SurfaceHandle::spawn(surface.clone()).unwrap();
        let harness = NavigationTimingHarness::new(handle, fast_config());

        let run = harness
            .run_scenario(&ScenarioPlan {
                scenario: NavigationScenario::BackButton,
                origin: "/home".into(),
                selectors: vec!["#pods".into()],
                repetitions: 1,
            })
            .await;

        assert_eq!(run.timings.len(), 1);
        assert_eq!(run.timings[0].target_url, "/home");
        assert_eq!(surface.navigations(), vec!["/home", "/pods", "/home"]);
    }

    #[tokio::test]
    async fn back_button_waits_for_a_slow_forward_navigation() {
        let surface = site();
        surface.delay_click_commits(3);
        let handle = SurfaceHandle::spawn(surface.clone()).unwrap();
        let harness = NavigationTimingHarness::new(handle, fast_config());

        let run = harness
            .run_scenario(&ScenarioPlan {
                scenario: NavigationScenario::BackButton,
                origin: "/home".into(),
                selectors: vec!["#pods".into()],
                repetitions: 1,
            })
            .await;

        assert!(run.errors.is_empty());
        assert_eq!(run.timings[0].target_url, "/home");
        assert!(!run.timings[0].timed_out);
        assert_eq!(surface.navigations(), vec!["/home", "/pods", "/home"]);
    }

    #[tokio::test]
    async fn rapid_clicks_land_on_the_last_target() {
        let surface = site();
        let handle = SurfaceHandle::spawn(surface).unwrap();
        let harness = NavigationTimingHarness::new(handle, fast_config());

        let run = harness
            .run_scenario(&ScenarioPlan {
                scenario: NavigationScenario::RapidSequentialClicks,
                origin: "/home".into(),
                selectors: vec!["#clusters".into(), "#pods".into()],
                repetitions: 1,
            })
            .await;

        assert_eq!(run.timings[0].target_url, "/pods");
        assert_eq!(run.timings[0].scenario, NavigationScenario::RapidSequentialClicks);
    }

    #[tokio::test]
    async fn plan_without_selectors_records_errors() {
        let handle = SurfaceHandle::spawn(site()).unwrap();
        let harness = NavigationTimingHarness::new(handle, fast_config());

        let run = harness
            .run_scenario(&ScenarioPlan {
                scenario: NavigationScenario::ColdNavigation,
                origin: "/home".into(),
                selectors: Vec::new(),
                repetitions: 2,
            })
            .await;

        assert!(run.timings.is_empty());
        assert_eq!(run.errors.len(), 2);
    }
}
