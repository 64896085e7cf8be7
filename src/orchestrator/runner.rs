use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::criteria::{
    evaluate_cold, evaluate_warm, never_rendered, persistent_cache, WARM_GRACE_SNAPSHOTS,
};
use crate::models::{
    BatchResult, Criterion, CriterionResult, RegimeOutcome, ResolutionKind,
    WidgetComplianceResult, WidgetDescriptor,
};
use crate::sampling::{SampleMode, Sampler, SamplerConfig, SamplerResolution};
use crate::surface::SurfaceHandle;

use super::batches::{batch_route, partition, BatchPlan, ManifestProvider};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Order in which the two cache regimes visit the batches.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RegimeSchedule {
    /// Every batch cold, navigate away once, then every batch warm in the
    /// same order.
    #[default]
    Phased,
    /// Per batch: cold, navigate away, warm. Keeps each batch's cache intact
    /// for its warm pass when the page clears storage per batch.
    Interleaved,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub sampler: SamplerConfig,
    pub batch_size: usize,
    pub warm_wait: Duration,
    pub warm_grace_snapshots: usize,
    pub batch_route_template: String,
    pub away_route: String,
    pub schedule: RegimeSchedule,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            batch_size: 24,
            warm_wait: Duration::from_millis(3_000),
            warm_grace_snapshots: WARM_GRACE_SNAPSHOTS,
            batch_route_template: "/?complianceBatch={index}&batchSize={size}".into(),
            away_route: "about:blank".into(),
            schedule: RegimeSchedule::default(),
        }
    }
}

/// Everything one cold+warm run produced, batch by batch.
#[derive(Debug, Clone)]
pub struct OrchestratorRun {
    pub total_widgets: usize,
    pub batches: Vec<BatchResult>,
}

impl OrchestratorRun {
    pub fn widget_results(&self) -> impl Iterator<Item = &WidgetComplianceResult> {
        self.batches.iter().flat_map(|batch| batch.widgets.iter())
    }
}

/// Cold-pass state for one batch, kept until its warm pass merges in.
struct ColdPass {
    plan: BatchPlan,
    url: String,
    descriptors: Vec<WidgetDescriptor>,
    widgets: Vec<WidgetComplianceResult>,
    outcome: RegimeOutcome,
    storage: Option<CriterionResult>,
    errors: Vec<String>,
}

/// Drives every batch through the cold and warm regimes, strictly one at a
/// time: cache clearing and navigation mutate the whole page.
pub struct BatchOrchestrator<M> {
    surface: SurfaceHandle,
    sampler: Sampler,
    manifest: M,
    config: OrchestratorConfig,
    cancel: CancellationToken,
}

impl<M: ManifestProvider> BatchOrchestrator<M> {
    pub fn new(surface: SurfaceHandle, manifest: M, config: OrchestratorConfig) -> Self {
        Self {
            sampler: Sampler::new(surface.clone(), config.sampler.clone()),
            surface,
            manifest,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling stops sampling at the next tick and skips remaining batches.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self) -> Result<OrchestratorRun> {
        self.run_with_batch_size(self.config.batch_size).await
    }

    pub async fn run_with_batch_size(&self, batch_size: usize) -> Result<OrchestratorRun> {
        let batch_size = batch_size.max(1);
        let first = self
            .manifest
            .batch(0, batch_size)
            .context("failed to load the first batch manifest")?;
        let total_widgets = first.total;
        let plans = partition(total_widgets, batch_size);

        log_info!(
            "compliance run: {} widgets in {} batches of {} ({:?} schedule)",
            total_widgets,
            plans.len(),
            batch_size,
            self.config.schedule
        );

        let mut first = Some(first.widgets);
        let mut batches = Vec::with_capacity(plans.len());

        match self.config.schedule {
            RegimeSchedule::Interleaved => {
                for plan in plans {
                    if self.cancel.is_cancelled() {
                        log_warn!("run cancelled before batch {}", plan.index);
                        break;
                    }
                    let descriptors = self.descriptors_for(plan, batch_size, &mut first);
                    let mut cold = self.run_cold(plan, batch_size, descriptors).await;
                    if let Some(err) = self.navigate_away().await {
                        cold.errors.push(err);
                    }
                    batches.push(self.run_warm(cold).await);
                }
            }
            RegimeSchedule::Phased => {
                let mut colds = Vec::with_capacity(plans.len());
                for plan in plans {
                    if self.cancel.is_cancelled() {
                        log_warn!("run cancelled before batch {}", plan.index);
                        break;
                    }
                    let descriptors = self.descriptors_for(plan, batch_size, &mut first);
                    colds.push(self.run_cold(plan, batch_size, descriptors).await);
                }
                if let Some(err) = self.navigate_away().await {
                    if let Some(last) = colds.last_mut() {
                        last.errors.push(err);
                    }
                }
                for cold in colds {
                    batches.push(self.run_warm(cold).await);
                }
            }
        }

        Ok(OrchestratorRun {
            total_widgets,
            batches,
        })
    }

    fn descriptors_for(
        &self,
        plan: BatchPlan,
        batch_size: usize,
        first: &mut Option<Vec<WidgetDescriptor>>,
    ) -> Result<Vec<WidgetDescriptor>, String> {
        if plan.index == 0 {
            if let Some(widgets) = first.take() {
                return Ok(widgets);
            }
        }
        self.manifest
            .batch(plan.index, batch_size)
            .map(|manifest| manifest.widgets)
            .map_err(|err| format!("manifest for batch {} failed: {err:#}", plan.index))
    }

    async fn run_cold(
        &self,
        plan: BatchPlan,
        batch_size: usize,
        descriptors: Result<Vec<WidgetDescriptor>, String>,
    ) -> ColdPass {
        let url = batch_route(&self.config.batch_route_template, plan.index, batch_size);
        let mut cold = ColdPass {
            plan,
            url,
            descriptors: Vec::new(),
            widgets: Vec::new(),
            outcome: RegimeOutcome::not_run(),
            storage: None,
            errors: Vec::new(),
        };

        let descriptors = match descriptors {
            Ok(descriptors) => descriptors,
            Err(err) => {
                log_warn!("{err}");
                cold.errors.push(err);
                return cold;
            }
        };
        cold.widgets = descriptors
            .iter()
            .map(|d| WidgetComplianceResult::new(d.widget_id.clone(), d.widget_type.clone()))
            .collect();
        cold.descriptors = descriptors;

        log_info!(
            "batch {}: cold pass over {} widgets",
            plan.index,
            cold.descriptors.len()
        );

        if let Err(err) = self.surface.clear_persistent_state().await {
            let message = format!("batch {}: cache clear failed: {err:#}", plan.index);
            log_warn!("{message}");
            cold.errors.push(message);
        }

        if let Err(err) = self.surface.navigate(&cold.url).await {
            let message = format!(
                "batch {}: navigation to {} failed: {err:#}",
                plan.index, cold.url
            );
            log_warn!("{message}");
            cold.errors.push(message);
            for widget in &mut cold.widgets {
                widget.record_all(never_rendered("batch view failed to load"));
            }
            return cold;
        }

        let resolution = self
            .sampler
            .sample(&cold.descriptors, SampleMode::UntilLoaded, &self.cancel)
            .await;
        cold.outcome = resolution.outcome();

        let stream_log = match self.surface.stream_requests().await {
            Ok(urls) => urls,
            Err(err) => {
                let message = format!("batch {}: stream log unavailable: {err:#}", plan.index);
                log_warn!("{message}");
                cold.errors.push(message);
                Vec::new()
            }
        };

        let probe = self
            .surface
            .probe_storage()
            .await
            .map_err(|err| format!("{err:#}"));
        let storage = persistent_cache(&probe);

        let missing_reason = match &resolution {
            SamplerResolution::GenuinelyEmpty { .. } => "page rendered no widgets",
            _ => "widget never rendered",
        };

        for (descriptor, widget) in cold.descriptors.iter().zip(cold.widgets.iter_mut()) {
            match resolution.history(&descriptor.widget_id) {
                Some(history) => {
                    widget.record_all(evaluate_cold(descriptor, history, &stream_log));
                    widget.record(storage.clone());
                    if history.timed_out {
                        widget.mark_timed_out();
                    }
                }
                None => widget.record_all(never_rendered(missing_reason)),
            }
        }
        cold.storage = Some(storage);

        cold
    }

    async fn run_warm(&self, mut cold: ColdPass) -> BatchResult {
        let warm = if cold.outcome.resolution == ResolutionKind::NotRun {
            skip_warm(&mut cold.widgets, "cold pass did not run");
            RegimeOutcome::not_run()
        } else if let Err(err) = self.surface.navigate(&cold.url).await {
            let message = format!(
                "batch {}: warm navigation to {} failed: {err:#}",
                cold.plan.index, cold.url
            );
            log_warn!("{message}");
            cold.errors.push(message);
            skip_warm(&mut cold.widgets, "warm navigation failed");
            RegimeOutcome::not_run()
        } else {
            log_info!("batch {}: warm pass", cold.plan.index);
            let resolution = self
                .sampler
                .sample(
                    &cold.descriptors,
                    SampleMode::FixedWindow(self.config.warm_wait),
                    &self.cancel,
                )
                .await;
            for widget in &mut cold.widgets {
                let history = resolution.history(widget.widget_id());
                widget.record_all(evaluate_warm(history, self.config.warm_grace_snapshots));
            }
            resolution.outcome()
        };

        BatchResult {
            batch_index: cold.plan.index,
            widget_count: cold.plan.len.max(cold.descriptors.len()),
            cold: cold.outcome,
            warm,
            storage: cold.storage,
            widgets: cold.widgets,
            errors: cold.errors,
        }
    }

    async fn navigate_away(&self) -> Option<String> {
        match self.surface.navigate(&self.config.away_route).await {
            Ok(()) => None,
            Err(err) => {
                let message = format!(
                    "navigation away to {} failed: {err:#}",
                    self.config.away_route
                );
                log_warn!("{message}");
                Some(message)
            }
        }
    }
}

fn skip_warm(widgets: &mut [WidgetComplianceResult], reason: &str) {
    for widget in widgets {
        for criterion in Criterion::WARM {
            widget.record(CriterionResult::skip(criterion, reason));
        }
    }
}
