pub mod criteria;
pub mod models;
pub mod navigation;
pub mod orchestrator;
pub mod report;
pub mod sampling;
pub mod settings;
pub mod surface;
pub mod utils;

use anyhow::Result;

pub use models::{ComplianceReport, Criterion, CriterionResult, CriterionStatus, WidgetDescriptor};
pub use orchestrator::{BatchOrchestrator, ManifestProvider, StaticManifest};
pub use report::{check_gates, GateViolation};
pub use settings::{MonitorSettings, SettingsStore};
pub use surface::{PageSurface, SurfaceHandle};
pub use utils::init_logging;

const ENABLE_LOGS: bool = true;

/// Outcome of a full compliance run: the report plus any gate it failed.
#[derive(Debug, Clone)]
pub struct ComplianceRun {
    pub report: ComplianceReport,
    pub violations: Vec<GateViolation>,
}

impl ComplianceRun {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Run every batch through both cache regimes, aggregate, and check gates.
///
/// Only a failure to load the first manifest batch is an `Err`; everything
/// past that point is contained in the report.
pub async fn run_compliance<S, M>(
    surface: S,
    manifest: M,
    settings: &MonitorSettings,
) -> Result<ComplianceRun>
where
    S: PageSurface,
    M: ManifestProvider,
{
    let handle = SurfaceHandle::spawn(surface)?;
    let orchestrator = BatchOrchestrator::new(handle, manifest, settings.orchestrator_config());
    let run = orchestrator.run().await?;

    let report = report::build_report(run);
    let violations = check_gates(&report, &settings.gates);
    if violations.is_empty() {
        log_info!("compliance run {} passed all gates", report.run_id);
    } else {
        log_warn!(
            "compliance run {} failed {} gate(s)",
            report.run_id,
            violations.len()
        );
    }

    Ok(ComplianceRun { report, violations })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::scripted::{
        content_frame, demo_loading_frame, skeleton_frame, ScriptedSurface, ScriptedWidget,
    };

    fn fast_settings() -> MonitorSettings {
        MonitorSettings {
            poll_interval_ms: 5,
            hard_timeout_ms: 400,
            stability_window_ms: 30,
            empty_population_timeout_ms: 100,
            post_load_samples: 0,
            warm_wait_ms: 60,
            batch_size: 2,
            batch_route_template: "/batch/{index}".into(),
            ..MonitorSettings::default()
        }
    }

    fn loading_widget(id: &str, widget_type: &str) -> ScriptedWidget {
        ScriptedWidget::new(
            id,
            widget_type,
            vec![skeleton_frame(), skeleton_frame(), skeleton_frame(), content_frame()],
        )
    }

    #[tokio::test]
    async fn clean_population_passes_default_gate() {
        let surface = ScriptedSurface::new();
        surface.add_page(
            "/batch/0",
            vec![loading_widget("w-0", "chart"), loading_widget("w-1", "table")],
            vec![
                ScriptedWidget::new("w-0", "chart", vec![content_frame()]),
                ScriptedWidget::new("w-1", "table", vec![content_frame()]),
            ],
        );
        let manifest = StaticManifest::new(vec![
            WidgetDescriptor::new("w-0", "chart"),
            WidgetDescriptor::new("w-1", "table"),
        ]);

        let run = run_compliance(surface, manifest, &fast_settings()).await.unwrap();

        assert!(run.passed());
        assert_eq!(run.report.total_widgets, 2);
        assert_eq!(
            run.report
                .criterion_summary(Criterion::CleanLoadingState)
                .unwrap()
                .pass_rate,
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn demo_data_fails_the_clean_loading_gate() {
        let surface = ScriptedSurface::new();
        surface.add_page(
            "/batch/0",
            vec![
                ScriptedWidget::new("w-0", "pods", vec![demo_loading_frame(), content_frame()]),
                loading_widget("w-1", "chart"),
            ],
            Vec::new(),
        );
        let manifest = StaticManifest::new(vec![
            WidgetDescriptor::new("w-0", "pods"),
            WidgetDescriptor::new("w-1", "chart"),
        ]);

        let run = run_compliance(surface, manifest, &fast_settings()).await.unwrap();

        assert!(!run.passed());
        assert_eq!(run.violations[0].criterion, Criterion::CleanLoadingState);
        assert_eq!(run.violations[0].observed, Some(0.5));
    }

    #[tokio::test]
    async fn empty_population_reports_without_error() {
        let run = run_compliance(
            ScriptedSurface::new(),
            StaticManifest::new(Vec::new()),
            &fast_settings(),
        )
        .await
        .unwrap();

        assert_eq!(run.report.total_widgets, 0);
        assert!(run.report.batches.is_empty());
    }
}
