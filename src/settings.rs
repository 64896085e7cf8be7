use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::models::Criterion;
use crate::navigation::NavigationConfig;
use crate::orchestrator::{OrchestratorConfig, RegimeSchedule};
use crate::report::RequiredPassRate;
use crate::sampling::SamplerConfig;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

const DEBUG_ENV: &str = "WIDGETWATCH_DEBUG";
const POLL_ENV: &str = "WIDGETWATCH_POLL_MS";

/// Tunables for one compliance run. Every field has a default so a partial
/// JSON file is enough.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorSettings {
    pub poll_interval_ms: u64,
    pub hard_timeout_ms: u64,
    pub stability_window_ms: u64,
    pub empty_population_timeout_ms: u64,
    pub max_widgets_per_tick: usize,
    /// Extra ticks a loaded widget keeps being read while others resolve.
    pub post_load_samples: usize,
    pub batch_size: usize,
    pub warm_wait_ms: u64,
    pub warm_grace_snapshots: usize,
    pub min_content_text_length: usize,
    pub batch_route_template: String,
    pub away_route: String,
    pub regime_schedule: RegimeSchedule,
    pub navigation_timeout_ms: u64,
    pub gates: Vec<RequiredPassRate>,
    #[serde(skip)]
    pub verbose_polling: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            hard_timeout_ms: 20_000,
            stability_window_ms: 500,
            empty_population_timeout_ms: 8_000,
            max_widgets_per_tick: 64,
            post_load_samples: 20,
            batch_size: 24,
            warm_wait_ms: 3_000,
            warm_grace_snapshots: 10,
            min_content_text_length: 10,
            batch_route_template: "/?complianceBatch={index}&batchSize={size}".into(),
            away_route: "about:blank".into(),
            regime_schedule: RegimeSchedule::Phased,
            navigation_timeout_ms: 10_000,
            gates: vec![RequiredPassRate {
                criterion: Criterion::CleanLoadingState,
                min_rate: 1.0,
            }],
            verbose_polling: false,
        }
    }
}

impl MonitorSettings {
    /// Apply `WIDGETWATCH_DEBUG` and `WIDGETWATCH_POLL_MS`.
    pub fn apply_env_overrides(&mut self) {
        self.verbose_polling = env::var(DEBUG_ENV)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if let Ok(raw) = env::var(POLL_ENV) {
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => self.poll_interval_ms = ms,
                _ => log_warn!("ignoring invalid {POLL_ENV}={raw}"),
            }
        }
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            hard_timeout: Duration::from_millis(self.hard_timeout_ms),
            stability_window: Duration::from_millis(self.stability_window_ms),
            empty_population_timeout: Duration::from_millis(self.empty_population_timeout_ms),
            max_widgets: self.max_widgets_per_tick.max(1),
            post_load_samples: self.post_load_samples,
            min_content_text_length: self.min_content_text_length,
            verbose: self.verbose_polling,
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            sampler: self.sampler_config(),
            batch_size: self.batch_size.max(1),
            warm_wait: Duration::from_millis(self.warm_wait_ms),
            warm_grace_snapshots: self.warm_grace_snapshots,
            batch_route_template: self.batch_route_template.clone(),
            away_route: self.away_route.clone(),
            schedule: self.regime_schedule,
        }
    }

    pub fn navigation_config(&self) -> NavigationConfig {
        NavigationConfig {
            sampler: self.sampler_config(),
            url_change_timeout: Duration::from_millis(self.navigation_timeout_ms),
        }
    }
}

/// Settings backed by an optional JSON file.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<MonitorSettings>,
}

impl SettingsStore {
    pub fn load(path: PathBuf) -> Result<Self> {
        let mut data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!(
                    "settings at {} are invalid ({err}); using defaults",
                    path.display()
                );
                MonitorSettings::default()
            })
        } else {
            MonitorSettings::default()
        };
        data.apply_env_overrides();

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> MonitorSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        self.path.as_path()
    }

    /// Replace the settings and write them back to the store's file.
    pub fn update(&self, settings: MonitorSettings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    /// Re-read the file, keeping the env overrides applied at load.
    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let mut data: MonitorSettings = serde_json::from_str(&contents)?;
        data.apply_env_overrides();

        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &MonitorSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
