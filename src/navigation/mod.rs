//! Route-transition latency, measured with the same discovery and stability
//! primitives as the compliance sampler.

pub mod percentiles;
pub mod timing;

pub use percentiles::{percentile, summarize_timings, PhaseStats, ScenarioStats};
pub use timing::{
    NavigationConfig, NavigationScenario, NavigationTimingHarness, NavigationTrigger,
    ScenarioPlan, ScenarioRun, TransitionTiming,
};
