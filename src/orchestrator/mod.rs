pub mod batches;
pub mod runner;

pub use batches::{
    batch_count, batch_route, partition, BatchManifest, BatchPlan, ManifestProvider,
    StaticManifest,
};
pub use runner::{BatchOrchestrator, OrchestratorConfig, OrchestratorRun, RegimeSchedule};
