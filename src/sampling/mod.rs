pub mod sampler;
pub mod stability;

pub use sampler::{SampleMode, SampledPopulation, Sampler, SamplerConfig, SamplerResolution};
pub use stability::PopulationTracker;
