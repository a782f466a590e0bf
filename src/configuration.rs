pub mod config;
pub mod types;

pub use config::Settings;
pub use types::{EngineKind, ModelVariant, SampleOrder, StagingRetention};
