pub mod colorization;
pub mod configuration;
pub mod controller;
pub mod engine;
pub mod error_handling;
pub mod logging;
pub mod storage;
pub mod web_interface;

pub use colorization::ColorizationService;
pub use configuration::Settings;
pub use controller::Controller;
pub use engine::ColorizationEngine;
pub use storage::ArtifactStore;
