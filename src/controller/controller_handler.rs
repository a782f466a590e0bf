use std::future::Future;
use std::sync::Arc;

use log::{error, info};

use crate::colorization::service::ServiceOptions;
use crate::colorization::ColorizationService;
use crate::configuration::Settings;
use crate::engine::{build_engine, shared};
use crate::error_handling::types::ControllerError;
use crate::storage::ArtifactStore;
use crate::web_interface::{SharedService, WebServer};

/// Wires the configured components together and runs the HTTP server.
///
/// Construction performs every fallible startup step (directories, engine
/// loading) so that the server never accepts traffic with a partially
/// initialized engine.
pub struct Controller {
    settings: Settings,
    service: SharedService,
}

impl Controller {
    pub fn new(settings: Settings) -> Result<Self, ControllerError> {
        info!("Starting up colorizer");
        settings.log_summary();

        let store = ArtifactStore::new(&settings.staging_dir, &settings.results_dir)?;
        ArtifactStore::ensure_directory(&settings.sample_dir)?;
        info!("Required directories created");

        let engine = build_engine(&settings, store.clone()).map_err(|e| {
            error!("Error initializing colorizer: {}", e);
            ControllerError::from(e)
        })?;

        let service = ColorizationService::new(
            store,
            shared(engine),
            ServiceOptions::from_settings(&settings),
        );

        Ok(Self {
            settings,
            service: Arc::new(service),
        })
    }

    /// Serves until Ctrl-C.
    pub async fn run(&self) -> Result<(), ControllerError> {
        self.run_until(shutdown_signal()).await
    }

    pub async fn run_until(
        &self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ControllerError> {
        let server = WebServer::new(self.service.clone(), self.settings.max_upload_bytes);
        server.start(self.settings.socket_addr(), shutdown).await
    }

    pub fn shutdown(&self) {
        info!("Shutting down colorizer");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
