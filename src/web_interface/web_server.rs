use std::future::Future;
use std::net::SocketAddr;

use log::{error, info};

use super::routes::{routes, SharedService};
use crate::error_handling::types::ControllerError;

/// Web server for the colorization HTTP API
pub struct WebServer {
    service: SharedService,
    max_upload_bytes: u64,
}

impl WebServer {
    /// Create a new WebServer instance
    pub fn new(service: SharedService, max_upload_bytes: u64) -> Self {
        Self {
            service,
            max_upload_bytes,
        }
    }

    /// Serves the API on `addr` until `shutdown` resolves.
    pub async fn start(
        &self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ControllerError> {
        let routes = routes(self.service.clone(), self.max_upload_bytes);

        let (bound, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .map_err(|e| {
                error!("Unable to bind {}: {}", addr, e);
                ControllerError::ServerError(format!("unable to bind {}: {}", addr, e))
            })?;

        info!("Colorizer API listening on http://{}", bound);
        server.await;
        info!("Web server stopped");
        Ok(())
    }
}
