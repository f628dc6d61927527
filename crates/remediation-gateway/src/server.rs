//! HTTP server wrapper around the operator/webhook router.

use std::time::Duration;

use remediation_common::{Error, Result};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::app::AppState;
use crate::handlers;

pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn run(&self, bind_addr: &str) -> Result<()> {
        let app = handlers::create_router(self.state.clone()).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(30))),
        );

        info!(bind_addr, "starting remediation gateway");

        let listener = tokio::net::TcpListener::bind(bind_addr)
            .await
            .map_err(|e| Error::Configuration(format!("failed to bind to {bind_addr}: {e}")))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| Error::Configuration(format!("server error: {e}")))?;

        Ok(())
    }
}
