mod admin;
pub mod error;
mod middleware;
mod public;

pub use admin::build_admin_router;
pub use error::{ApiError, ErrorReport};
pub use middleware::REQUEST_ID_HEADER;
pub use public::build_public_router;

use std::future::IntoFuture;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::try_join;
use tracing::{info, warn};

use crate::application::services::Services;
use crate::config::ServerSettings;
use crate::infra::error::InfraError;

#[derive(Clone)]
pub struct HttpState {
    pub services: Services,
}

impl HttpState {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn data_source(State(state): State<HttpState>) -> impl IntoResponse {
    Json(state.services.content.get_data_source_info().await)
}

/// Run the public and admin listeners until Ctrl-C, then drain for at most
/// the configured grace period.
pub async fn serve(settings: &ServerSettings, state: HttpState) -> Result<(), InfraError> {
    let public_listener = TcpListener::bind(settings.public_addr).await?;
    let admin_listener = TcpListener::bind(settings.admin_addr).await?;
    info!(
        public = %settings.public_addr,
        admin = %settings.admin_addr,
        "listening"
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let public_server = axum::serve(public_listener, build_public_router(state.clone()))
        .with_graceful_shutdown(stopped(stop_rx.clone()));
    let admin_server = axum::serve(admin_listener, build_admin_router(state))
        .with_graceful_shutdown(stopped(stop_rx));

    let servers = async { try_join!(public_server.into_future(), admin_server.into_future()) };
    let grace = settings.graceful_shutdown;

    tokio::select! {
        result = servers => {
            result?;
            info!("listeners stopped");
        }
        _ = async {
            shutdown_signal().await;
            let _ = stop_tx.send(true);
            tokio::time::sleep(grace).await;
        } => {
            warn!(grace_seconds = grace.as_secs(), "graceful shutdown timed out");
        }
    }

    Ok(())
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
