//! Stratus console gateway: a REST-and-JSON face for the platform's
//! positional XML-RPC core.
//!
//! The interesting parts live in `commands` (the declarative operation
//! registry) and `dispatch` (the one pipeline every generic request runs
//! through). Everything else is supporting cast: sessions, zones, the
//! response envelope and a handful of custom endpoints.

pub mod commands;
pub mod config;
mod dispatch;
pub mod envelope;
mod handlers;
pub mod params;
pub mod session;
pub mod tfa;
pub mod zones;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use axum::routing::{any, get, MethodRouter};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::commands::CommandRegistry;
use crate::config::Config;
use crate::envelope::GatewayStatus;
use crate::session::{SessionError, SessionResolver};
use crate::zones::ZoneRegistry;
use stratus_zone_client::{ZoneClient, ZoneClientError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    ZoneClient(#[from] ZoneClientError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What a deployment has attached next to the gateway. The gateway never
/// inspects relay objects at runtime; deployments declare capabilities
/// here and `/healthz` reports them. Relays authenticate browser tokens
/// through [`session::SessionResolver::verify_token`] and open their own
/// zone connections.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RelayCapabilities {
    pub events: bool,
    pub console_streams: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CommandRegistry>,
    pub sessions: Arc<SessionResolver>,
    pub zones: Arc<ZoneRegistry>,
    pub zone_client: Arc<ZoneClient>,
    pub config: Arc<Config>,
    pub relays: RelayCapabilities,
}

pub fn build_router(config: Config) -> Result<Router, ServiceError> {
    build_router_with_relays(config, RelayCapabilities::default())
}

pub fn build_router_with_relays(
    config: Config,
    relays: RelayCapabilities,
) -> Result<Router, ServiceError> {
    let sessions = SessionResolver::from_config(&config)?;
    let zones = ZoneRegistry::from_config(&config);
    let zone_client = ZoneClient::new(config.zone_client_config())?;
    let registry = CommandRegistry::builtin();
    tracing::info!(
        operations = registry.len(),
        zones = zones.zones().len(),
        mode = config.mode.as_str(),
        "console gateway assembled"
    );
    let state = AppState {
        registry: Arc::new(registry),
        sessions: Arc::new(sessions),
        zones: Arc::new(zones),
        zone_client: Arc::new(zone_client),
        config: Arc::new(config),
        relays,
    };
    Ok(router(state))
}

fn router(state: AppState) -> Router {
    // Entries for the same path merge into one method router so a wrong
    // method on a custom path still answers with the envelope.
    let mut custom: Vec<(&'static str, MethodRouter<AppState>)> = Vec::new();
    for route in handlers::custom_routes(&state.config) {
        match custom.iter_mut().find(|(path, _)| *path == route.path) {
            Some((_, existing)) => {
                *existing = std::mem::take(existing).merge(route.router);
            }
            None => custom.push((route.path, route.router)),
        }
    }
    let mut router = Router::new();
    for (path, method_router) in custom {
        router = router.route(path, method_router.fallback(method_not_allowed));
    }
    router
        .route("/api", any(api_root))
        .route("/api/", any(api_root))
        .route("/api/*rest", any(dispatch::dispatch_api))
        .route("/healthz", get(healthz))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}

async fn api_root() -> Response {
    envelope::respond(
        GatewayStatus::BadRequest,
        Some("missing command family".to_string()),
        None,
    )
}

async fn not_found() -> Response {
    envelope::error(GatewayStatus::NotFound)
}

async fn method_not_allowed() -> Response {
    envelope::error(GatewayStatus::MethodNotAllowed)
}

/// Liveness probe. Lives outside the `/api` envelope.
async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "mode": state.config.mode.as_str(),
        "zones": state.zones.zones().len(),
        "relays": state.relays,
    }))
}

pub async fn serve(config: Config, relays: RelayCapabilities) -> Result<(), ServiceError> {
    let bind_addr = config.bind_addr;
    let router = build_router_with_relays(config, relays)?;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(addr = %local_addr, "console gateway listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "ctrl-c watcher failed");
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::warn!(error = %err, "sigterm watcher failed"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutting down");
}
