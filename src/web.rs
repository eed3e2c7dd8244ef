//! Ambient HTTP surface
//!
//! A small axum router exposing the command surface and stat formatter over
//! REST, plus an SSE endpoint streaming formatted log lines, generalized
//! across whichever vehicle driver is currently active.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt as _};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::driver::commands;
use crate::driver::registry;
use crate::driver::types::DriverCommand;
use crate::error::{Result, VehicleCoreError};
use crate::logging::{get_logger, subscribe_log_lines};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub commands: mpsc::UnboundedSender<DriverCommand>,
}

#[derive(Deserialize)]
pub struct ModuleBody {
    pub code: String,
}

#[derive(Deserialize)]
pub struct PinBody {
    #[serde(default)]
    pub pin: String,
}

#[derive(Deserialize)]
pub struct ChargeModeBody {
    pub mode: String,
}

#[derive(Deserialize)]
pub struct ChargeCurrentBody {
    pub amps: u32,
}

#[derive(Deserialize)]
pub struct HomelinkBody {
    pub button: u8,
    pub duration_ms: Option<u32>,
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let active = registry::lock_active().await;
    commands::stat(active.driver(), &state.config)
}

async fn list_modules() -> impl IntoResponse {
    commands::list_drivers()
}

async fn set_module(
    State(state): State<AppState>,
    Json(body): Json<ModuleBody>,
) -> impl IntoResponse {
    let _ = state
        .commands
        .send(DriverCommand::SetVehicleType(body.code));
    (StatusCode::ACCEPTED, "vehicle type change queued")
}

async fn clear_module(State(state): State<AppState>) -> impl IntoResponse {
    let _ = state.commands.send(DriverCommand::ClearVehicleType);
    (StatusCode::ACCEPTED, "vehicle type cleared")
}

async fn wakeup() -> impl IntoResponse {
    let mut active = registry::lock_active().await;
    commands::wakeup(active.driver_mut()).await
}

async fn lock(State(state): State<AppState>, Json(body): Json<PinBody>) -> impl IntoResponse {
    let mut active = registry::lock_active().await;
    commands::lock(active.driver_mut(), &body.pin, &state.config).await
}

async fn unlock(State(state): State<AppState>, Json(body): Json<PinBody>) -> impl IntoResponse {
    let mut active = registry::lock_active().await;
    commands::unlock(active.driver_mut(), &body.pin, &state.config).await
}

async fn valet(State(state): State<AppState>, Json(body): Json<PinBody>) -> impl IntoResponse {
    let mut active = registry::lock_active().await;
    commands::valet(active.driver_mut(), &body.pin, &state.config).await
}

async fn unvalet(State(state): State<AppState>, Json(body): Json<PinBody>) -> impl IntoResponse {
    let mut active = registry::lock_active().await;
    commands::unvalet(active.driver_mut(), &body.pin, &state.config).await
}

async fn homelink(Json(body): Json<HomelinkBody>) -> impl IntoResponse {
    let mut active = registry::lock_active().await;
    commands::homelink(active.driver_mut(), body.button, body.duration_ms).await
}

async fn charge_mode(Json(body): Json<ChargeModeBody>) -> impl IntoResponse {
    let mut active = registry::lock_active().await;
    commands::charge_mode(active.driver_mut(), &body.mode).await
}

async fn charge_start() -> impl IntoResponse {
    let mut active = registry::lock_active().await;
    commands::charge_start(active.driver_mut()).await
}

async fn charge_stop() -> impl IntoResponse {
    let mut active = registry::lock_active().await;
    commands::charge_stop(active.driver_mut()).await
}

async fn charge_cooldown() -> impl IntoResponse {
    let mut active = registry::lock_active().await;
    commands::charge_cooldown(active.driver_mut()).await
}

async fn charge_current(Json(body): Json<ChargeCurrentBody>) -> impl IntoResponse {
    let mut active = registry::lock_active().await;
    commands::charge_current(active.driver_mut(), body.amps).await
}

async fn feature_get(
    State(state): State<AppState>,
    Path(key): Path<u32>,
) -> impl IntoResponse {
    crate::driver::feature_bridge::get(&state.config, key)
}

async fn logs_stream() -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = subscribe_log_lines();
    let stream = BroadcastStream::new(rx).filter_map(|line| match line {
        Ok(line) if crate::logging::should_emit_to_web(&line) => {
            Some(Ok(Event::default().event("log").data(line)))
        }
        _ => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/vehicle/status", get(status))
        .route("/api/vehicle/list", get(list_modules))
        .route("/api/vehicle/module", post(set_module).delete(clear_module))
        .route("/api/vehicle/wakeup", post(wakeup))
        .route("/api/vehicle/lock", post(lock))
        .route("/api/vehicle/unlock", post(unlock))
        .route("/api/vehicle/valet", post(valet))
        .route("/api/vehicle/unvalet", post(unvalet))
        .route("/api/vehicle/homelink", post(homelink))
        .route("/api/vehicle/charge/mode", post(charge_mode))
        .route("/api/vehicle/charge/start", post(charge_start))
        .route("/api/vehicle/charge/stop", post(charge_stop))
        .route("/api/vehicle/charge/cooldown", post(charge_cooldown))
        .route("/api/vehicle/charge/current", post(charge_current))
        .route("/api/vehicle/feature/{key}", get(feature_get))
        .route("/api/logs/stream", get(logs_stream))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve the router until the process is terminated.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let router = router(state);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| VehicleCoreError::web(format!("invalid bind address: {e}")))?;
    let logger = get_logger("web");
    logger.info(&format!("web surface listening on {addr}"));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| VehicleCoreError::web(format!("bind failed: {e}")))?;
    axum::serve(listener, router)
        .await
        .map_err(|e| VehicleCoreError::web(format!("server error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::registry::{register, DriverDescriptor};
    use crate::driver::testing::FixtureDriver;
    use crate::events::InMemoryEventBus;
    use crate::metrics::InMemoryMetricStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        register(DriverDescriptor {
            code: "FIX",
            name: "Fixture Vehicle",
            ctor: || Box::new(FixtureDriver::new()),
        });
        let (tx, _rx) = mpsc::unbounded_channel();
        router(AppState {
            config: Arc::new(Config::default()),
            commands: tx,
        })
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let response = app()
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_with_no_active_driver_reports_no_module_selected() {
        let metrics = InMemoryMetricStore::new();
        let events = InMemoryEventBus::new();
        registry::clear_active(&metrics, &events).await;

        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/vehicle/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"No vehicle module selected");
    }

    #[tokio::test]
    async fn list_modules_includes_registered_fixture() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/vehicle/list")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("FIX"));
    }

    #[tokio::test]
    async fn feature_get_unknown_key_reads_zero() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/vehicle/feature/99")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"0");
    }
}
