//! Home Dashboard - Automation API Server

use automation_engine::{AutomationEngine, Collaborators, EngineConfig, FileBlobStore};
use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use home_devices::{DeviceRegistry, LocationTracker, UdpDispatcher};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod automations;
mod config;
mod devices;
mod notifier;
mod websocket;

use config::ServerConfig;
use notifier::BroadcastNotifier;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AutomationEngine>,
    pub registry: Arc<DeviceRegistry>,
    pub tracker: Arc<LocationTracker>,
    pub notifier: Arc<BroadcastNotifier>,
    pub config: Arc<ServerConfig>,
}

/// API response wrapper using serde_json::Value for flexibility
#[derive(Serialize)]
pub struct ApiResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: Some(serde_json::to_value(data).unwrap_or(serde_json::Value::Null)),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Health check
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket::handle_socket(socket, state))
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Automations
        .route(
            "/api/v1/automations",
            get(automations::list_automations).post(automations::create_automation),
        )
        .route(
            "/api/v1/automations/:id",
            get(automations::get_automation)
                .put(automations::update_automation)
                .delete(automations::delete_automation),
        )
        .route(
            "/api/v1/automations/:id/toggle",
            post(automations::toggle_automation),
        )
        .route(
            "/api/v1/automations/:id/run",
            post(automations::run_automation),
        )
        .route(
            "/api/v1/automations/:id/history",
            get(automations::automation_history),
        )
        .route(
            "/api/v1/history",
            get(automations::list_history).delete(automations::clear_history),
        )
        // Devices
        .route(
            "/api/v1/devices",
            get(devices::list_devices).post(devices::register_device),
        )
        .route(
            "/api/v1/devices/:id",
            axum::routing::delete(devices::delete_device),
        )
        .route(
            "/api/v1/devices/:id/snapshot",
            put(devices::update_snapshot),
        )
        .route("/api/v1/location", post(devices::update_location))
        // WebSocket
        .route("/ws", get(ws_handler))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dashboard_api=debug,automation_engine=debug,home_devices=info,info".into()
            }),
        )
        .init();

    tracing::info!("Starting home dashboard API server");

    let config = ServerConfig::from_env()?;
    tokio::fs::create_dir_all(&config.data_dir).await?;
    tracing::info!("Using data directory {}", config.data_dir.display());

    // Device layer
    let registry = Arc::new(DeviceRegistry::load(&config.data_dir).await);
    let tracker = Arc::new(LocationTracker::new());
    let dispatcher = Arc::new(UdpDispatcher::bind(registry.clone()).await?);
    let notifier = Arc::new(BroadcastNotifier::new());
    tracing::info!("Loaded {} devices", registry.get_devices().len());

    // Automation engine
    let collaborators = Collaborators {
        devices: registry.clone(),
        geofences: tracker.clone(),
        dispatcher,
        notifier: notifier.clone(),
    };
    let engine = Arc::new(
        AutomationEngine::new(
            EngineConfig::default(),
            Arc::new(FileBlobStore::new(config.data_dir.clone())),
            collaborators,
        )
        .await,
    );
    engine.watch_devices(registry.subscribe());
    engine.watch_geofences(tracker.subscribe());
    engine.start();
    tracing::info!(
        "Automation engine started ({} geofences monitored)",
        tracker.monitored_count()
    );

    let bind_addr = config.bind_addr;
    let state = AppState {
        engine,
        registry,
        tracker,
        notifier,
        config: Arc::new(config),
    };

    tracing::info!("Listening on http://{}", bind_addr);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
