//! `RelayServer`: Axum HTTP + `WebSocket` server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use grimoire_core::{ConnectionId, RoleCatalog, SessionRegistry};
use grimoire_rpc::{ConnectionHandler, HandlerOptions};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::relay::{Relay, RelayInput, RelayStats};
use crate::shutdown::ShutdownCoordinator;
use crate::sweeper::spawn_sweeper;
use crate::websocket::hub::ConnectionHub;
use crate::websocket::session::{SessionOptions, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Open sockets.
    pub hub: Arc<ConnectionHub>,
    /// Relay input queue.
    pub relay: mpsc::Sender<RelayInput>,
    /// Latest relay counters.
    pub stats: watch::Receiver<RelayStats>,
    /// Server shutdown signal.
    pub cancel: CancellationToken,
    /// When the server started.
    pub start_time: Instant,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

/// The session relay server.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    hub: Arc<ConnectionHub>,
    relay: mpsc::Sender<RelayInput>,
    stats: watch::Receiver<RelayStats>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl RelayServer {
    /// Create a server with an empty registry and the built-in role catalog.
    ///
    /// Spawns the relay and sweeper tasks, so it must run inside a Tokio
    /// runtime.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry(config, SessionRegistry::new())
    }

    /// Create a server around an existing registry.
    pub fn with_registry(config: ServerConfig, registry: SessionRegistry) -> Self {
        let hub = Arc::new(ConnectionHub::new());
        let shutdown = Arc::new(ShutdownCoordinator::new());

        let handler = ConnectionHandler::new(
            registry,
            RoleCatalog::builtin(),
            Arc::clone(&hub),
            HandlerOptions {
                allow_reconnect_while_connected: config.allow_reconnect_while_connected,
            },
        );
        let (relay, stats) = Relay::new(handler, config.session_max_age);
        let (relay_tx, relay_rx) = mpsc::channel(config.inbound_queue_capacity);

        shutdown.track(tokio::spawn(relay.run(relay_rx, shutdown.token())));
        shutdown.track(spawn_sweeper(
            config.sweep_interval,
            relay_tx.clone(),
            shutdown.token(),
        ));

        Self {
            config: Arc::new(config),
            hub,
            relay: relay_tx,
            stats,
            shutdown,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: Arc::clone(&self.hub),
            relay: self.relay.clone(),
            stats: self.stats.clone(),
            cancel: self.shutdown.token(),
            start_time: self.start_time,
            config: Arc::clone(&self.config),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();
        info!(%addr, "grimoire relay listening");

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        });
        Ok((addr, handle))
    }

    /// Open sockets.
    pub fn hub(&self) -> &Arc<ConnectionHub> {
        &self.hub
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Latest relay counters.
    pub fn stats(&self) -> RelayStats {
        *self.stats.borrow()
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let sessions = state.stats.borrow().sessions;
    Json(health::health_check(
        state.start_time,
        state.hub.connection_count(),
        sessions,
    ))
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let connection_id = ConnectionId::new();
    let options = SessionOptions::from(&*state.config);
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(
                socket,
                connection_id,
                state.hub,
                state.relay,
                options,
                state.cancel,
            )
        })
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    fn make_server() -> RelayServer {
        RelayServer::new(ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..ServerConfig::default()
        })
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 10_000)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    #[tokio::test]
    async fn health_endpoint_reports_counters() {
        let server = make_server();
        let (status, body) = get_json(server.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["active_sessions"], 0);
        assert!(body["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn ws_endpoint_requires_upgrade() {
        let server = make_server();
        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server();
        let req = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn background_tasks_are_tracked_and_stop() {
        let server = make_server();
        assert_eq!(server.shutdown().tracked(), 2);
        assert!(!server.shutdown().is_shutting_down());
        server
            .shutdown()
            .graceful_shutdown(Some(std::time::Duration::from_secs(5)))
            .await;
        assert!(server.shutdown().is_shutting_down());
        assert_eq!(server.shutdown().tracked(), 0);
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        server.shutdown().shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn stats_start_empty() {
        let server = make_server();
        assert_eq!(server.stats(), RelayStats::default());
        assert_eq!(server.hub().connection_count(), 0);
        assert_eq!(server.config().port, 0);
    }
}
