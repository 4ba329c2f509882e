//! Control UI server

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;

use crate::config::UiConfig;
use crate::controller::StreamPlaybackController;
use crate::error::Result;
use crate::ui::{handlers, websocket};

/// State shared by every handler
pub struct AppState {
    pub controller: StreamPlaybackController,
}

pub struct WebServer {
    config: UiConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: UiConfig, controller: StreamPlaybackController) -> Self {
        Self {
            config,
            state: Arc::new(AppState { controller }),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/status", get(handlers::get_status))
            .route("/api/play", post(handlers::toggle_play))
            .route("/api/restart", post(handlers::restart))
            .route("/api/volume", post(handlers::set_volume))
            .route("/api/mute", post(handlers::set_mute))
            .route("/api/share", post(handlers::share))
            .route("/api/media/:action", post(handlers::media_action))
            .route("/ws", get(websocket::ws_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Serve until the listener fails
    pub async fn run(self) -> Result<()> {
        let router = self.router();
        let listener =
            TcpListener::bind((self.config.bind_address.as_str(), self.config.http_port)).await?;
        tracing::info!("Control UI listening on http://{}", listener.local_addr()?);
        axum::serve(listener, router).await?;
        Ok(())
    }

    pub fn start_background(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                tracing::error!("Control UI stopped: {}", e);
            }
        })
    }
}
