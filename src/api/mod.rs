//! HTTP API server for voxchat

pub mod health;
pub mod voice;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::DEFAULT_MAX_AUDIO_BYTES;
use crate::pipeline::TurnPipeline;
use crate::sessions::SessionStore;

/// Upper bound on how often idle sessions are swept
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub pipeline: TurnPipeline,
    pub sessions: SessionStore,
    /// Fires on server shutdown; aborts in-flight turns
    pub shutdown: CancellationToken,
    /// Largest accepted audio upload in bytes
    pub max_audio_bytes: usize,
}

/// API server
pub struct ApiServer {
    state: ApiState,
    port: u16,
    static_dir: Option<PathBuf>,
    session_ttl: Option<Duration>,
}

impl ApiServer {
    #[must_use]
    pub fn new(pipeline: TurnPipeline, sessions: SessionStore, port: u16) -> Self {
        Self {
            state: ApiState {
                pipeline,
                sessions,
                shutdown: CancellationToken::new(),
                max_audio_bytes: DEFAULT_MAX_AUDIO_BYTES,
            },
            port,
            static_dir: None,
            session_ttl: None,
        }
    }

    /// Set the static files directory for serving the web UI
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Set the largest accepted audio upload
    #[must_use]
    pub const fn max_audio_bytes(mut self, limit: usize) -> Self {
        self.state.max_audio_bytes = limit;
        self
    }

    /// Forget sessions that have been idle longer than `ttl` (`None` keeps them)
    #[must_use]
    pub const fn session_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Token that stops the server and cancels in-flight turns when fired
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(Arc::new(self.state.clone()), self.static_dir.as_deref())
    }

    /// Run the API server until the shutdown token fires
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!(
            port = self.port,
            max_audio_bytes = self.state.max_audio_bytes,
            "API server listening"
        );

        if let Some(ttl) = self.session_ttl {
            spawn_session_sweeper(
                self.state.sessions.clone(),
                ttl,
                self.state.shutdown.clone(),
            );
        }

        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

/// Periodically evict idle sessions until `shutdown` fires
fn spawn_session_sweeper(sessions: SessionStore, ttl: Duration, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL.min(ttl));
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let evicted = sessions.evict_idle(ttl).await;
                    if evicted > 0 {
                        let remaining = sessions.len().await;
                        tracing::info!(evicted, remaining, "evicted idle sessions");
                    }
                }
            }
        }
    });
}

/// Assemble the full router around `state`
#[must_use]
pub fn build_router(state: Arc<ApiState>, static_dir: Option<&std::path::Path>) -> Router {
    let mut router = Router::new()
        .nest("/api/voice", voice::router(state))
        .merge(health::router());

    // Serve static files if configured
    if let Some(static_dir) = static_dir {
        let index_file = static_dir.join("index.html");
        let serve_dir =
            ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

        router = router.fallback_service(serve_dir);
        tracing::info!(path = %static_dir.display(), "serving static files");
    }

    // CORS layer for cross-origin requests from a browser recorder
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router.layer(cors).layer(TraceLayer::new_for_http())
}
