//! HTTP and WebSocket server for professora
//!
//! Hosts the relay endpoint (`/ws`), the request/response turn API, the
//! status and health probes, and optionally a static browser UI bundle.

pub mod health;
pub mod relay;
pub mod turns;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::tutor::{Session, TurnOrchestrator};

/// Default number of turns returned by the history endpoint
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Default idle time after which an HTTP session is discarded
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// A stored session and when a turn last touched it
#[derive(Debug)]
pub struct SessionEntry {
    session: Arc<Mutex<Session>>,
    last_used: Instant,
}

/// Sessions created through the HTTP turn API, keyed by client-chosen id
///
/// Each session sits behind its own lock so turns for one session run
/// strictly one at a time while different sessions proceed concurrently.
pub type SessionStore = Arc<RwLock<HashMap<String, SessionEntry>>>;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<TurnOrchestrator>,
    pub sessions: SessionStore,
    pub history_limit: usize,
    pub session_ttl: Duration,
}

impl ApiState {
    /// Create state around a shared orchestrator
    #[must_use]
    pub fn new(orchestrator: Arc<TurnOrchestrator>) -> Self {
        Self {
            orchestrator,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            history_limit: DEFAULT_HISTORY_LIMIT,
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }

    /// Get the session for `id` for a new turn, creating it if needed
    ///
    /// Expired sessions are swept first. A session created here that ends
    /// its turn without a recorded Turn must be handed to
    /// [`discard_if_unused`](Self::discard_if_unused).
    pub async fn session(&self, id: &str) -> Arc<Mutex<Session>> {
        let mut sessions = self.sessions.write().await;
        self.evict_expired(&mut sessions);

        let entry = sessions.entry(id.to_string()).or_insert_with(|| {
            tracing::debug!(session_id = %id, "session created");
            SessionEntry {
                session: Arc::new(Mutex::new(Session::new(id))),
                last_used: Instant::now(),
            }
        });
        entry.last_used = Instant::now();
        Arc::clone(&entry.session)
    }

    /// Look up an existing session
    pub async fn existing_session(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|entry| Arc::clone(&entry.session))
    }

    /// Remove a session that still holds no turns
    ///
    /// Call with the session's lock held and the log empty. The entry is
    /// left alone when another request already holds a handle to it.
    pub async fn discard_if_unused(&self, id: &str, session: &Arc<Mutex<Session>>) {
        let mut sessions = self.sessions.write().await;
        let unused = sessions
            .get(id)
            .is_some_and(|entry| Arc::ptr_eq(&entry.session, session) && Arc::strong_count(session) == 2);
        if unused {
            sessions.remove(id);
            tracing::debug!(session_id = %id, "discarded session without turns");
        }
    }

    /// Remove sessions idle for longer than the TTL
    ///
    /// Returns the number of sessions removed.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        self.evict_expired(&mut sessions)
    }

    fn evict_expired(&self, sessions: &mut HashMap<String, SessionEntry>) -> usize {
        let before = sessions.len();
        sessions.retain(|id, entry| {
            // A handle outside the store means a turn is using it
            let keep = entry.last_used.elapsed() < self.session_ttl || Arc::strong_count(&entry.session) > 1;
            if !keep {
                tracing::info!(session_id = %id, "session expired");
            }
            keep
        });
        before - sessions.len()
    }
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    orchestrator: Arc<TurnOrchestrator>,
    host: String,
    port: u16,
    static_dir: Option<PathBuf>,
    history_limit: usize,
    session_ttl: Duration,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(orchestrator: Arc<TurnOrchestrator>, port: u16) -> Self {
        Self {
            orchestrator,
            host: "0.0.0.0".to_string(),
            port,
            static_dir: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }

    /// Set the bind address
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Serve a browser UI bundle from this directory
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Default number of turns returned by the history endpoint
    #[must_use]
    pub const fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Idle time after which an HTTP session is discarded
    #[must_use]
    pub const fn session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let mut state = ApiState::new(self.orchestrator);
        state.history_limit = self.history_limit;
        state.session_ttl = self.session_ttl;

        ApiServer {
            state: Arc::new(state),
            host: self.host,
            port: self.port,
            static_dir: self.static_dir,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .merge(relay::router(self.state.clone()))
            .nest("/api/sessions", turns::router(self.state.clone()))
            .merge(health::router())
            .merge(health::ready_router(self.state.clone()));

        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir = ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

            router = router.fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        // Browser UIs are commonly served from a different origin
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until shutdown
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind {addr}: {e}")))?;

        tracing::info!(address = %addr, "relay server listening");

        self.serve(listener).await
    }

    /// Serve on an already-bound listener
    ///
    /// Stops accepting on Ctrl-C; connections still open are dropped.
    ///
    /// # Errors
    ///
    /// Returns error if the server fails while running
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let sweeper = tokio::spawn(sweep_idle_sessions(Arc::clone(&self.state)));

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await;
        sweeper.abort();
        served.map_err(|e| crate::Error::Config(format!("server error: {e}")))?;

        tracing::info!("relay server stopped");
        Ok(())
    }
}

/// Periodically drop HTTP sessions nobody has used within the TTL
async fn sweep_idle_sessions(state: Arc<ApiState>) {
    let period = state
        .session_ttl
        .clamp(Duration::from_secs(1), Duration::from_secs(60));
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let removed = state.evict_idle().await;
        if removed > 0 {
            tracing::debug!(removed, "swept idle sessions");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
