use axum::routing::get;
use axum::Router;
use pathindex::PathIndex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

pub mod browse;
pub mod error;
pub mod files;
pub mod links;
pub mod status;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Server {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    index: Arc<PathIndex>,
}

impl Server {
    /// Opens the index described by `config` and starts serving on its bind
    /// address.
    pub async fn start(config: &ServerConfig) -> Result<Self, ServerError> {
        let index = PathIndex::open(config.server_dir.clone(), config.snapshot_path());
        Self::start_with_index(Arc::new(index), config.bind_addr()).await
    }

    /// Starts serving an already opened index on `addr`. Port 0 binds a
    /// random free port; see [`addr`](Self::addr).
    pub async fn start_with_index(
        index: Arc<PathIndex>,
        addr: SocketAddr,
    ) -> Result<Self, ServerError> {
        let state = Arc::new(ServerState {
            index: index.clone(),
        });
        let app = router(state);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(error) = result {
                tracing::error!("server stopped with error: {error}");
            }
        });

        tracing::info!(
            "serving {} on http://{addr}",
            index.base().display()
        );

        Ok(Server {
            addr,
            shutdown: Some(shutdown_tx),
            task: Some(task),
            index,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn index(&self) -> &Arc<PathIndex> {
        &self.index
    }

    pub fn shutdown(&mut self) -> Result<(), String> {
        if let Some(sender) = self.shutdown.take() {
            sender
                .send(())
                .map_err(|_| "failed to send server shutdown signal".to_string())
        } else {
            Ok(())
        }
    }

    /// Waits for the serve task to finish after [`shutdown`](Self::shutdown).
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::error!("server task failed: {error}");
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

pub(crate) struct ServerState {
    pub(crate) index: Arc<PathIndex>,
}

/// Builds the HTTP routes over `state`.
pub(crate) fn router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    Router::new()
        .route("/", get(browse::root))
        .route("/browse", get(browse::root))
        .route("/browse/*subpath", get(browse::browse))
        .route("/s/:code", get(links::resolve))
        .route("/file/*path", get(files::stream))
        .route("/health", get(health))
        .route("/status", get(status::status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn health() -> &'static str {
    "ok"
}
