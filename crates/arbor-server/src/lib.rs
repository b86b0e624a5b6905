//! HTTP surface over the store, matcher, and projector

pub mod handlers;
pub mod router;

use std::sync::Arc;

use tokio::sync::RwLock;

use arbor_core::GraphStore;
use arbor_patterns::MatcherEngine;

/// Server bind configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 7424,
        }
    }
}

/// Shared state behind every handler: the store under a read/write lock
/// and the compiled pattern table.
pub struct ServerState {
    pub store: RwLock<GraphStore>,
    pub matcher: MatcherEngine,
}

impl ServerState {
    pub fn new(store: GraphStore, matcher: MatcherEngine) -> Self {
        ServerState {
            store: RwLock::new(store),
            matcher,
        }
    }
}

/// The axum server wrapper.
pub struct ArborServer {
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl ArborServer {
    pub fn new(store: GraphStore, matcher: MatcherEngine, config: ServerConfig) -> Self {
        ArborServer {
            state: Arc::new(ServerState::new(store, matcher)),
            config,
        }
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Bind and serve until the process is stopped.
    pub async fn start(&self) -> anyhow::Result<()> {
        let router = router::create_router(self.state());
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("listening on http://{addr}");
        axum::serve(listener, router).await?;
        Ok(())
    }
}
