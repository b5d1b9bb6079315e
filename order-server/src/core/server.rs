//! Server Implementation
//!
//! HTTP 服务器启动和管理

use crate::core::{Config, Result, ServerState};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// HTTP Server
pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Create server with existing state (tests share it with oneshot calls)
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    pub async fn run(&self) -> Result<()> {
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(&self.config).await?,
        };

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("🦀 Order server starting on {}", addr);

        Self::serve(state, listener).await
    }

    /// Serve on an already bound listener until Ctrl-C or `state.shutdown`
    pub async fn serve(state: ServerState, listener: TcpListener) -> Result<()> {
        state.start_background_tasks();
        let app = crate::api::build_app(state.clone());

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(state.shutdown.clone()))
            .await?;

        state.shutdown().await;
        tracing::info!("Server stopped");
        Ok(())
    }
}

/// Ctrl-C 或取消令牌触发，先取消令牌让 WebSocket 连接退出
async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down...");
        }
        _ = token.cancelled() => {}
    }
    token.cancel();
}
