//! `RelayServer` builder and accept loop.
//!
//! This is the entry point for running a relay. It ties the layers
//! together: transport → frames → session host → engine.

use std::net::SocketAddr;
use std::sync::Arc;

use avatar_relay_engine::{RelayEngine, TokioScheduler};
use avatar_relay_protocol::ChannelRegistry;
use avatar_relay_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{RelayConfig, RelayError, SessionHost};

/// The engine type the reference server runs.
pub type Engine = RelayEngine<SessionHost, TokioScheduler>;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
pub(crate) struct ServerState {
    pub(crate) host: Arc<SessionHost>,
    pub(crate) engine: Arc<Engine>,
}

/// Builder for configuring and starting a relay server.
///
/// # Example
///
/// ```rust,no_run
/// use avatar_relay::prelude::*;
///
/// # async fn start() -> Result<(), RelayError> {
/// let server = RelayServer::builder()
///     .config(RelayConfig::load("relay.json")?)
///     .bind("0.0.0.0:25580")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Default)]
pub struct RelayServerBuilder {
    config: RelayConfig,
    bind_addr: Option<String>,
}

impl RelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address to bind to, overriding the config's `bind`.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = Some(addr.to_string());
        self
    }

    /// Sets the relay configuration.
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the transport and builds the engine.
    ///
    /// Must be called inside a Tokio runtime: the engine's scheduler is
    /// tied to the current one.
    pub async fn build(self) -> Result<RelayServer, RelayError> {
        let addr = self.bind_addr.unwrap_or_else(|| self.config.bind.clone());
        let transport = WebSocketTransport::bind(&addr).await?;

        let registry = Arc::new(ChannelRegistry::default());
        let engine_config = self.config.engine_config();
        tracing::info!(
            inbound = ?registry.inbound_channels(),
            outbound = ?registry.outbound_channels(),
            join_sync_delay_ms = self.config.join_sync_delay_ms,
            debug = engine_config.trace.enabled,
            payload_hex_max_bytes = engine_config.trace.payload_hex_max_bytes,
            log_recipients = engine_config.trace.log_recipients,
            "relay configured"
        );

        let host = Arc::new(SessionHost::new());
        let engine = Arc::new(RelayEngine::new(
            Arc::clone(&host),
            TokioScheduler::current(),
            registry,
            engine_config,
        ));

        Ok(RelayServer {
            transport,
            state: Arc::new(ServerState { host, engine }),
        })
    }
}

/// A relay server bound to its address.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RelayServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl RelayServer {
    /// Creates a new builder.
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.transport.local_addr()?)
    }

    /// The engine, for inspecting the model cache.
    pub fn engine(&self) -> Arc<Engine> {
        Arc::clone(&self.state.engine)
    }

    /// Runs the accept loop.
    ///
    /// Spawns a handler task for each accepted connection. Runs until the
    /// process is terminated; a failed accept is logged and skipped.
    pub async fn run(mut self) -> Result<(), RelayError> {
        tracing::info!("relay server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
