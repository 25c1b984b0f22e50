//! `TypeduelServer` builder and server loop.
//!
//! This is the entry point for running a typeduel sync server. It ties
//! together all the layers: transport → protocol → session → lobby.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, error, info};
use typeduel_lobby::{
    EngineConfig, Janitor, JanitorConfig, LobbyDirectory, MemoryStore, SharedPassageSource,
    SharedStore, StaticPassages,
};
use typeduel_protocol::JsonCodec;
use typeduel_session::Authenticator;
use typeduel_transport::{Transport, WebSocketTransport};

use crate::TypeduelError;
use crate::handler::handle_connection;
use crate::supervisor::SupervisorConfig;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A: Authenticator> {
    pub(crate) auth: A,
    pub(crate) codec: JsonCodec,
    pub(crate) directory: LobbyDirectory,
    pub(crate) supervisor: SupervisorConfig,
}

/// Builder for configuring and starting a typeduel server.
///
/// # Example
///
/// ```rust,ignore
/// use typeduel::prelude::*;
///
/// let server = TypeduelServer::builder()
///     .bind("0.0.0.0:8080")
///     .store(my_store)
///     .build(my_auth)
///     .await?;
/// server.run().await
/// ```
pub struct TypeduelServerBuilder {
    bind_addr: String,
    engine: EngineConfig,
    supervisor: SupervisorConfig,
    janitor: JanitorConfig,
    store: Option<SharedStore>,
    passages: Option<SharedPassageSource>,
}

impl TypeduelServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            engine: EngineConfig::default(),
            supervisor: SupervisorConfig::default(),
            janitor: JanitorConfig::default(),
            store: None,
            passages: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine = config;
        self
    }

    pub fn supervisor_config(mut self, config: SupervisorConfig) -> Self {
        self.supervisor = config;
        self
    }

    pub fn janitor_config(mut self, config: JanitorConfig) -> Self {
        self.janitor = config;
        self
    }

    /// Sets the persistence backend. Defaults to an empty [`MemoryStore`].
    pub fn store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the passage source. Defaults to [`StaticPassages::kjv_sample`].
    pub fn passages(mut self, passages: SharedPassageSource) -> Self {
        self.passages = Some(passages);
        self
    }

    /// Binds the listener and builds the server with the given
    /// authenticator.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<TypeduelServer<A>, TypeduelError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as SharedStore);
        let passages = self
            .passages
            .unwrap_or_else(|| Arc::new(StaticPassages::kjv_sample()) as SharedPassageSource);
        let directory = LobbyDirectory::new(store, passages, self.engine);

        let state = Arc::new(ServerState {
            auth,
            codec: JsonCodec,
            directory,
            supervisor: self.supervisor.validated(),
        });

        Ok(TypeduelServer {
            transport,
            state,
            janitor: self.janitor,
        })
    }
}

impl Default for TypeduelServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound typeduel server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TypeduelServer<A: Authenticator> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A>>,
    janitor: JanitorConfig,
}

impl<A: Authenticator> TypeduelServer<A> {
    /// Creates a new builder.
    pub fn builder() -> TypeduelServerBuilder {
        TypeduelServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The lobby actors this server routes connections to.
    pub fn directory(&self) -> &LobbyDirectory {
        &self.state.directory
    }

    pub fn store(&self) -> &SharedStore {
        self.state.directory.store()
    }

    /// Runs the stale-lobby sweep and the accept loop.
    ///
    /// Each accepted connection gets its own handler task. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), TypeduelError> {
        let _janitor = Janitor::new(
            Arc::clone(self.state.directory.store()),
            self.state.directory.clone(),
            self.janitor,
        )
        .spawn();
        info!(addr = ?self.transport.local_addr().ok(), "typeduel server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                }
            }
        }
    }
}
