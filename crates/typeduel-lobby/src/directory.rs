//! Lobby directory: creates, tracks and evicts lobby actors.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use typeduel_protocol::{LobbyId, PlayerId};

use crate::actor::{LobbyHandle, spawn_lobby};
use crate::config::EngineConfig;
use crate::error::LobbyError;
use crate::passage::SharedPassageSource;
use crate::store::{LobbyStore, SharedStore};

struct Inner {
    actors: Mutex<HashMap<LobbyId, LobbyHandle>>,
    store: SharedStore,
    passages: SharedPassageSource,
    config: Arc<EngineConfig>,
}

/// Index of live lobby actors, keyed by lobby id.
///
/// This is the entry point for lobby operations from higher layers: the
/// connection handler opens an actor on first connect, and the janitor
/// evicts it when the lobby is swept. Cheap to clone.
#[derive(Clone)]
pub struct LobbyDirectory {
    inner: Arc<Inner>,
}

impl LobbyDirectory {
    pub fn new(store: SharedStore, passages: SharedPassageSource, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                actors: Mutex::new(HashMap::new()),
                store,
                passages,
                config: Arc::new(config.validated()),
            }),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.inner.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Returns the lobby's actor, spawning it if there is none (or the
    /// previous one stopped).
    pub async fn open(&self, lobby_id: LobbyId) -> LobbyHandle {
        let mut actors = self.inner.actors.lock().await;
        if let Some(handle) = actors.get(&lobby_id).filter(|h| !h.is_closed()) {
            return handle.clone();
        }
        let handle = spawn_lobby(
            lobby_id,
            Arc::clone(&self.inner.store),
            Arc::clone(&self.inner.passages),
            Arc::clone(&self.inner.config),
        );
        actors.insert(lobby_id, handle.clone());
        tracing::info!(%lobby_id, "lobby actor opened");
        handle
    }

    /// The lobby's actor, if one is running.
    pub async fn get(&self, lobby_id: LobbyId) -> Option<LobbyHandle> {
        self.inner
            .actors
            .lock()
            .await
            .get(&lobby_id)
            .filter(|h| !h.is_closed())
            .cloned()
    }

    /// Live connections in the lobby. Zero when no actor runs.
    pub async fn live_connections(&self, lobby_id: LobbyId) -> usize {
        match self.get(lobby_id).await {
            Some(handle) => handle.snapshot().await.map(|s| s.connections).unwrap_or(0),
            None => 0,
        }
    }

    /// Removes a player's membership.
    ///
    /// A running actor does it so the lobby hears about the departure.
    /// Without one nobody is connected, and the row is deleted directly.
    /// Never spawns an actor.
    pub async fn leave(&self, lobby_id: LobbyId, player: PlayerId) -> Result<(), LobbyError> {
        if let Some(handle) = self.get(lobby_id).await {
            return handle.leave(player).await;
        }
        let store = &self.inner.store;
        if store.find_lobby(lobby_id).await?.is_none() {
            return Err(LobbyError::NotFound(lobby_id));
        }
        if !store.delete_membership(lobby_id, player).await? {
            return Err(LobbyError::NotMember(player, lobby_id));
        }
        tracing::info!(%lobby_id, %player, "player left idle lobby");
        Ok(())
    }

    /// Stops and forgets the lobby's actor. Returns `false` if none was
    /// tracked.
    pub async fn evict(&self, lobby_id: LobbyId) -> bool {
        let removed = self.inner.actors.lock().await.remove(&lobby_id);
        match removed {
            Some(handle) => {
                let _ = handle.shutdown().await;
                tracing::info!(%lobby_id, "lobby actor evicted");
                true
            }
            None => false,
        }
    }

    /// Number of tracked actors.
    pub async fn lobby_count(&self) -> usize {
        self.inner.actors.lock().await.len()
    }
}
