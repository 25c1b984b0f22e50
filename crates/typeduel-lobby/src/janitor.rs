//! Periodic removal of stale lobbies.

use std::time::SystemTime;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use typeduel_protocol::LobbyId;

use crate::config::JanitorConfig;
use crate::directory::LobbyDirectory;
use crate::error::LobbyError;
use crate::store::{LobbyRecord, LobbyStore, SharedStore};

/// Sweeps lobbies that are old, idle and not mid-game.
pub struct Janitor {
    store: SharedStore,
    directory: LobbyDirectory,
    config: JanitorConfig,
}

impl Janitor {
    pub fn new(store: SharedStore, directory: LobbyDirectory, config: JanitorConfig) -> Self {
        Self {
            store,
            directory,
            config: config.validated(),
        }
    }

    /// Runs one sweep. Returns the deleted lobbies.
    ///
    /// A lobby is deleted when it is at least `stale_after` old, waiting
    /// or finished, and has nobody connected. Its memberships go with it
    /// and its actor is evicted.
    pub async fn sweep(&self) -> Result<Vec<LobbyId>, LobbyError> {
        let now = SystemTime::now();
        let mut swept = Vec::new();
        for lobby in self.store.list_lobbies().await? {
            if !self.is_stale(&lobby, now) {
                continue;
            }
            if self.directory.live_connections(lobby.id).await > 0 {
                debug!(lobby_id = %lobby.id, "stale lobby still has connections");
                continue;
            }
            if self.store.delete_lobby(lobby.id).await? {
                self.directory.evict(lobby.id).await;
                swept.push(lobby.id);
            }
        }
        if !swept.is_empty() {
            let live_actors = self.directory.lobby_count().await;
            info!(
                count = swept.len(),
                live_actors = live_actors,
                "stale lobbies swept"
            );
        }
        Ok(swept)
    }

    fn is_stale(&self, lobby: &LobbyRecord, now: SystemTime) -> bool {
        let age = now.duration_since(lobby.created_at).unwrap_or_default();
        lobby.status.is_sweepable() && age >= self.config.stale_after
    }

    /// Sweeps every `period` forever. Failed sweeps are logged and the
    /// loop carries on.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.config.period);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep().await {
                warn!(error = %e, "lobby sweep failed");
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
