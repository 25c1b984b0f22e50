//! Live connections of one lobby and the per-round race scratch.
//!
//! The registry is owned by its lobby actor, so it needs no locking. It
//! maps each player to exactly one outbound queue; a second connection
//! for the same player replaces the first.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use typeduel_protocol::{PlayerId, ServerMessage};
use typeduel_transport::ConnectionId;

/// Bounded queue feeding one connection's writer task.
pub type Outbound = mpsc::Sender<ServerMessage>;

/// A registered connection.
#[derive(Debug)]
struct Peer {
    conn: ConnectionId,
    username: String,
    tx: Outbound,
    /// Fired when this peer is replaced by a newer connection.
    detached: oneshot::Sender<()>,
}

/// A player's live race state for the current round.
///
/// Only held while the player is connected; the persisted membership row
/// carries what outlives the connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaceScratch {
    pub progress: u32,
    pub wpm: u32,
    pub finished: bool,
    pub finish_time: Option<f64>,
}

/// Connection registry for a single lobby.
#[derive(Debug, Default)]
pub struct Registry {
    peers: HashMap<PlayerId, Peer>,
    scratch: HashMap<PlayerId, RaceScratch>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `player`'s connection and starts them with fresh race
    /// scratch.
    ///
    /// Returns `true` if an older connection for the same player was
    /// replaced. The old connection is told through its `detached`
    /// channel.
    pub fn register(
        &mut self,
        player: PlayerId,
        username: impl Into<String>,
        conn: ConnectionId,
        tx: Outbound,
        detached: oneshot::Sender<()>,
    ) -> bool {
        let peer = Peer {
            conn,
            username: username.into(),
            tx,
            detached,
        };
        self.scratch.insert(player, RaceScratch::default());
        match self.peers.insert(player, peer) {
            Some(old) => {
                debug!(%player, old = %old.conn, new = %conn, "connection replaced");
                let _ = old.detached.send(());
                true
            }
            None => false,
        }
    }

    /// Removes `player` if `conn` is still their current connection.
    ///
    /// A stale connection (already replaced) is a no-op, which is what
    /// keeps one `player_left` per departure.
    pub fn deregister(&mut self, player: PlayerId, conn: ConnectionId) -> bool {
        match self.peers.get(&player) {
            Some(peer) if peer.conn == conn => {
                self.remove(player);
                true
            }
            _ => false,
        }
    }

    /// Removes `player` whatever their connection.
    pub fn remove(&mut self, player: PlayerId) -> bool {
        let removed = self.peers.remove(&player).is_some();
        self.scratch.remove(&player);
        if self.peers.is_empty() {
            self.scratch = HashMap::new();
        }
        removed
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.peers.contains_key(&player)
    }

    pub fn current_conn(&self, player: PlayerId) -> Option<ConnectionId> {
        self.peers.get(&player).map(|p| p.conn)
    }

    pub fn username(&self, player: PlayerId) -> Option<&str> {
        self.peers.get(&player).map(|p| p.username.as_str())
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Connected players, in no particular order.
    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.peers.keys().copied()
    }

    /// Queues `msg` for every connected player.
    ///
    /// Recipients whose queue is full or closed are removed and returned;
    /// the caller announces their departure.
    #[must_use = "dropped recipients must be announced"]
    pub fn broadcast(&mut self, msg: &ServerMessage) -> Vec<PlayerId> {
        let dropped: Vec<PlayerId> = self
            .peers
            .iter()
            .filter(|(_, peer)| peer.tx.try_send(msg.clone()).is_err())
            .map(|(id, _)| *id)
            .collect();
        for player in &dropped {
            warn!(%player, "outbound queue full or closed; dropping connection");
            self.remove(*player);
        }
        dropped
    }

    /// Queues `msg` for one player. Returns `false` if they were dropped
    /// (or were not connected).
    #[must_use = "a dropped recipient must be announced"]
    pub fn send_to(&mut self, player: PlayerId, msg: ServerMessage) -> bool {
        let Some(peer) = self.peers.get(&player) else {
            return false;
        };
        if peer.tx.try_send(msg).is_ok() {
            return true;
        }
        warn!(%player, "outbound queue full or closed; dropping connection");
        self.remove(player);
        false
    }

    /// The race scratch for `player`, created on first use.
    pub fn scratch_mut(&mut self, player: PlayerId) -> &mut RaceScratch {
        self.scratch.entry(player).or_default()
    }

    pub fn scratch(&self, player: PlayerId) -> Option<&RaceScratch> {
        self.scratch.get(&player)
    }

    /// Clears every player's race scratch for a new round.
    pub fn reset_scratch(&mut self) {
        self.scratch.clear();
    }
}
