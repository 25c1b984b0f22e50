//! Persistence boundary: lobbies, memberships and player stats.
//!
//! The engine reads and writes rows through [`LobbyStore`] and never
//! assumes which database sits behind it. [`MemoryStore`] keeps
//! everything in process and backs the development server and the tests.

use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::sync::Arc;
use std::time::SystemTime;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::RwLock;
use typeduel_protocol::{LobbyId, PlayerId};

use crate::config::{LobbyMode, LobbyStatus};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised by store backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<Box<dyn Error + Send + Sync>>,
    },

    /// A uniqueness rule was violated (e.g. a join code already in use).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The row to update does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Constructs an unavailable error from any backend failure.
    pub fn unavailable(message: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        StoreError::Unavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A registered player and their lifetime race stats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub username: String,
    pub races_played: u32,
    pub wins: u32,
    pub best_wpm: u32,
}

impl PlayerRecord {
    /// A player with no races yet.
    pub fn new(id: PlayerId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            races_played: 0,
            wins: 0,
            best_wpm: 0,
        }
    }
}

/// Fields needed to create a lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLobby {
    pub join_code: String,
    pub host_id: PlayerId,
    pub mode: LobbyMode,
    pub max_players: u32,
    pub total_rounds: u32,
}

/// A persisted lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyRecord {
    pub id: LobbyId,
    pub join_code: String,
    pub host_id: PlayerId,
    pub mode: LobbyMode,
    pub max_players: u32,
    pub total_rounds: u32,
    pub status: LobbyStatus,
    pub passage_ref: Option<String>,
    pub passage_text: Option<String>,
    pub created_at: SystemTime,
    pub started_at: Option<SystemTime>,
    pub finished_at: Option<SystemTime>,
}

/// A player's seat in a lobby, including their current-round race fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipRecord {
    pub lobby_id: LobbyId,
    pub player_id: PlayerId,
    pub joined_at: SystemTime,
    pub ready: bool,
    pub progress: u32,
    pub finished: bool,
    pub finish_time: Option<f64>,
    pub wpm: Option<u32>,
    pub place: Option<u32>,
}

impl MembershipRecord {
    /// A fresh, not-ready membership.
    pub fn new(lobby_id: LobbyId, player_id: PlayerId) -> Self {
        Self {
            lobby_id,
            player_id,
            joined_at: SystemTime::now(),
            ready: false,
            progress: 0,
            finished: false,
            finish_time: None,
            wpm: None,
            place: None,
        }
    }

    /// Clears the fields that only describe the current round.
    pub fn reset_round(&mut self) {
        self.progress = 0;
        self.finished = false;
        self.finish_time = None;
        self.wpm = None;
        self.place = None;
    }
}

// ---------------------------------------------------------------------------
// LobbyStore
// ---------------------------------------------------------------------------

/// Abstraction over persistence backends.
///
/// Futures are boxed and `'static` so the trait stays object safe and a
/// single `Arc<dyn LobbyStore>` can be shared by every lobby actor.
pub trait LobbyStore: Send + Sync {
    fn find_player(&self, id: PlayerId) -> BoxFuture<'static, StoreResult<Option<PlayerRecord>>>;

    /// Inserts or replaces a player row.
    fn save_player(&self, player: PlayerRecord) -> BoxFuture<'static, StoreResult<()>>;

    /// Bumps lifetime stats after a finished race round: one more race,
    /// one more win when `won`, and a new best when `wpm` beats it.
    fn record_race_result(
        &self,
        id: PlayerId,
        wpm: u32,
        won: bool,
    ) -> BoxFuture<'static, StoreResult<()>>;

    /// Creates a lobby in `Waiting` status.
    ///
    /// Fails with [`StoreError::Conflict`] if the join code is held by a
    /// listed lobby.
    fn insert_lobby(&self, lobby: NewLobby) -> BoxFuture<'static, StoreResult<LobbyRecord>>;

    fn find_lobby(&self, id: LobbyId) -> BoxFuture<'static, StoreResult<Option<LobbyRecord>>>;

    fn find_lobby_by_code(&self, code: String) -> BoxFuture<'static, StoreResult<Option<LobbyRecord>>>;

    /// Overwrites an existing lobby row.
    fn update_lobby(&self, lobby: LobbyRecord) -> BoxFuture<'static, StoreResult<()>>;

    /// Deletes a lobby and all its memberships. Returns `false` if it did
    /// not exist.
    fn delete_lobby(&self, id: LobbyId) -> BoxFuture<'static, StoreResult<bool>>;

    fn list_lobbies(&self) -> BoxFuture<'static, StoreResult<Vec<LobbyRecord>>>;

    /// Memberships of a lobby in join order.
    fn members(&self, lobby_id: LobbyId) -> BoxFuture<'static, StoreResult<Vec<MembershipRecord>>>;

    fn find_membership(
        &self,
        lobby_id: LobbyId,
        player_id: PlayerId,
    ) -> BoxFuture<'static, StoreResult<Option<MembershipRecord>>>;

    /// Inserts a membership, or overwrites the existing one for the same
    /// (lobby, player) while keeping its join position.
    fn save_membership(&self, membership: MembershipRecord) -> BoxFuture<'static, StoreResult<()>>;

    /// Returns `false` if there was no such membership.
    fn delete_membership(
        &self,
        lobby_id: LobbyId,
        player_id: PlayerId,
    ) -> BoxFuture<'static, StoreResult<bool>>;

    /// Members of the lobby that finished the current round.
    fn count_finished(&self, lobby_id: LobbyId) -> BoxFuture<'static, StoreResult<usize>>;
}

/// Shared handle type used by the engine.
pub type SharedStore = Arc<dyn LobbyStore>;

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Tables {
    next_lobby_id: u64,
    players: HashMap<PlayerId, PlayerRecord>,
    lobbies: BTreeMap<LobbyId, LobbyRecord>,
    /// Per-lobby memberships, kept in join order.
    members: HashMap<LobbyId, Vec<MembershipRecord>>,
}

/// In-process [`LobbyStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LobbyStore for MemoryStore {
    fn find_player(&self, id: PlayerId) -> BoxFuture<'static, StoreResult<Option<PlayerRecord>>> {
        let tables = Arc::clone(&self.tables);
        Box::pin(async move { Ok(tables.read().await.players.get(&id).cloned()) })
    }

    fn save_player(&self, player: PlayerRecord) -> BoxFuture<'static, StoreResult<()>> {
        let tables = Arc::clone(&self.tables);
        Box::pin(async move {
            tables.write().await.players.insert(player.id, player);
            Ok(())
        })
    }

    fn record_race_result(
        &self,
        id: PlayerId,
        wpm: u32,
        won: bool,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let tables = Arc::clone(&self.tables);
        Box::pin(async move {
            let mut tables = tables.write().await;
            let player = tables
                .players
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("player {id}")))?;
            player.races_played += 1;
            if won {
                player.wins += 1;
            }
            player.best_wpm = player.best_wpm.max(wpm);
            Ok(())
        })
    }

    fn insert_lobby(&self, lobby: NewLobby) -> BoxFuture<'static, StoreResult<LobbyRecord>> {
        let tables = Arc::clone(&self.tables);
        Box::pin(async move {
            let mut tables = tables.write().await;
            if tables.lobbies.values().any(|l| l.join_code == lobby.join_code) {
                return Err(StoreError::Conflict(format!(
                    "join code {} already in use",
                    lobby.join_code
                )));
            }
            tables.next_lobby_id += 1;
            let record = LobbyRecord {
                id: LobbyId(tables.next_lobby_id),
                join_code: lobby.join_code,
                host_id: lobby.host_id,
                mode: lobby.mode,
                max_players: lobby.max_players,
                total_rounds: lobby.total_rounds,
                status: LobbyStatus::Waiting,
                passage_ref: None,
                passage_text: None,
                created_at: SystemTime::now(),
                started_at: None,
                finished_at: None,
            };
            tables.lobbies.insert(record.id, record.clone());
            Ok(record)
        })
    }

    fn find_lobby(&self, id: LobbyId) -> BoxFuture<'static, StoreResult<Option<LobbyRecord>>> {
        let tables = Arc::clone(&self.tables);
        Box::pin(async move { Ok(tables.read().await.lobbies.get(&id).cloned()) })
    }

    fn find_lobby_by_code(&self, code: String) -> BoxFuture<'static, StoreResult<Option<LobbyRecord>>> {
        let tables = Arc::clone(&self.tables);
        Box::pin(async move {
            let tables = tables.read().await;
            Ok(tables
                .lobbies
                .values()
                .find(|l| l.join_code.eq_ignore_ascii_case(&code))
                .cloned())
        })
    }

    fn update_lobby(&self, lobby: LobbyRecord) -> BoxFuture<'static, StoreResult<()>> {
        let tables = Arc::clone(&self.tables);
        Box::pin(async move {
            let mut tables = tables.write().await;
            match tables.lobbies.get_mut(&lobby.id) {
                Some(row) => {
                    *row = lobby;
                    Ok(())
                }
                None => Err(StoreError::NotFound(format!("lobby {}", lobby.id))),
            }
        })
    }

    fn delete_lobby(&self, id: LobbyId) -> BoxFuture<'static, StoreResult<bool>> {
        let tables = Arc::clone(&self.tables);
        Box::pin(async move {
            let mut tables = tables.write().await;
            tables.members.remove(&id);
            Ok(tables.lobbies.remove(&id).is_some())
        })
    }

    fn list_lobbies(&self) -> BoxFuture<'static, StoreResult<Vec<LobbyRecord>>> {
        let tables = Arc::clone(&self.tables);
        Box::pin(async move { Ok(tables.read().await.lobbies.values().cloned().collect()) })
    }

    fn members(&self, lobby_id: LobbyId) -> BoxFuture<'static, StoreResult<Vec<MembershipRecord>>> {
        let tables = Arc::clone(&self.tables);
        Box::pin(async move {
            Ok(tables
                .read()
                .await
                .members
                .get(&lobby_id)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn find_membership(
        &self,
        lobby_id: LobbyId,
        player_id: PlayerId,
    ) -> BoxFuture<'static, StoreResult<Option<MembershipRecord>>> {
        let tables = Arc::clone(&self.tables);
        Box::pin(async move {
            Ok(tables
                .read()
                .await
                .members
                .get(&lobby_id)
                .and_then(|rows| rows.iter().find(|m| m.player_id == player_id))
                .cloned())
        })
    }

    fn save_membership(&self, membership: MembershipRecord) -> BoxFuture<'static, StoreResult<()>> {
        let tables = Arc::clone(&self.tables);
        Box::pin(async move {
            let mut tables = tables.write().await;
            if !tables.lobbies.contains_key(&membership.lobby_id) {
                return Err(StoreError::NotFound(format!("lobby {}", membership.lobby_id)));
            }
            let rows = tables.members.entry(membership.lobby_id).or_default();
            match rows.iter_mut().find(|m| m.player_id == membership.player_id) {
                Some(row) => *row = membership,
                None => rows.push(membership),
            }
            Ok(())
        })
    }

    fn delete_membership(
        &self,
        lobby_id: LobbyId,
        player_id: PlayerId,
    ) -> BoxFuture<'static, StoreResult<bool>> {
        let tables = Arc::clone(&self.tables);
        Box::pin(async move {
            let mut tables = tables.write().await;
            let Some(rows) = tables.members.get_mut(&lobby_id) else {
                return Ok(false);
            };
            let before = rows.len();
            rows.retain(|m| m.player_id != player_id);
            Ok(rows.len() != before)
        })
    }

    fn count_finished(&self, lobby_id: LobbyId) -> BoxFuture<'static, StoreResult<usize>> {
        let tables = Arc::clone(&self.tables);
        Box::pin(async move {
            Ok(tables
                .read()
                .await
                .members
                .get(&lobby_id)
                .map(|rows| rows.iter().filter(|m| m.finished).count())
                .unwrap_or(0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_lobby(code: &str) -> NewLobby {
        NewLobby {
            join_code: code.into(),
            host_id: PlayerId(1),
            mode: LobbyMode::Race,
            max_players: 4,
            total_rounds: 1,
        }
    }

    #[tokio::test]
    async fn test_insert_lobby_rejects_duplicate_join_code() {
        let store = MemoryStore::new();
        let first = store.insert_lobby(new_lobby("ABC234")).await.unwrap();
        assert_eq!(first.status, LobbyStatus::Waiting);

        let dup = store.insert_lobby(new_lobby("ABC234")).await;
        assert!(matches!(dup, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_members_keep_join_order_across_updates() {
        let store = MemoryStore::new();
        let lobby = store.insert_lobby(new_lobby("ZZZ999")).await.unwrap();
        for id in [3, 1, 2] {
            store
                .save_membership(MembershipRecord::new(lobby.id, PlayerId(id)))
                .await
                .unwrap();
        }
        let mut first = store.find_membership(lobby.id, PlayerId(3)).await.unwrap().unwrap();
        first.ready = true;
        store.save_membership(first).await.unwrap();

        let order: Vec<_> = store
            .members(lobby.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| (m.player_id.0, m.ready))
            .collect();
        assert_eq!(order, vec![(3, true), (1, false), (2, false)]);
    }

    #[tokio::test]
    async fn test_count_finished_and_delete_cascade() {
        let store = MemoryStore::new();
        let lobby = store.insert_lobby(new_lobby("QQQ222")).await.unwrap();
        let mut done = MembershipRecord::new(lobby.id, PlayerId(1));
        done.finished = true;
        store.save_membership(done).await.unwrap();
        store
            .save_membership(MembershipRecord::new(lobby.id, PlayerId(2)))
            .await
            .unwrap();
        assert_eq!(store.count_finished(lobby.id).await.unwrap(), 1);

        assert!(store.delete_lobby(lobby.id).await.unwrap());
        assert!(store.members(lobby.id).await.unwrap().is_empty());
        assert!(!store.delete_lobby(lobby.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_record_race_result_updates_lifetime_stats() {
        let store = MemoryStore::new();
        store.save_player(PlayerRecord::new(PlayerId(1), "ada")).await.unwrap();

        store.record_race_result(PlayerId(1), 55, true).await.unwrap();
        store.record_race_result(PlayerId(1), 48, false).await.unwrap();

        let ada = store.find_player(PlayerId(1)).await.unwrap().unwrap();
        assert_eq!((ada.races_played, ada.wins, ada.best_wpm), (2, 1, 55));
    }

    #[tokio::test]
    async fn test_membership_for_missing_lobby_is_rejected() {
        let store = MemoryStore::new();
        let result = store
            .save_membership(MembershipRecord::new(LobbyId(99), PlayerId(1)))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_reset_round_keeps_ready_flag() {
        let mut m = MembershipRecord::new(LobbyId(1), PlayerId(1));
        m.ready = true;
        m.finished = true;
        m.place = Some(1);
        m.wpm = Some(70);
        m.reset_round();
        assert!(m.ready);
        assert!(!m.finished);
        assert_eq!((m.place, m.wpm, m.finish_time), (None, None, None));
    }
}
