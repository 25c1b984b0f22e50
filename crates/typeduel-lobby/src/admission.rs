//! Creating and joining lobbies by join code.

use rand::Rng;
use tracing::{debug, info};
use typeduel_protocol::PlayerId;

use crate::config::{LobbyMode, LobbyStatus};
use crate::error::LobbyError;
use crate::store::{LobbyRecord, LobbyStore, MembershipRecord, NewLobby, StoreError};

/// Characters used in join codes. No 0/O or 1/I.
pub const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const JOIN_CODE_LEN: usize = 6;

/// Codes tried before giving up on a crowded code space.
const MAX_CODE_ATTEMPTS: usize = 32;

/// Parameters of a lobby being opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyRequest {
    pub host: PlayerId,
    pub mode: LobbyMode,
    pub max_players: u32,
    pub total_rounds: u32,
}

/// Generates a random join code.
pub fn generate_join_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_ALPHABET[rng.random_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Opens a lobby with a fresh join code and seats the host in it.
pub async fn open_lobby(
    store: &dyn LobbyStore,
    request: LobbyRequest,
) -> Result<LobbyRecord, LobbyError> {
    open_lobby_with(store, request, || generate_join_code(&mut rand::rng())).await
}

async fn open_lobby_with(
    store: &dyn LobbyStore,
    request: LobbyRequest,
    mut next_code: impl FnMut() -> String,
) -> Result<LobbyRecord, LobbyError> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let new = NewLobby {
            join_code: next_code(),
            host_id: request.host,
            mode: request.mode,
            max_players: request.max_players.max(2),
            total_rounds: request.total_rounds.max(1),
        };
        match store.insert_lobby(new).await {
            Ok(lobby) => {
                store
                    .save_membership(MembershipRecord::new(lobby.id, request.host))
                    .await?;
                info!(lobby_id = %lobby.id, join_code = %lobby.join_code, mode = %lobby.mode, "lobby opened");
                return Ok(lobby);
            }
            Err(StoreError::Conflict(reason)) => debug!(reason, "join code taken; retrying"),
            Err(e) => return Err(e.into()),
        }
    }
    Err(LobbyError::JoinCodeExhausted)
}

/// Seats `player` in the waiting lobby identified by `code`.
///
/// Joining a lobby the player already sits in is a no-op.
pub async fn join_lobby(
    store: &dyn LobbyStore,
    code: &str,
    player: PlayerId,
) -> Result<LobbyRecord, LobbyError> {
    let lobby = store
        .find_lobby_by_code(code.trim().to_ascii_uppercase())
        .await?
        .ok_or_else(|| LobbyError::UnknownJoinCode(code.to_string()))?;

    if store.find_membership(lobby.id, player).await?.is_some() {
        return Ok(lobby);
    }
    if lobby.status != LobbyStatus::Waiting {
        return Err(LobbyError::InvalidState(format!(
            "cannot join lobby in status {}",
            lobby.status
        )));
    }
    let seated = store.members(lobby.id).await?.len();
    if seated >= lobby.max_players as usize {
        return Err(LobbyError::LobbyFull(lobby.id));
    }

    store
        .save_membership(MembershipRecord::new(lobby.id, player))
        .await?;
    info!(lobby_id = %lobby.id, %player, "player joined lobby");
    Ok(lobby)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    fn request(max_players: u32) -> LobbyRequest {
        LobbyRequest {
            host: pid(1),
            mode: LobbyMode::Race,
            max_players,
            total_rounds: 1,
        }
    }

    #[test]
    fn test_join_code_uses_unambiguous_alphabet() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let code = generate_join_code(&mut rng);
            assert_eq!(code.len(), JOIN_CODE_LEN);
            assert!(code.bytes().all(|b| JOIN_CODE_ALPHABET.contains(&b)));
        }
    }

    #[tokio::test]
    async fn test_open_lobby_retries_on_code_collision() {
        let store = MemoryStore::new();
        let first = open_lobby_with(&store, request(4), || "AAAAAA".into()).await.unwrap();

        let mut codes = vec!["AAAAAA", "AAAAAA", "BBBBBB"].into_iter();
        let second = open_lobby_with(&store, request(4), || codes.next().unwrap_or("CCCCCC").into())
            .await
            .unwrap();

        assert_eq!(first.join_code, "AAAAAA");
        assert_eq!(second.join_code, "BBBBBB");
    }

    #[tokio::test]
    async fn test_open_lobby_gives_up_when_codes_exhausted() {
        let store = MemoryStore::new();
        open_lobby_with(&store, request(4), || "AAAAAA".into()).await.unwrap();
        let result = open_lobby_with(&store, request(4), || "AAAAAA".into()).await;
        assert!(matches!(result, Err(LobbyError::JoinCodeExhausted)));
    }

    #[tokio::test]
    async fn test_open_lobby_codes_are_unique_and_host_is_seated() {
        let store = MemoryStore::new();
        let mut codes = HashSet::new();
        for _ in 0..50 {
            let lobby = open_lobby(&store, request(4)).await.unwrap();
            assert!(codes.insert(lobby.join_code.clone()));
            let host = store.find_membership(lobby.id, pid(1)).await.unwrap();
            assert!(host.is_some());
        }
    }

    #[tokio::test]
    async fn test_join_lobby_is_idempotent_and_case_insensitive() {
        let store = MemoryStore::new();
        let lobby = open_lobby_with(&store, request(4), || "ABC234".into()).await.unwrap();

        join_lobby(&store, "abc234", pid(2)).await.unwrap();
        join_lobby(&store, "ABC234", pid(2)).await.unwrap();

        assert_eq!(store.members(lobby.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_join_lobby_rejects_full_started_and_unknown() {
        let store = MemoryStore::new();
        let mut lobby = open_lobby_with(&store, request(2), || "FULL22".into()).await.unwrap();
        join_lobby(&store, "FULL22", pid(2)).await.unwrap();

        let full = join_lobby(&store, "FULL22", pid(3)).await;
        assert!(matches!(full, Err(LobbyError::LobbyFull(_))));

        lobby.status = LobbyStatus::Racing;
        store.update_lobby(lobby).await.unwrap();
        let started = join_lobby(&store, "FULL22", pid(3)).await;
        assert!(matches!(started, Err(LobbyError::InvalidState(_))));

        let unknown = join_lobby(&store, "ZZZZZZ", pid(3)).await;
        assert!(matches!(unknown, Err(LobbyError::UnknownJoinCode(_))));
    }
}
