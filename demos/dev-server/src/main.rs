//! Local development server.
//!
//! Seeds an in-memory store with two players and a waiting race lobby,
//! prints a connect URL for each player, then serves until killed.
//!
//! `TYPEDUEL_BIND` (or `PORT`) overrides the listen address (default
//! `127.0.0.1:8080`); `RUST_LOG` the log filter.

use std::sync::Arc;

use tracing::info;
use typeduel::prelude::*;

// ---------------------------------------------------------------------------
// Seed data
// ---------------------------------------------------------------------------

const PLAYERS: [(u64, &str); 2] = [(1, "ada"), (2, "bob")];

/// Creates the players and a two-round race lobby hosted by the first.
async fn seed(store: &MemoryStore) -> Result<LobbyId, TypeduelError> {
    for (id, name) in PLAYERS {
        store.save_player(PlayerRecord::new(PlayerId(id), name)).await?;
    }
    let lobby = open_lobby(
        store,
        LobbyRequest {
            host: PlayerId(PLAYERS[0].0),
            mode: LobbyMode::Race,
            max_players: 4,
            total_rounds: 2,
        },
    )
    .await?;
    for (id, _) in &PLAYERS[1..] {
        join_lobby(store, &lobby.join_code, PlayerId(*id)).await?;
    }
    info!(lobby_id = %lobby.id, join_code = %lobby.join_code, "seeded lobby");
    Ok(lobby.id)
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

/// `TYPEDUEL_BIND`, else `127.0.0.1:$PORT`, else `127.0.0.1:8080`.
fn bind_addr() -> String {
    if let Ok(addr) = std::env::var("TYPEDUEL_BIND") {
        return addr;
    }
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);
    format!("127.0.0.1:{port}")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("info,typeduel=debug,typeduel_lobby=debug");

    let bind = bind_addr();
    let store = MemoryStore::new();
    let lobby_id = seed(&store).await?;

    // Long-lived tickets so the printed URLs survive a slow copy-paste.
    let tickets = Arc::new(TicketBook::new(std::time::Duration::from_secs(60 * 60)));
    let server = TypeduelServer::<Arc<TicketBook>>::builder()
        .bind(&bind)
        .store(Arc::new(store))
        .build(Arc::clone(&tickets))
        .await?;
    let addr = server.local_addr()?;

    for (id, name) in PLAYERS {
        let token = tickets.issue(PlayerId(id)).await;
        eprintln!("{name}: ws://{addr}/ws/{}?token={token}", lobby_id.0);
    }

    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_seats_every_player() {
        let store = MemoryStore::new();
        let lobby_id = seed(&store).await.unwrap();

        let members = store.members(lobby_id).await.unwrap();
        let ids: Vec<_> = members.iter().map(|m| m.player_id).collect();
        assert_eq!(ids, vec![PlayerId(1), PlayerId(2)]);

        let lobby = store.find_lobby(lobby_id).await.unwrap().unwrap();
        assert_eq!(lobby.status, LobbyStatus::Waiting);
        assert_eq!(lobby.total_rounds, 2);
    }
}
