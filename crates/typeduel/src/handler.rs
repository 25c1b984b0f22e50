//! Per-connection handler: admission, message routing and teardown.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Admission: ticket → user → lobby → membership. A failed check
//!      closes the socket with its refusal code.
//!   2. Register with the lobby actor; start the writer and keepalive.
//!   3. Loop: decode frames and forward them to the lobby until the client
//!      leaves, goes idle or is replaced by a newer connection.
//!   4. Deregister, flush the writer, close.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use typeduel_lobby::{LobbyStore, PlayerRecord, StoreError};
use typeduel_protocol::{ClientMessage, Codec, JsonCodec, LobbyId, ServerMessage};
use typeduel_session::Authenticator;
use typeduel_transport::{CloseReason, Connection, WebSocketConnection};

use crate::TypeduelError;
use crate::server::ServerState;
use crate::supervisor::spawn_keepalive;

/// How long teardown waits for queued messages to reach the socket.
const WRITER_FLUSH: Duration = Duration::from_secs(5);

/// A connection that passed every admission check.
struct Admitted {
    lobby_id: LobbyId,
    player: PlayerRecord,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A: Authenticator>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A>>,
) -> Result<(), TypeduelError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    debug!(%conn_id, path = conn.request().path(), "handling new connection");

    // --- Step 1: Admission ---
    let Admitted { lobby_id, player } = match admit(&conn, &state).await {
        Ok(admitted) => admitted,
        Err(reason) => {
            info!(%conn_id, %reason, "connection refused");
            conn.close_with(reason).await?;
            return Ok(());
        }
    };
    let player_id = player.id;

    // --- Step 2: Registration ---
    let (outbound, queue) = mpsc::channel(state.directory.config().outbound_buffer);
    let writer = tokio::spawn(write_loop(Arc::clone(&conn), state.codec, queue));
    let (detach_tx, mut detached) = oneshot::channel();

    let lobby = state.directory.open(lobby_id).await;
    if let Err(e) = lobby
        .connect(player_id, player.username.clone(), conn_id, outbound.clone(), detach_tx)
        .await
    {
        warn!(%conn_id, %player_id, %lobby_id, error = %e, "lobby refused connection");
        drop(outbound);
        let _ = tokio::time::timeout(WRITER_FLUSH, writer).await;
        conn.close_with(CloseReason::Internal).await?;
        return Err(e.into());
    }
    info!(%conn_id, %player_id, %lobby_id, username = %player.username, "player connected");
    let keepalive = spawn_keepalive(outbound.clone(), state.supervisor.keepalive_interval);

    // --- Step 3: Message loop ---
    let close = loop {
        let received = tokio::select! {
            r = tokio::time::timeout(state.supervisor.idle_timeout, conn.recv()) => r,
            d = &mut detached => {
                // Fired on replacement; dropped when the lobby let go of us.
                break Some(match d {
                    Ok(()) => CloseReason::Replaced,
                    Err(_) => CloseReason::Normal,
                });
            }
        };

        let data = match received {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                info!(%conn_id, %player_id, "connection closed cleanly");
                break None;
            }
            Ok(Err(e)) => {
                debug!(%conn_id, %player_id, error = %e, "recv error");
                break None;
            }
            Err(_) => {
                info!(%conn_id, %player_id, "connection idle; closing");
                let _ = outbound.try_send(ServerMessage::error("idle timeout"));
                break Some(CloseReason::IdleTimeout);
            }
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(%conn_id, %player_id, error = %e, "failed to decode message");
                let _ = outbound.try_send(ServerMessage::error(format!("malformed message: {e}")));
                continue;
            }
        };

        if msg == ClientMessage::Pong {
            continue;
        }
        if let Err(e) = lobby.send_message(player_id, conn_id, msg).await {
            warn!(%conn_id, %player_id, error = %e, "lobby unavailable");
            break Some(CloseReason::Internal);
        }
    };

    // --- Step 4: Teardown ---
    drop(keepalive);
    lobby.disconnect(player_id, conn_id).await;
    drop(outbound);
    if tokio::time::timeout(WRITER_FLUSH, writer).await.is_err() {
        debug!(%conn_id, "writer did not drain in time");
    }
    if let Some(reason) = close {
        debug!(%conn_id, %player_id, %reason, "closing connection");
        conn.close_with(reason).await?;
    }
    Ok(())
}

/// Runs the admission checks in order and names the first that fails.
async fn admit<A: Authenticator>(
    conn: &WebSocketConnection,
    state: &ServerState<A>,
) -> Result<Admitted, CloseReason> {
    let request = conn.request();

    let token = request
        .query_param("token")
        .filter(|t| !t.is_empty())
        .ok_or(CloseReason::InvalidCredential)?;
    let player_id = state.auth.authenticate(&token).await.map_err(|e| {
        debug!(conn_id = %conn.id(), error = %e, "credential rejected");
        CloseReason::InvalidCredential
    })?;

    let store = state.directory.store();
    let player = store
        .find_player(player_id)
        .await
        .map_err(internal)?
        .ok_or(CloseReason::UnknownUser)?;

    let mut segments = request.segments();
    let lobby_id = match (segments.next(), segments.next(), segments.next()) {
        (Some("ws"), Some(id), None) => id.parse().map(LobbyId).ok(),
        _ => None,
    }
    .ok_or(CloseReason::UnknownLobby)?;
    store
        .find_lobby(lobby_id)
        .await
        .map_err(internal)?
        .ok_or(CloseReason::UnknownLobby)?;

    store
        .find_membership(lobby_id, player_id)
        .await
        .map_err(internal)?
        .ok_or(CloseReason::NotMember)?;

    Ok(Admitted { lobby_id, player })
}

fn internal(e: StoreError) -> CloseReason {
    warn!(error = %e, "store failed during admission");
    CloseReason::Internal
}

/// Drains the connection's outbound queue onto the socket, in order.
async fn write_loop(
    conn: Arc<WebSocketConnection>,
    codec: JsonCodec,
    mut queue: mpsc::Receiver<ServerMessage>,
) {
    while let Some(msg) = queue.recv().await {
        let bytes = match codec.encode(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(conn_id = %conn.id(), error = %e, "failed to encode message");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            debug!(conn_id = %conn.id(), error = %e, "send failed; writer stopping");
            break;
        }
    }
}
