//! Integration tests for lobby actors: race and quiz games driven through
//! a `LobbyDirectory` with in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use typeduel_lobby::{
    EngineConfig, LobbyDirectory, LobbyHandle, LobbyMode, LobbyRecord, LobbyRequest, LobbyStatus,
    LobbyStore, MemoryStore, PlayerRecord, StaticPassages, join_lobby, open_lobby,
};
use typeduel_protocol::{ClientMessage, PlayerId, ServerMessage};
use typeduel_transport::ConnectionId;

// =========================================================================
// Helpers
// =========================================================================

fn pid(id: u64) -> PlayerId {
    PlayerId(id)
}

struct Client {
    player: PlayerId,
    conn: ConnectionId,
    rx: mpsc::Receiver<ServerMessage>,
    detached: oneshot::Receiver<()>,
}

impl Client {
    async fn next(&mut self) -> ServerMessage {
        tokio::time::timeout(Duration::from_secs(60), self.rx.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("outbound queue closed")
    }

    /// Skips messages until one matches.
    async fn next_matching(&mut self, pred: impl Fn(&ServerMessage) -> bool) -> ServerMessage {
        loop {
            let msg = self.next().await;
            if pred(&msg) {
                return msg;
            }
        }
    }

    async fn send(&self, handle: &LobbyHandle, msg: ClientMessage) {
        handle.send_message(self.player, self.conn, msg).await.unwrap();
    }
}

struct Fixture {
    store: MemoryStore,
    directory: LobbyDirectory,
    lobby: LobbyRecord,
    handle: LobbyHandle,
}

async fn fixture(mode: LobbyMode, total_rounds: u32) -> Fixture {
    let store = MemoryStore::new();
    store.save_player(PlayerRecord::new(pid(1), "ada")).await.unwrap();
    store.save_player(PlayerRecord::new(pid(2), "bob")).await.unwrap();

    let lobby = open_lobby(
        &store,
        LobbyRequest {
            host: pid(1),
            mode,
            max_players: 4,
            total_rounds,
        },
    )
    .await
    .unwrap();
    join_lobby(&store, &lobby.join_code, pid(2)).await.unwrap();

    let directory = LobbyDirectory::new(
        Arc::new(store.clone()),
        Arc::new(StaticPassages::kjv_sample()),
        EngineConfig::default(),
    );
    let handle = directory.open(lobby.id).await;
    Fixture {
        store,
        directory,
        lobby,
        handle,
    }
}

async fn connect(handle: &LobbyHandle, id: u64, name: &str, conn: u64) -> Client {
    let (tx, rx) = mpsc::channel(64);
    let (detach_tx, detached) = oneshot::channel();
    let conn = ConnectionId::new(conn);
    handle.connect(pid(id), name, conn, tx, detach_tx).await.unwrap();
    Client {
        player: pid(id),
        conn,
        rx,
        detached,
    }
}

/// Connects ada and bob and drains the join announcements.
async fn seat_both(handle: &LobbyHandle) -> (Client, Client) {
    let mut a = connect(handle, 1, "ada", 1).await;
    let mut b = connect(handle, 2, "bob", 2).await;
    a.next_matching(|m| matches!(m, ServerMessage::PlayerJoined { user_id, .. } if *user_id == pid(2)))
        .await;
    b.next_matching(|m| matches!(m, ServerMessage::PlayerJoined { .. })).await;
    (a, b)
}

async fn ready_both(handle: &LobbyHandle, a: &Client, b: &Client) {
    a.send(handle, ClientMessage::Ready { ready: Some(true) }).await;
    b.send(handle, ClientMessage::Ready { ready: None }).await;
}

async fn status(fx: &Fixture) -> LobbyStatus {
    // A snapshot round-trip lets the actor finish whatever it was doing.
    fx.handle.snapshot().await.unwrap();
    fx.store.find_lobby(fx.lobby.id).await.unwrap().unwrap().status
}

fn is_race_start(msg: &ServerMessage) -> bool {
    matches!(msg, ServerMessage::RaceStart { .. })
}

fn is_question(msg: &ServerMessage) -> bool {
    matches!(msg, ServerMessage::Question { .. })
}

/// The option whose text matches the question's verse.
fn correct_option(msg: &ServerMessage) -> String {
    let ServerMessage::Question { verse_text, options, .. } = msg else {
        panic!("expected a question, got {msg:?}");
    };
    let passages = StaticPassages::kjv_sample();
    options
        .iter()
        .find(|o| passages.lookup(o).is_some_and(|p| &p.text == verse_text))
        .cloned()
        .expect("one option matches the verse")
}

fn wrong_option(msg: &ServerMessage) -> String {
    let correct = correct_option(msg);
    let ServerMessage::Question { options, .. } = msg else {
        unreachable!()
    };
    options.iter().find(|o| **o != correct).cloned().unwrap()
}

// =========================================================================
// Race
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_race_single_round_full_flow() {
    let fx = fixture(LobbyMode::Race, 1).await;
    let (mut a, mut b) = seat_both(&fx.handle).await;
    ready_both(&fx.handle, &a, &b).await;

    assert_eq!(
        a.next().await,
        ServerMessage::PlayerReady { user_id: pid(1), ready: true }
    );
    assert_eq!(
        a.next().await,
        ServerMessage::PlayerReady { user_id: pid(2), ready: true }
    );
    for seconds in [3, 2, 1] {
        assert_eq!(a.next().await, ServerMessage::Countdown { seconds });
    }
    let ServerMessage::RaceStart { verse_text, reference, round, total_rounds, .. } = a.next().await
    else {
        panic!("expected race_start");
    };
    assert_eq!((round, total_rounds), (1, 1));
    assert!(!verse_text.is_empty());
    assert!(EngineConfig::default().reference_pool.contains(&reference));
    b.next_matching(is_race_start).await;
    assert_eq!(status(&fx).await, LobbyStatus::Racing);

    a.send(&fx.handle, ClientMessage::Finished { time: 10.0, wpm: 60, accuracy: 98.0 }).await;
    b.send(&fx.handle, ClientMessage::Finished { time: 12.0, wpm: 50, accuracy: 95.0 }).await;

    assert_eq!(
        a.next().await,
        ServerMessage::PlayerFinished { user_id: pid(1), place: 1, time: 10.0, wpm: 60, accuracy: 98.0 }
    );
    assert_eq!(
        a.next().await,
        ServerMessage::PlayerFinished { user_id: pid(2), place: 2, time: 12.0, wpm: 50, accuracy: 95.0 }
    );
    let ServerMessage::RaceEnd { results, cumulative, total_rounds } = a.next().await else {
        panic!("expected race_end");
    };
    assert_eq!(total_rounds, 1);
    let order: Vec<_> = results.iter().map(|r| (r.user_id, r.place)).collect();
    assert_eq!(order, vec![(pid(1), Some(1)), (pid(2), Some(2))]);
    assert_eq!(cumulative[0].user_id, pid(1));
    assert_eq!(cumulative[0].username, "ada");

    assert_eq!(status(&fx).await, LobbyStatus::Finished);
    let ada = fx.store.find_player(pid(1)).await.unwrap().unwrap();
    let bob = fx.store.find_player(pid(2)).await.unwrap().unwrap();
    assert_eq!((ada.races_played, ada.wins, ada.best_wpm), (1, 1, 60));
    assert_eq!((bob.races_played, bob.wins, bob.best_wpm), (1, 0, 50));
}

#[tokio::test(start_paused = true)]
async fn test_race_two_rounds_reports_rounded_average() {
    let fx = fixture(LobbyMode::Race, 2).await;
    let (mut a, mut b) = seat_both(&fx.handle).await;
    ready_both(&fx.handle, &a, &b).await;

    a.next_matching(is_race_start).await;
    let started_at = fx.store.find_lobby(fx.lobby.id).await.unwrap().unwrap().started_at;
    assert!(started_at.is_some());
    a.send(&fx.handle, ClientMessage::Finished { time: 10.0, wpm: 60, accuracy: 99.0 }).await;
    b.send(&fx.handle, ClientMessage::Finished { time: 12.0, wpm: 50, accuracy: 99.0 }).await;

    let ServerMessage::RoundEnd { round, total_rounds, cumulative, .. } = a
        .next_matching(|m| matches!(m, ServerMessage::RoundEnd { .. }))
        .await
    else {
        unreachable!()
    };
    assert_eq!((round, total_rounds), (1, 2));
    assert_eq!(cumulative[0].average_wpm, 60);

    // Status stays racing between rounds; the countdown runs again.
    assert_eq!(status(&fx).await, LobbyStatus::Racing);
    for seconds in [3, 2, 1] {
        assert_eq!(a.next().await, ServerMessage::Countdown { seconds });
    }
    let ServerMessage::RaceStart { round, .. } = a.next().await else {
        panic!("expected race_start");
    };
    assert_eq!(round, 2);
    // The game's start time is the first round's.
    let lobby = fx.store.find_lobby(fx.lobby.id).await.unwrap().unwrap();
    assert_eq!(lobby.started_at, started_at);

    a.send(&fx.handle, ClientMessage::Finished { time: 11.0, wpm: 61, accuracy: 99.0 }).await;
    b.send(&fx.handle, ClientMessage::Finished { time: 9.0, wpm: 70, accuracy: 99.0 }).await;

    let ServerMessage::RaceEnd { results, cumulative, .. } = a
        .next_matching(|m| matches!(m, ServerMessage::RaceEnd { .. }))
        .await
    else {
        unreachable!()
    };
    // Places follow arrival order, not reported time.
    assert_eq!(results[0].user_id, pid(1));
    // ada: (60 + 61) / 2 = 60.5 -> 61; bob: (50 + 70) / 2 = 60.
    let averages: Vec<_> = cumulative.iter().map(|c| (c.user_id, c.average_wpm, c.rank)).collect();
    assert_eq!(averages, vec![(pid(1), 61, 1), (pid(2), 60, 2)]);
    assert_eq!(cumulative[0].total_time, 21.0);
    assert_eq!(status(&fx).await, LobbyStatus::Finished);
    let lobby = fx.store.find_lobby(fx.lobby.id).await.unwrap().unwrap();
    assert_eq!(lobby.started_at, started_at);
}

#[tokio::test(start_paused = true)]
async fn test_ready_toggle_back_prevents_countdown() {
    let fx = fixture(LobbyMode::Race, 1).await;
    let (mut a, b) = seat_both(&fx.handle).await;

    a.send(&fx.handle, ClientMessage::Ready { ready: None }).await;
    a.send(&fx.handle, ClientMessage::Ready { ready: None }).await;
    b.send(&fx.handle, ClientMessage::Ready { ready: Some(true) }).await;

    assert_eq!(a.next().await, ServerMessage::PlayerReady { user_id: pid(1), ready: true });
    assert_eq!(a.next().await, ServerMessage::PlayerReady { user_id: pid(1), ready: false });
    assert_eq!(a.next().await, ServerMessage::PlayerReady { user_id: pid(2), ready: true });

    let snapshot = fx.handle.snapshot().await.unwrap();
    assert!(!snapshot.pacing);
    assert_eq!(snapshot.round, None);
    assert_eq!(status(&fx).await, LobbyStatus::Waiting);
    assert!(a.rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_lone_ready_member_does_not_start_countdown() {
    let fx = fixture(LobbyMode::Race, 1).await;
    fx.directory.leave(fx.lobby.id, pid(2)).await.unwrap();
    let mut a = connect(&fx.handle, 1, "ada", 1).await;
    a.next_matching(|m| matches!(m, ServerMessage::PlayerJoined { .. })).await;

    a.send(&fx.handle, ClientMessage::Ready { ready: Some(true) }).await;
    assert_eq!(a.next().await, ServerMessage::PlayerReady { user_id: pid(1), ready: true });

    let snapshot = fx.handle.snapshot().await.unwrap();
    assert!(!snapshot.pacing);
    assert_eq!(snapshot.round, None);
    assert_eq!(status(&fx).await, LobbyStatus::Waiting);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(a.rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_finish_and_late_progress_are_ignored() {
    let fx = fixture(LobbyMode::Race, 1).await;
    let (mut a, b) = seat_both(&fx.handle).await;
    ready_both(&fx.handle, &a, &b).await;
    a.next_matching(is_race_start).await;

    a.send(&fx.handle, ClientMessage::Progress { chars: 40, wpm: 58 }).await;
    a.send(&fx.handle, ClientMessage::Finished { time: 10.0, wpm: 60, accuracy: 98.0 }).await;
    a.send(&fx.handle, ClientMessage::Finished { time: 9.0, wpm: 90, accuracy: 98.0 }).await;
    a.send(&fx.handle, ClientMessage::Progress { chars: 3, wpm: 1 }).await;

    assert_eq!(
        a.next().await,
        ServerMessage::Progress { user_id: pid(1), chars: 40, wpm: 58 }
    );
    assert!(matches!(a.next().await, ServerMessage::PlayerFinished { place: 1, wpm: 60, .. }));
    fx.handle.snapshot().await.unwrap();
    assert!(a.rx.try_recv().is_err());

    let row = fx.store.find_membership(fx.lobby.id, pid(1)).await.unwrap().unwrap();
    assert_eq!((row.place, row.wpm, row.progress), (Some(1), Some(60), 40));
}

#[tokio::test(start_paused = true)]
async fn test_finish_before_race_start_is_ignored() {
    let fx = fixture(LobbyMode::Race, 1).await;
    let (mut a, b) = seat_both(&fx.handle).await;
    ready_both(&fx.handle, &a, &b).await;
    a.next_matching(|m| *m == ServerMessage::Countdown { seconds: 3 }).await;

    a.send(&fx.handle, ClientMessage::Finished { time: 1.0, wpm: 999, accuracy: 100.0 }).await;
    assert_eq!(a.next().await, ServerMessage::Countdown { seconds: 2 });
    let row = fx.store.find_membership(fx.lobby.id, pid(1)).await.unwrap().unwrap();
    assert!(!row.finished);
}

// =========================================================================
// Connections
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_dropped_recipient_announced_once() {
    let fx = fixture(LobbyMode::Race, 1).await;
    let (mut a, b) = seat_both(&fx.handle).await;
    let (b_player, b_conn) = (b.player, b.conn);
    drop(b);

    a.send(&fx.handle, ClientMessage::Rematch { join_code: "NEXT22".into() }).await;
    fx.handle.disconnect(b_player, b_conn).await;
    fx.handle.snapshot().await.unwrap();

    assert_eq!(
        a.next().await,
        ServerMessage::Rematch { join_code: "NEXT22".into(), user_id: pid(1) }
    );
    assert_eq!(a.next().await, ServerMessage::PlayerLeft { user_id: pid(2) });
    assert!(a.rx.try_recv().is_err());
    assert_eq!(fx.handle.snapshot().await.unwrap().connections, 1);
}

#[tokio::test(start_paused = true)]
async fn test_newer_connection_replaces_older() {
    let fx = fixture(LobbyMode::Race, 1).await;
    let (mut a, _b) = seat_both(&fx.handle).await;
    let mut a2 = connect(&fx.handle, 1, "ada", 10).await;

    assert_eq!((&mut a.detached).await, Ok(()));
    // The stale connection's close must not announce a departure.
    fx.handle.disconnect(pid(1), a.conn).await;
    a2.next_matching(|m| matches!(m, ServerMessage::PlayerJoined { .. })).await;
    fx.handle.snapshot().await.unwrap();
    assert!(a2.rx.try_recv().is_err());
    assert_eq!(fx.handle.snapshot().await.unwrap().connections, 2);
}

#[tokio::test(start_paused = true)]
async fn test_leave_removes_membership_and_announces() {
    let fx = fixture(LobbyMode::Race, 1).await;
    let (mut a, _b) = seat_both(&fx.handle).await;

    fx.directory.leave(fx.lobby.id, pid(2)).await.unwrap();

    assert_eq!(a.next().await, ServerMessage::PlayerLeft { user_id: pid(2) });
    assert!(fx.store.find_membership(fx.lobby.id, pid(2)).await.unwrap().is_none());
    let again = fx.directory.leave(fx.lobby.id, pid(2)).await;
    assert!(again.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_game_abandoned_when_everyone_disconnects() {
    let fx = fixture(LobbyMode::Race, 1).await;
    let (mut a, b) = seat_both(&fx.handle).await;
    ready_both(&fx.handle, &a, &b).await;
    a.next_matching(|m| matches!(m, ServerMessage::Countdown { .. })).await;

    fx.handle.disconnect(a.player, a.conn).await;
    fx.handle.disconnect(b.player, b.conn).await;
    assert_eq!(status(&fx).await, LobbyStatus::Countdown);

    let grace = EngineConfig::default().abandoned_game_grace;
    tokio::time::sleep(grace + Duration::from_secs(1)).await;

    assert_eq!(status(&fx).await, LobbyStatus::Finished);
    assert_eq!(fx.handle.snapshot().await.unwrap().round, None);
}

// =========================================================================
// Quiz
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_quiz_two_rounds_win_then_all_locked_out() {
    let fx = fixture(LobbyMode::Quiz, 2).await;
    let (mut a, mut b) = seat_both(&fx.handle).await;
    ready_both(&fx.handle, &a, &b).await;

    let question = a.next_matching(is_question).await;
    let ServerMessage::Question { round, total_rounds, options, .. } = &question else {
        unreachable!()
    };
    assert_eq!((*round, *total_rounds), (1, 2));
    assert_eq!(options.len(), 4);
    b.next_matching(is_question).await;
    assert_eq!(status(&fx).await, LobbyStatus::Racing);

    let answer = correct_option(&question);
    a.send(&fx.handle, ClientMessage::Answer { reference: answer.clone() }).await;
    let ServerMessage::RoundResult { round, correct_ref, winner_id, scores } = a.next().await else {
        panic!("expected round_result");
    };
    assert_eq!((round, winner_id), (1, Some(pid(1))));
    assert_eq!(correct_ref, answer);
    let tallies: Vec<_> = scores.iter().map(|s| (s.user_id, s.score)).collect();
    assert_eq!(tallies, vec![(pid(1), 1), (pid(2), 0)]);

    let question = a.next().await;
    let ServerMessage::Question { round, .. } = &question else {
        panic!("expected question, got {question:?}");
    };
    assert_eq!(*round, 2);

    let wrong = wrong_option(&question);
    a.send(&fx.handle, ClientMessage::Answer { reference: wrong.clone() }).await;
    b.send(&fx.handle, ClientMessage::Answer { reference: wrong }).await;
    assert_eq!(a.next().await, ServerMessage::PlayerLockedOut { user_id: pid(1) });
    assert_eq!(a.next().await, ServerMessage::PlayerLockedOut { user_id: pid(2) });
    let ServerMessage::RoundResult { round, winner_id, scores, .. } = a.next().await else {
        panic!("expected round_result");
    };
    assert_eq!((round, winner_id), (2, None));
    let tallies: Vec<_> = scores.iter().map(|s| (s.user_id, s.score)).collect();
    assert_eq!(tallies, vec![(pid(1), 1), (pid(2), 0)]);

    let ServerMessage::QuizEnd { results } = a.next().await else {
        panic!("expected quiz_end");
    };
    let standings: Vec<_> = results.iter().map(|r| (r.user_id, r.score, r.rank)).collect();
    assert_eq!(standings, vec![(pid(1), 1, 1), (pid(2), 0, 2)]);
    assert_eq!(status(&fx).await, LobbyStatus::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_quiz_locked_out_player_cannot_win_round() {
    let fx = fixture(LobbyMode::Quiz, 2).await;
    let (mut a, b) = seat_both(&fx.handle).await;
    ready_both(&fx.handle, &a, &b).await;

    let question = a.next_matching(is_question).await;
    a.send(&fx.handle, ClientMessage::Answer { reference: wrong_option(&question) }).await;
    a.send(&fx.handle, ClientMessage::Answer { reference: correct_option(&question) }).await;
    b.send(&fx.handle, ClientMessage::Answer { reference: correct_option(&question) }).await;

    assert_eq!(a.next().await, ServerMessage::PlayerLockedOut { user_id: pid(1) });
    let ServerMessage::RoundResult { winner_id, .. } = a.next().await else {
        panic!("expected round_result");
    };
    assert_eq!(winner_id, Some(pid(2)));

    // The lock-out does not carry into the next round.
    let question = a.next_matching(is_question).await;
    a.send(&fx.handle, ClientMessage::Answer { reference: correct_option(&question) }).await;
    let ServerMessage::RoundResult { round, winner_id, .. } = a.next().await else {
        panic!("expected round_result");
    };
    assert_eq!((round, winner_id), (2, Some(pid(1))));

    // One win each: the earlier joiner ranks first.
    let ServerMessage::QuizEnd { results } = a.next().await else {
        panic!("expected quiz_end");
    };
    assert_eq!(results[0].user_id, pid(1));
    assert_eq!(results[0].rank, 1);
}

#[tokio::test(start_paused = true)]
async fn test_quiz_disconnect_resolves_when_rest_locked_out() {
    let fx = fixture(LobbyMode::Quiz, 1).await;
    let (mut a, b) = seat_both(&fx.handle).await;
    ready_both(&fx.handle, &a, &b).await;

    let question = a.next_matching(is_question).await;
    a.send(&fx.handle, ClientMessage::Answer { reference: wrong_option(&question) }).await;
    assert_eq!(a.next().await, ServerMessage::PlayerLockedOut { user_id: pid(1) });

    fx.handle.disconnect(b.player, b.conn).await;
    assert_eq!(a.next().await, ServerMessage::PlayerLeft { user_id: pid(2) });
    let ServerMessage::RoundResult { winner_id, .. } = a.next().await else {
        panic!("expected round_result");
    };
    assert_eq!(winner_id, None);
}
