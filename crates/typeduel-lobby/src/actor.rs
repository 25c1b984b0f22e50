//! Lobby actor: an isolated Tokio task that owns one lobby's live game.
//!
//! Each lobby runs in its own task and talks to the outside world through
//! a bounded mpsc channel. Every mutation of the lobby (connections, ready
//! flags, race results, quiz answers) is serialized through that channel,
//! so the actor is the lobby's single writer. Delayed work (countdown
//! steps, pauses between rounds) is driven by a [`Pacer`] polled in the
//! same `select!` as the command channel.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};
use typeduel_pacer::Pacer;
use typeduel_protocol::{ClientMessage, LobbyId, PlayerId, ServerMessage};
use typeduel_transport::ConnectionId;

use crate::config::{EngineConfig, LobbyMode, LobbyStatus};
use crate::error::LobbyError;
use crate::passage::SharedPassageSource;
use crate::quiz::{AnswerOutcome, Question, QuizState, draw_options};
use crate::race::{RaceRounds, Seat, round_results};
use crate::registry::{Outbound, Registry};
use crate::rounds::{fetch_or_placeholder, prepare_race_round};
use crate::store::{LobbyRecord, LobbyStore, SharedStore};

/// Commands sent to a lobby actor through its channel.
///
/// The `oneshot::Sender` in some variants is the reply channel: the
/// caller sends the command and waits for the answer on it.
pub(crate) enum LobbyCommand {
    /// Register a connection for an admitted player.
    Connect {
        player: PlayerId,
        username: String,
        conn: ConnectionId,
        outbound: Outbound,
        detached: oneshot::Sender<()>,
        reply: oneshot::Sender<Result<(), LobbyError>>,
    },

    /// A connection closed.
    Disconnect { player: PlayerId, conn: ConnectionId },

    /// A decoded message from a player's connection.
    Inbound {
        player: PlayerId,
        conn: ConnectionId,
        msg: ClientMessage,
    },

    /// The player gives up their seat.
    Leave {
        player: PlayerId,
        reply: oneshot::Sender<Result<(), LobbyError>>,
    },

    Snapshot { reply: oneshot::Sender<LobbySnapshot> },

    Shutdown,
}

/// A view of the actor's live state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbySnapshot {
    pub lobby_id: LobbyId,
    /// Live connections.
    pub connections: usize,
    /// Current round of the game in progress, if any.
    pub round: Option<u32>,
    /// Whether a countdown step or pause is pending.
    pub pacing: bool,
}

/// Handle to a running lobby actor.
///
/// Cheap to clone: it wraps the actor's `mpsc::Sender`.
#[derive(Clone)]
pub struct LobbyHandle {
    lobby_id: LobbyId,
    sender: mpsc::Sender<LobbyCommand>,
}

impl LobbyHandle {
    pub fn lobby_id(&self) -> LobbyId {
        self.lobby_id
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Registers a connection. `detached` fires if a newer connection for
    /// the same player replaces this one.
    pub async fn connect(
        &self,
        player: PlayerId,
        username: impl Into<String>,
        conn: ConnectionId,
        outbound: Outbound,
        detached: oneshot::Sender<()>,
    ) -> Result<(), LobbyError> {
        let (reply, rx) = oneshot::channel();
        self.send(LobbyCommand::Connect {
            player,
            username: username.into(),
            conn,
            outbound,
            detached,
            reply,
        })
        .await?;
        rx.await.map_err(|_| LobbyError::Unavailable(self.lobby_id))?
    }

    /// Reports a closed connection. Stale connections are ignored.
    pub async fn disconnect(&self, player: PlayerId, conn: ConnectionId) {
        let _ = self.send(LobbyCommand::Disconnect { player, conn }).await;
    }

    /// Delivers a player message (fire-and-forget).
    pub async fn send_message(
        &self,
        player: PlayerId,
        conn: ConnectionId,
        msg: ClientMessage,
    ) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Inbound { player, conn, msg }).await
    }

    /// Deletes the player's membership and announces their departure.
    pub async fn leave(&self, player: PlayerId) -> Result<(), LobbyError> {
        let (reply, rx) = oneshot::channel();
        self.send(LobbyCommand::Leave { player, reply }).await?;
        rx.await.map_err(|_| LobbyError::Unavailable(self.lobby_id))?
    }

    pub async fn snapshot(&self) -> Result<LobbySnapshot, LobbyError> {
        let (reply, rx) = oneshot::channel();
        self.send(LobbyCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| LobbyError::Unavailable(self.lobby_id))
    }

    /// Stops the actor. Every connection it holds is detached.
    pub async fn shutdown(&self) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Shutdown).await
    }

    async fn send(&self, cmd: LobbyCommand) -> Result<(), LobbyError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))
    }
}

/// Delayed steps of a lobby's game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cue {
    /// Announce `n` seconds left.
    Countdown(u32),
    /// Start the round.
    Launch,
    /// Leave the quiz result pause.
    NextQuestion,
}

/// The game in progress, if any.
#[derive(Debug)]
enum Game {
    Idle,
    Race(RaceRounds),
    Quiz(QuizState),
}

impl Game {
    fn round(&self) -> Option<u32> {
        match self {
            Self::Idle => None,
            Self::Race(rounds) => Some(rounds.round()),
            Self::Quiz(quiz) => Some(quiz.round()),
        }
    }
}

enum Wake {
    Command(Option<LobbyCommand>),
    Cue(Cue),
    Abandoned,
}

/// The internal actor state. Runs inside a Tokio task.
struct LobbyActor {
    lobby_id: LobbyId,
    store: SharedStore,
    passages: SharedPassageSource,
    config: Arc<EngineConfig>,
    registry: Registry,
    game: Game,
    /// A race round is being typed: between `race_start` and its results.
    round_live: bool,
    pacer: Pacer<Cue>,
    /// When an in-progress game with nobody connected gets abandoned.
    abandon_at: Option<Instant>,
    receiver: mpsc::Receiver<LobbyCommand>,
}

impl LobbyActor {
    /// Runs the actor loop until shutdown or until every handle is gone.
    async fn run(mut self) {
        info!(lobby_id = %self.lobby_id, "lobby actor started");

        loop {
            let abandon_at = self.abandon_at;
            let wake = tokio::select! {
                cmd = self.receiver.recv() => Wake::Command(cmd),
                cue = self.pacer.wait() => Wake::Cue(cue),
                () = until(abandon_at) => Wake::Abandoned,
            };

            match wake {
                Wake::Command(None) => break,
                Wake::Command(Some(cmd)) => {
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }
                Wake::Cue(cue) => {
                    if let Err(e) = self.on_cue(cue).await {
                        warn!(lobby_id = %self.lobby_id, ?cue, error = %e, "cue failed");
                    }
                }
                Wake::Abandoned => {
                    if let Err(e) = self.on_abandoned().await {
                        warn!(lobby_id = %self.lobby_id, error = %e, "abandon failed");
                    }
                }
            }

            self.refresh_abandon_deadline();
        }

        info!(lobby_id = %self.lobby_id, "lobby actor stopped");
    }

    /// Returns `false` when the actor should stop.
    async fn handle_command(&mut self, cmd: LobbyCommand) -> bool {
        match cmd {
            LobbyCommand::Connect {
                player,
                username,
                conn,
                outbound,
                detached,
                reply,
            } => {
                self.on_connect(player, username, conn, outbound, detached);
                let _ = reply.send(Ok(()));
            }
            LobbyCommand::Disconnect { player, conn } => {
                if let Err(e) = self.on_disconnect(player, conn).await {
                    warn!(lobby_id = %self.lobby_id, %player, error = %e, "disconnect handling failed");
                }
            }
            LobbyCommand::Inbound { player, conn, msg } => {
                if self.registry.current_conn(player) != Some(conn) {
                    debug!(lobby_id = %self.lobby_id, %player, %conn, "message from stale connection ignored");
                    return true;
                }
                let kind = msg.kind();
                if let Err(e) = self.on_message(player, msg).await {
                    warn!(lobby_id = %self.lobby_id, %player, kind, error = %e, "message handling failed");
                    self.send_to(player, ServerMessage::error(e.to_string()));
                }
            }
            LobbyCommand::Leave { player, reply } => {
                let result = self.on_leave(player).await;
                let _ = reply.send(result);
            }
            LobbyCommand::Snapshot { reply } => {
                let _ = reply.send(LobbySnapshot {
                    lobby_id: self.lobby_id,
                    connections: self.registry.len(),
                    round: self.game.round(),
                    pacing: !self.pacer.is_idle(),
                });
            }
            LobbyCommand::Shutdown => {
                info!(lobby_id = %self.lobby_id, "lobby shutting down");
                return false;
            }
        }
        true
    }

    // -- connections ------------------------------------------------------

    fn on_connect(
        &mut self,
        player: PlayerId,
        username: String,
        conn: ConnectionId,
        outbound: Outbound,
        detached: oneshot::Sender<()>,
    ) {
        let replaced = self
            .registry
            .register(player, username.clone(), conn, outbound, detached);
        info!(
            lobby_id = %self.lobby_id,
            %player,
            %conn,
            replaced,
            connections = self.registry.len(),
            "player connected"
        );
        self.broadcast(ServerMessage::PlayerJoined {
            user_id: player,
            username,
        });
    }

    async fn on_disconnect(&mut self, player: PlayerId, conn: ConnectionId) -> Result<(), LobbyError> {
        if !self.registry.deregister(player, conn) {
            debug!(lobby_id = %self.lobby_id, %player, %conn, "stale disconnect ignored");
            return Ok(());
        }
        self.announce_departures(vec![player]);
        self.resolve_if_all_locked_out().await
    }

    async fn on_leave(&mut self, player: PlayerId) -> Result<(), LobbyError> {
        let had_seat = self.store.delete_membership(self.lobby_id, player).await?;
        let was_connected = self.registry.remove(player);
        if !had_seat && !was_connected {
            return Err(LobbyError::NotMember(player, self.lobby_id));
        }
        info!(lobby_id = %self.lobby_id, %player, "player left lobby");
        self.announce_departures(vec![player]);

        let lobby = self.load_lobby().await?;
        match lobby.status {
            LobbyStatus::Waiting => self.start_if_all_ready(lobby).await,
            LobbyStatus::Racing if self.round_live => self.complete_round_if_done().await,
            LobbyStatus::Racing => self.resolve_if_all_locked_out().await,
            _ => Ok(()),
        }
    }

    /// Queues `msg` for everyone and announces anyone dropped on the way.
    fn broadcast(&mut self, msg: ServerMessage) {
        let dropped = self.registry.broadcast(&msg);
        self.announce_departures(dropped);
    }

    /// Queues `msg` for one connected player, announcing them if dropped.
    fn send_to(&mut self, player: PlayerId, msg: ServerMessage) {
        if self.registry.contains(player) && !self.registry.send_to(player, msg) {
            self.announce_departures(vec![player]);
        }
    }

    /// Broadcasts one `player_left` per departed player, including those
    /// dropped while announcing.
    fn announce_departures(&mut self, mut pending: Vec<PlayerId>) {
        while let Some(player) = pending.pop() {
            debug!(lobby_id = %self.lobby_id, %player, "announcing departure");
            let dropped = self
                .registry
                .broadcast(&ServerMessage::PlayerLeft { user_id: player });
            pending.extend(dropped);
        }
    }

    // -- inbound messages -------------------------------------------------

    async fn on_message(&mut self, player: PlayerId, msg: ClientMessage) -> Result<(), LobbyError> {
        debug!(lobby_id = %self.lobby_id, %player, kind = msg.kind(), "inbound");
        match msg {
            ClientMessage::Ready { ready } => self.on_ready(player, ready).await,
            ClientMessage::Progress { chars, wpm } => self.on_progress(player, chars, wpm).await,
            ClientMessage::Finished { time, wpm, accuracy } => {
                self.on_finished(player, time, wpm, accuracy).await
            }
            ClientMessage::Answer { reference } => self.on_answer(player, &reference).await,
            ClientMessage::Rematch { join_code } => {
                self.broadcast(ServerMessage::Rematch {
                    join_code,
                    user_id: player,
                });
                Ok(())
            }
            // Liveness is tracked by the connection handler.
            ClientMessage::Pong => Ok(()),
        }
    }

    async fn on_ready(&mut self, player: PlayerId, ready: Option<bool>) -> Result<(), LobbyError> {
        let lobby = self.load_lobby().await?;
        if lobby.status != LobbyStatus::Waiting {
            debug!(lobby_id = %self.lobby_id, %player, status = %lobby.status, "ready ignored");
            return Ok(());
        }
        let mut membership = self
            .store
            .find_membership(self.lobby_id, player)
            .await?
            .ok_or(LobbyError::NotMember(player, self.lobby_id))?;
        membership.ready = ready.unwrap_or(!membership.ready);
        let flag = membership.ready;
        self.store.save_membership(membership).await?;

        self.broadcast(ServerMessage::PlayerReady {
            user_id: player,
            ready: flag,
        });
        self.start_if_all_ready(lobby).await
    }

    async fn on_progress(&mut self, player: PlayerId, chars: u32, wpm: u32) -> Result<(), LobbyError> {
        if !self.round_live {
            return Ok(());
        }
        if self.registry.scratch(player).is_some_and(|s| s.finished) {
            debug!(lobby_id = %self.lobby_id, %player, "progress after finish ignored");
            return Ok(());
        }
        let scratch = self.registry.scratch_mut(player);
        scratch.progress = chars;
        scratch.wpm = wpm;

        if let Some(mut membership) = self.store.find_membership(self.lobby_id, player).await? {
            membership.progress = chars;
            self.store.save_membership(membership).await?;
        }
        self.broadcast(ServerMessage::Progress {
            user_id: player,
            chars,
            wpm,
        });
        Ok(())
    }

    async fn on_finished(
        &mut self,
        player: PlayerId,
        time: f64,
        wpm: u32,
        accuracy: f64,
    ) -> Result<(), LobbyError> {
        if !self.round_live {
            return Ok(());
        }
        let mut membership = self
            .store
            .find_membership(self.lobby_id, player)
            .await?
            .ok_or(LobbyError::NotMember(player, self.lobby_id))?;
        if membership.finished {
            debug!(lobby_id = %self.lobby_id, %player, "duplicate finish ignored");
            return Ok(());
        }

        let place = self.store.count_finished(self.lobby_id).await? as u32 + 1;
        membership.finished = true;
        membership.finish_time = Some(time);
        membership.wpm = Some(wpm);
        membership.place = Some(place);
        self.store.save_membership(membership).await?;

        let scratch = self.registry.scratch_mut(player);
        scratch.finished = true;
        scratch.finish_time = Some(time);
        scratch.wpm = wpm;

        if let Err(e) = self.store.record_race_result(player, wpm, place == 1).await {
            warn!(lobby_id = %self.lobby_id, %player, error = %e, "could not record race stats");
        }
        info!(lobby_id = %self.lobby_id, %player, place, wpm, "player finished");

        self.broadcast(ServerMessage::PlayerFinished {
            user_id: player,
            place,
            time,
            wpm,
            accuracy,
        });
        self.complete_round_if_done().await
    }

    async fn on_answer(&mut self, player: PlayerId, reference: &str) -> Result<(), LobbyError> {
        let Game::Quiz(quiz) = &mut self.game else {
            return Ok(());
        };
        match quiz.answer(player, reference) {
            AnswerOutcome::Correct => {
                info!(lobby_id = %self.lobby_id, %player, round = quiz.round(), "question won");
                self.resolve_question(Some(player)).await
            }
            AnswerOutcome::LockedOut => {
                self.broadcast(ServerMessage::PlayerLockedOut { user_id: player });
                self.resolve_if_all_locked_out().await
            }
            AnswerOutcome::Ignored => {
                debug!(lobby_id = %self.lobby_id, %player, "answer ignored");
                Ok(())
            }
        }
    }

    // -- game flow --------------------------------------------------------

    async fn start_if_all_ready(&mut self, mut lobby: LobbyRecord) -> Result<(), LobbyError> {
        let members = self.store.members(self.lobby_id).await?;
        if members.len() < 2 || !members.iter().all(|m| m.ready) {
            return Ok(());
        }
        if !lobby.status.can_advance_to(LobbyStatus::Countdown) {
            return Ok(());
        }

        lobby.status = LobbyStatus::Countdown;
        self.store.update_lobby(lobby.clone()).await?;
        self.game = match lobby.mode {
            LobbyMode::Race => Game::Race(RaceRounds::new(lobby.total_rounds)),
            LobbyMode::Quiz => Game::Quiz(QuizState::new(lobby.total_rounds)),
        };
        info!(
            lobby_id = %self.lobby_id,
            mode = %lobby.mode,
            players = members.len(),
            total_rounds = lobby.total_rounds,
            "all ready; starting countdown"
        );
        self.on_cue(Cue::Countdown(self.config.countdown_from)).await
    }

    async fn on_cue(&mut self, cue: Cue) -> Result<(), LobbyError> {
        match cue {
            Cue::Countdown(seconds) => {
                self.broadcast(ServerMessage::Countdown { seconds });
                let next = if seconds > 1 {
                    Cue::Countdown(seconds - 1)
                } else {
                    Cue::Launch
                };
                self.pacer.schedule(self.config.countdown_step, next);
                Ok(())
            }
            Cue::Launch => self.launch_round().await,
            Cue::NextQuestion => {
                let finished = match &self.game {
                    Game::Quiz(quiz) => quiz.is_last_round(),
                    _ => return Ok(()),
                };
                if finished {
                    self.end_quiz().await
                } else {
                    self.ask_question().await
                }
            }
        }
    }

    async fn launch_round(&mut self) -> Result<(), LobbyError> {
        let mut lobby = self.load_lobby().await?;
        let first = lobby.status == LobbyStatus::Countdown;
        if !lobby.status.can_advance_to(LobbyStatus::Racing) {
            return Ok(());
        }

        match &self.game {
            Game::Race(rounds) => {
                let (round, total_rounds) = (rounds.round(), rounds.total_rounds());
                if first {
                    prepare_race_round(&*self.store, &*self.passages, &self.config, &mut lobby, true)
                        .await?;
                    lobby.started_at = Some(SystemTime::now());
                }
                lobby.status = LobbyStatus::Racing;
                self.store.update_lobby(lobby.clone()).await?;

                self.registry.reset_scratch();
                self.round_live = true;
                info!(lobby_id = %self.lobby_id, round, total_rounds, "race round started");
                self.broadcast(ServerMessage::RaceStart {
                    verse_text: lobby.passage_text.unwrap_or_default(),
                    reference: lobby.passage_ref.unwrap_or_default(),
                    start_time: unix_millis(SystemTime::now()),
                    round,
                    total_rounds,
                });
                Ok(())
            }
            Game::Quiz(_) => {
                lobby.status = LobbyStatus::Racing;
                lobby.started_at = Some(SystemTime::now());
                self.store.update_lobby(lobby).await?;
                self.ask_question().await
            }
            Game::Idle => Ok(()),
        }
    }

    async fn complete_round_if_done(&mut self) -> Result<(), LobbyError> {
        let members = self.store.members(self.lobby_id).await?;
        if members.is_empty() || !members.iter().all(|m| m.finished) {
            return Ok(());
        }
        self.round_live = false;
        let seats = self.seats().await?;

        let Game::Race(rounds) = &mut self.game else {
            return Ok(());
        };
        rounds.fold(&members);
        let round = rounds.round();
        let total_rounds = rounds.total_rounds();
        let last = rounds.is_last_round();
        let results = round_results(&seats);
        let cumulative = rounds.standings(&seats);
        if !last {
            rounds.advance();
        }

        if last {
            info!(lobby_id = %self.lobby_id, total_rounds, "race finished");
            self.broadcast(ServerMessage::RaceEnd {
                results,
                cumulative,
                total_rounds,
            });
            self.game = Game::Idle;
            return self.finish_lobby().await;
        }

        info!(lobby_id = %self.lobby_id, round, total_rounds, "race round finished");
        self.broadcast(ServerMessage::RoundEnd {
            round,
            total_rounds,
            results,
            cumulative,
        });

        let mut lobby = self.load_lobby().await?;
        prepare_race_round(&*self.store, &*self.passages, &self.config, &mut lobby, false).await?;
        self.registry.reset_scratch();
        self.pacer
            .schedule(self.config.round_pause, Cue::Countdown(self.config.countdown_from));
        Ok(())
    }

    async fn ask_question(&mut self) -> Result<(), LobbyError> {
        let drawn = draw_options(&self.config.reference_pool, &mut rand::rng());
        let Some((correct_ref, options)) = drawn else {
            warn!(lobby_id = %self.lobby_id, "reference pool empty; ending quiz");
            return self.end_quiz().await;
        };
        let passage =
            fetch_or_placeholder(&*self.passages, &correct_ref, self.config.passage_version).await;

        let Game::Quiz(quiz) = &mut self.game else {
            return Ok(());
        };
        let verse_text = passage.text;
        let round = quiz.open(Question {
            correct_ref,
            verse_text: verse_text.clone(),
            options: options.clone(),
        });
        let total_rounds = quiz.total_rounds();
        debug!(lobby_id = %self.lobby_id, round, total_rounds, "question asked");
        self.broadcast(ServerMessage::Question {
            round,
            total_rounds,
            verse_text,
            options,
        });
        Ok(())
    }

    async fn resolve_if_all_locked_out(&mut self) -> Result<(), LobbyError> {
        let Game::Quiz(quiz) = &self.game else {
            return Ok(());
        };
        if quiz.current().is_some() && quiz.all_locked_out(self.registry.players()) {
            debug!(lobby_id = %self.lobby_id, round = quiz.round(), "everyone locked out");
            return self.resolve_question(None).await;
        }
        Ok(())
    }

    async fn resolve_question(&mut self, winner: Option<PlayerId>) -> Result<(), LobbyError> {
        let seats = self.seats().await?;
        let Game::Quiz(quiz) = &mut self.game else {
            return Ok(());
        };
        let Some(question) = quiz.close() else {
            return Ok(());
        };
        let round = quiz.round();
        let scores = quiz.scores(&seats);

        self.broadcast(ServerMessage::RoundResult {
            round,
            correct_ref: question.correct_ref,
            winner_id: winner,
            scores,
        });
        self.pacer.schedule(self.config.result_pause, Cue::NextQuestion);
        Ok(())
    }

    async fn end_quiz(&mut self) -> Result<(), LobbyError> {
        let seats = self.seats().await?;
        let results = match &self.game {
            Game::Quiz(quiz) => quiz.standings(&seats),
            _ => Vec::new(),
        };
        info!(lobby_id = %self.lobby_id, "quiz finished");
        self.broadcast(ServerMessage::QuizEnd { results });
        self.game = Game::Idle;
        self.finish_lobby().await
    }

    async fn finish_lobby(&mut self) -> Result<(), LobbyError> {
        self.round_live = false;
        self.pacer.cancel();
        let mut lobby = self.load_lobby().await?;
        if !lobby.status.can_advance_to(LobbyStatus::Finished) {
            return Ok(());
        }
        lobby.status = LobbyStatus::Finished;
        lobby.finished_at = Some(SystemTime::now());
        self.store.update_lobby(lobby).await?;
        Ok(())
    }

    // -- abandonment ------------------------------------------------------

    fn refresh_abandon_deadline(&mut self) {
        let in_progress = !matches!(self.game, Game::Idle);
        if !in_progress || !self.registry.is_empty() {
            self.abandon_at = None;
        } else if self.abandon_at.is_none() {
            debug!(lobby_id = %self.lobby_id, "nobody connected; abandon timer armed");
            self.abandon_at = Some(Instant::now() + self.config.abandoned_game_grace);
        }
    }

    async fn on_abandoned(&mut self) -> Result<(), LobbyError> {
        self.abandon_at = None;
        info!(lobby_id = %self.lobby_id, "game abandoned");
        self.game = Game::Idle;
        self.finish_lobby().await
    }

    // -- helpers ----------------------------------------------------------

    async fn load_lobby(&self) -> Result<LobbyRecord, LobbyError> {
        self.store
            .find_lobby(self.lobby_id)
            .await?
            .ok_or(LobbyError::NotFound(self.lobby_id))
    }

    /// Memberships in join order, with display names.
    ///
    /// Connected players go by the name they connected with; everyone else
    /// by their stored username.
    async fn seats(&self) -> Result<Vec<Seat>, LobbyError> {
        let members = self.store.members(self.lobby_id).await?;
        let mut seats = Vec::with_capacity(members.len());
        for membership in members {
            let player = membership.player_id;
            let name = match self.registry.username(player) {
                Some(name) => name.to_string(),
                None => self
                    .store
                    .find_player(player)
                    .await?
                    .map(|p| p.username)
                    .unwrap_or_else(|| player.to_string()),
            };
            seats.push((membership, name));
        }
        Ok(seats)
    }
}

/// Sleeps until `deadline`, or forever without one.
async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Spawns a lobby actor and returns its handle.
pub fn spawn_lobby(
    lobby_id: LobbyId,
    store: SharedStore,
    passages: SharedPassageSource,
    config: Arc<EngineConfig>,
) -> LobbyHandle {
    let (sender, receiver) = mpsc::channel(config.command_buffer);
    let actor = LobbyActor {
        lobby_id,
        store,
        passages,
        config,
        registry: Registry::new(),
        game: Game::Idle,
        round_live: false,
        pacer: Pacer::new(),
        abandon_at: None,
        receiver,
    };
    tokio::spawn(actor.run());
    LobbyHandle { lobby_id, sender }
}
