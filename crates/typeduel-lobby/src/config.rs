//! Lobby configuration and the lobby status state machine.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::passage::{BibleVersion, DEFAULT_REFERENCE_POOL};

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Pacing and sizing knobs shared by every lobby actor.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// First number announced by the countdown. Counts down to 1.
    pub countdown_from: u32,

    /// Time between countdown announcements, and between the last one and
    /// the round start.
    pub countdown_step: Duration,

    /// Pause after a race round's results before the next countdown.
    pub round_pause: Duration,

    /// Pause after a quiz round result before the next question.
    pub result_pause: Duration,

    /// Translation requested from the passage source.
    pub passage_version: BibleVersion,

    /// References that race passages and quiz answers are drawn from.
    pub reference_pool: Vec<String>,

    /// How long a game in progress survives with nobody connected before
    /// it is abandoned and marked finished.
    pub abandoned_game_grace: Duration,

    /// Per-connection outbound queue length. A peer that falls this far
    /// behind is dropped.
    pub outbound_buffer: usize,

    /// Lobby actor command channel size.
    pub command_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            countdown_from: 3,
            countdown_step: Duration::from_secs(1),
            round_pause: Duration::from_secs(3),
            result_pause: Duration::from_secs(3),
            passage_version: BibleVersion::Kjv,
            reference_pool: DEFAULT_REFERENCE_POOL
                .iter()
                .map(|r| (*r).to_string())
                .collect(),
            abandoned_game_grace: Duration::from_secs(10 * 60),
            outbound_buffer: 64,
            command_buffer: 64,
        }
    }
}

impl EngineConfig {
    /// Minimum pool size that lets a quiz offer four distinct options.
    pub const MIN_QUIZ_POOL: usize = 4;

    /// Fixes out-of-range values so the config is safe to use.
    ///
    /// - `countdown_from` is at least 1.
    /// - Channel sizes are at least 1.
    /// - Blank and duplicate references are dropped; an empty pool falls
    ///   back to the built-in pool.
    pub fn validated(mut self) -> Self {
        if self.countdown_from == 0 {
            warn!("countdown_from is 0; using 1");
            self.countdown_from = 1;
        }
        self.outbound_buffer = self.outbound_buffer.max(1);
        self.command_buffer = self.command_buffer.max(1);

        let mut seen = HashSet::new();
        self.reference_pool
            .retain(|r| !r.trim().is_empty() && seen.insert(r.clone()));
        if self.reference_pool.is_empty() {
            warn!("reference pool is empty; using the built-in pool");
            self.reference_pool = DEFAULT_REFERENCE_POOL
                .iter()
                .map(|r| (*r).to_string())
                .collect();
        } else if self.reference_pool.len() < Self::MIN_QUIZ_POOL {
            warn!(
                size = self.reference_pool.len(),
                "reference pool too small for four quiz options"
            );
        }
        self
    }
}

// ---------------------------------------------------------------------------
// JanitorConfig
// ---------------------------------------------------------------------------

/// Schedule and threshold for the stale-lobby sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JanitorConfig {
    /// Time between sweeps.
    pub period: Duration,

    /// Minimum lobby age before it can be swept.
    pub stale_after: Duration,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(10 * 60),
            stale_after: Duration::from_secs(2 * 60 * 60),
        }
    }
}

impl JanitorConfig {
    /// Shortest allowed sweep period.
    pub const MIN_PERIOD: Duration = Duration::from_secs(1);

    /// Clamps the period to [`Self::MIN_PERIOD`].
    pub fn validated(mut self) -> Self {
        if self.period < Self::MIN_PERIOD {
            warn!(period_ms = self.period.as_millis() as u64, "janitor period too short; clamping");
            self.period = Self::MIN_PERIOD;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// LobbyMode
// ---------------------------------------------------------------------------

/// Which game a lobby hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LobbyMode {
    Race,
    Quiz,
}

impl fmt::Display for LobbyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Race => write!(f, "race"),
            Self::Quiz => write!(f, "quiz"),
        }
    }
}

// ---------------------------------------------------------------------------
// LobbyStatus
// ---------------------------------------------------------------------------

/// The lifecycle status of a lobby.
///
/// Status only moves forward:
///
/// ```text
/// Waiting → Countdown → Racing → Finished
///                        ↺ (once per extra round)
/// ```
///
/// - **Waiting**: accepting members, players toggle ready.
/// - **Countdown**: everyone is ready, the first countdown is running.
/// - **Racing**: rounds are being played (race passages or quiz
///   questions). Re-entered for every round after the first.
/// - **Finished**: final results were sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LobbyStatus {
    Waiting,
    Countdown,
    Racing,
    Finished,
}

impl LobbyStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Waiting => 0,
            Self::Countdown => 1,
            Self::Racing => 2,
            Self::Finished => 3,
        }
    }

    /// Returns `true` if moving to `target` keeps the status moving
    /// forward. `Racing → Racing` is allowed for subsequent rounds.
    pub fn can_advance_to(self, target: Self) -> bool {
        (self == Self::Racing && target == Self::Racing) || target.rank() > self.rank()
    }

    /// Returns `true` if the janitor may sweep a lobby in this status.
    pub fn is_sweepable(self) -> bool {
        matches!(self, Self::Waiting | Self::Finished)
    }
}

impl fmt::Display for LobbyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Countdown => write!(f, "countdown"),
            Self::Racing => write!(f, "racing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}
