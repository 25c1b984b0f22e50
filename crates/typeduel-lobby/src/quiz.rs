//! Quiz rounds: "which reference is this verse from?".

use std::collections::{HashMap, HashSet};

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use typeduel_protocol::{PlayerId, QuizScore, QuizStanding};

use crate::race::Seat;

/// Number of wrong options offered next to the right one.
pub const DISTRACTORS: usize = 3;

/// The open question of the current round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub correct_ref: String,
    pub verse_text: String,
    pub options: Vec<String>,
}

/// What an `answer` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// First correct answer; the question is now closed.
    Correct,
    /// Wrong answer; the player is locked out for the round.
    LockedOut,
    /// No open question, or the player was already locked out.
    Ignored,
}

/// Picks the correct reference and the shuffled options for a question.
///
/// Distractors are drawn without replacement from the rest of the pool,
/// so a pool smaller than four yields fewer options. Returns `None` for
/// an empty pool.
pub fn draw_options<R: Rng + ?Sized>(pool: &[String], rng: &mut R) -> Option<(String, Vec<String>)> {
    let correct = pool.choose(rng)?.clone();
    let rest: Vec<&String> = pool.iter().filter(|r| **r != correct).collect();

    let mut options: Vec<String> = rest
        .choose_multiple(rng, DISTRACTORS)
        .map(|r| (*r).clone())
        .collect();
    options.push(correct.clone());
    options.shuffle(rng);
    Some((correct, options))
}

/// Per-lobby quiz state, alive from the first countdown to `quiz_end`.
#[derive(Debug, Clone)]
pub struct QuizState {
    round: u32,
    total_rounds: u32,
    tally: HashMap<PlayerId, u32>,
    locked_out: HashSet<PlayerId>,
    current: Option<Question>,
}

impl QuizState {
    pub fn new(total_rounds: u32) -> Self {
        Self {
            round: 0,
            total_rounds: total_rounds.max(1),
            tally: HashMap::new(),
            locked_out: HashSet::new(),
            current: None,
        }
    }

    /// The current round, 0 before the first question.
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    pub fn is_last_round(&self) -> bool {
        self.round >= self.total_rounds
    }

    pub fn current(&self) -> Option<&Question> {
        self.current.as_ref()
    }

    pub fn score(&self, player: PlayerId) -> u32 {
        self.tally.get(&player).copied().unwrap_or(0)
    }

    pub fn is_locked_out(&self, player: PlayerId) -> bool {
        self.locked_out.contains(&player)
    }

    /// Opens the next round with `question`. Returns the new round number.
    pub fn open(&mut self, question: Question) -> u32 {
        if self.round < self.total_rounds {
            self.round += 1;
        }
        self.locked_out.clear();
        self.current = Some(question);
        self.round
    }

    /// Applies one answer.
    pub fn answer(&mut self, player: PlayerId, reference: &str) -> AnswerOutcome {
        let Some(question) = &self.current else {
            return AnswerOutcome::Ignored;
        };
        if self.locked_out.contains(&player) {
            return AnswerOutcome::Ignored;
        }
        if question.correct_ref.eq_ignore_ascii_case(reference.trim()) {
            *self.tally.entry(player).or_default() += 1;
            AnswerOutcome::Correct
        } else {
            self.locked_out.insert(player);
            AnswerOutcome::LockedOut
        }
    }

    /// Whether every player in `connected` is locked out. An empty set
    /// never counts as all locked out.
    pub fn all_locked_out(&self, connected: impl IntoIterator<Item = PlayerId>) -> bool {
        let mut any = false;
        for player in connected {
            if !self.locked_out.contains(&player) {
                return false;
            }
            any = true;
        }
        any
    }

    /// Closes the current question and clears the lock-outs.
    pub fn close(&mut self) -> Option<Question> {
        self.locked_out.clear();
        self.current.take()
    }

    /// Tallies in join order.
    pub fn scores(&self, seats: &[Seat]) -> Vec<QuizScore> {
        seats
            .iter()
            .map(|(m, username)| QuizScore {
                user_id: m.player_id,
                username: username.clone(),
                score: self.score(m.player_id),
            })
            .collect()
    }

    /// Final standings: highest tally first, ties to the earlier joiner.
    pub fn standings(&self, seats: &[Seat]) -> Vec<QuizStanding> {
        let mut scores = self.scores(seats);
        scores.sort_by(|a, b| b.score.cmp(&a.score));
        scores
            .into_iter()
            .enumerate()
            .map(|(i, s)| QuizStanding {
                user_id: s.user_id,
                username: s.username,
                score: s.score,
                rank: i as u32 + 1,
            })
            .collect()
    }
}
