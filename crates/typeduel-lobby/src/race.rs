//! Multi-round race bookkeeping.

use std::cmp::Ordering;
use std::collections::HashMap;

use typeduel_protocol::{CumulativeStanding, PlayerId, RaceResult};

use crate::store::MembershipRecord;

/// A membership row paired with the player's display name.
pub type Seat = (MembershipRecord, String);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Totals {
    rounds_finished: u32,
    total_time: f64,
    total_wpm: u64,
}

impl Totals {
    fn average_wpm(&self) -> u32 {
        if self.rounds_finished == 0 {
            return 0;
        }
        (self.total_wpm as f64 / f64::from(self.rounds_finished)).round() as u32
    }
}

/// Per-lobby accumulator across the rounds of one race game.
///
/// Lives in the lobby actor from the first countdown until the final
/// results are sent.
#[derive(Debug, Clone)]
pub struct RaceRounds {
    round: u32,
    total_rounds: u32,
    totals: HashMap<PlayerId, Totals>,
}

impl RaceRounds {
    /// Starts at round 1. `total_rounds` is at least 1.
    pub fn new(total_rounds: u32) -> Self {
        Self {
            round: 1,
            total_rounds: total_rounds.max(1),
            totals: HashMap::new(),
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    pub fn is_last_round(&self) -> bool {
        self.round >= self.total_rounds
    }

    /// Moves to the next round. Never passes `total_rounds`.
    pub fn advance(&mut self) -> u32 {
        if self.round < self.total_rounds {
            self.round += 1;
        }
        self.round
    }

    /// Adds the finished rows of a completed round to the totals.
    pub fn fold(&mut self, members: &[MembershipRecord]) {
        for m in members.iter().filter(|m| m.finished) {
            let totals = self.totals.entry(m.player_id).or_default();
            totals.rounds_finished += 1;
            totals.total_time += m.finish_time.unwrap_or(0.0);
            totals.total_wpm += u64::from(m.wpm.unwrap_or(0));
        }
    }

    /// Running standings for `seats`, best first.
    ///
    /// Ordered by average wpm (higher first), then total time (lower
    /// first), then by position in `seats`, which is join order.
    pub fn standings(&self, seats: &[Seat]) -> Vec<CumulativeStanding> {
        let mut rows: Vec<(Totals, &Seat)> = seats
            .iter()
            .map(|seat| {
                let totals = self.totals.get(&seat.0.player_id).copied().unwrap_or_default();
                (totals, seat)
            })
            .collect();

        rows.sort_by(|(a, _), (b, _)| {
            b.average_wpm()
                .cmp(&a.average_wpm())
                .then_with(|| b.rounds_finished.cmp(&a.rounds_finished))
                .then_with(|| a.total_time.partial_cmp(&b.total_time).unwrap_or(Ordering::Equal))
        });

        rows.into_iter()
            .enumerate()
            .map(|(i, (totals, (membership, username)))| CumulativeStanding {
                user_id: membership.player_id,
                username: username.clone(),
                rank: i as u32 + 1,
                rounds_finished: totals.rounds_finished,
                total_time: totals.total_time,
                average_wpm: totals.average_wpm(),
            })
            .collect()
    }
}

/// Results of the round just played, ordered by place. Players who did
/// not finish come last, in join order.
pub fn round_results(seats: &[Seat]) -> Vec<RaceResult> {
    let mut results: Vec<RaceResult> = seats
        .iter()
        .map(|(m, username)| RaceResult {
            user_id: m.player_id,
            username: username.clone(),
            place: m.place,
            time: m.finish_time,
            wpm: m.wpm,
        })
        .collect();
    results.sort_by_key(|r| r.place.unwrap_or(u32::MAX));
    results
}
