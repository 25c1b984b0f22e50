//! Deadline pacer for lobby actors.
//!
//! A lobby never runs a continuous game loop. It only needs to do
//! something *later*: announce the next countdown second, start the race
//! once the countdown is over, or move to the next quiz question after a
//! result pause. The [`Pacer`] holds at most one such pending cue.
//!
//! # Integration
//!
//! The pacer is designed to sit inside a lobby actor's `tokio::select!`
//! loop next to the command channel:
//!
//! ```ignore
//! loop {
//!     let wake = tokio::select! {
//!         cmd = commands.recv() => Wake::Command(cmd),
//!         cue = pacer.wait() => Wake::Cue(cue),
//!     };
//!     // handle `wake`, possibly calling `pacer.schedule(..)` again
//! }
//! ```
//!
//! When nothing is scheduled, [`Pacer::wait`] pends forever, so the
//! `select!` simply keeps serving commands. [`Pacer::wait`] is cancel
//! safe: dropping it before the deadline leaves the cue in place.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// How late a cue may fire before it is reported as an overrun.
const OVERRUN_WARN: Duration = Duration::from_millis(250);

/// Single-slot scheduler for delayed actor cues.
///
/// Scheduling a new cue replaces any pending one: a lobby is only ever
/// waiting for one thing at a time.
#[derive(Debug)]
pub struct Pacer<C> {
    next: Option<(Instant, C)>,
    fired: u64,
}

impl<C> Default for Pacer<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Pacer<C> {
    /// Creates an idle pacer.
    pub fn new() -> Self {
        Self {
            next: None,
            fired: 0,
        }
    }

    /// Schedules `cue` to fire after `delay`, replacing any pending cue.
    pub fn schedule(&mut self, delay: Duration, cue: C) {
        if self.next.is_some() {
            debug!("replacing pending cue");
        }
        self.next = Some((Instant::now() + delay, cue));
    }

    /// Drops the pending cue, if any. Returns it.
    pub fn cancel(&mut self) -> Option<C> {
        self.next.take().map(|(_, cue)| cue)
    }

    /// Whether no cue is pending.
    pub fn is_idle(&self) -> bool {
        self.next.is_none()
    }

    /// The pending cue, if any.
    pub fn pending(&self) -> Option<&C> {
        self.next.as_ref().map(|(_, cue)| cue)
    }

    /// Time left until the pending cue fires.
    pub fn remaining(&self) -> Option<Duration> {
        self.next
            .as_ref()
            .map(|(at, _)| at.saturating_duration_since(Instant::now()))
    }

    /// Number of cues fired so far.
    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// Waits for the pending cue and returns it.
    ///
    /// Pends forever while idle. `tokio::select!` will still process
    /// other branches.
    pub async fn wait(&mut self) -> C {
        loop {
            let Some(deadline) = self.next.as_ref().map(|(at, _)| *at) else {
                std::future::pending::<()>().await;
                continue;
            };

            time::sleep_until(deadline).await;

            if let Some((at, cue)) = self.next.take() {
                let late_by = Instant::now().saturating_duration_since(at);
                if late_by > OVERRUN_WARN {
                    warn!(
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "cue fired late"
                    );
                }
                self.fired += 1;
                trace!(fired = self.fired, "cue fired");
                return cue;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pacer_is_idle() {
        let pacer: Pacer<u8> = Pacer::new();
        assert!(pacer.is_idle());
        assert_eq!(pacer.pending(), None);
        assert_eq!(pacer.remaining(), None);
        assert_eq!(pacer.fired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_replaces_pending_cue() {
        let mut pacer = Pacer::new();
        pacer.schedule(Duration::from_secs(5), "first");
        pacer.schedule(Duration::from_secs(1), "second");
        assert_eq!(pacer.pending(), Some(&"second"));
        assert_eq!(pacer.remaining(), Some(Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_returns_cue_and_goes_idle() {
        let mut pacer = Pacer::new();
        pacer.schedule(Duration::from_secs(1), 7u32);
        assert_eq!(pacer.cancel(), Some(7));
        assert!(pacer.is_idle());
        assert_eq!(pacer.cancel(), None);
    }
}
