//! Connection liveness: keepalive pings and the idle window.

use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::warn;
use typeduel_lobby::Outbound;
use typeduel_protocol::ServerMessage;

/// Keepalive and idle settings applied to every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Time between server `ping` messages.
    pub keepalive_interval: Duration,

    /// Longest silence tolerated from a client before it is closed.
    pub idle_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(20),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

impl SupervisorConfig {
    /// Makes sure a client answering every ping is never idle-closed.
    ///
    /// `idle_timeout` must exceed `keepalive_interval` by at least half an
    /// interval; otherwise it is raised to twice the interval.
    pub fn validated(mut self) -> Self {
        let floor = self.keepalive_interval + self.keepalive_interval / 2;
        if self.idle_timeout < floor {
            warn!(
                keepalive_ms = self.keepalive_interval.as_millis() as u64,
                idle_ms = self.idle_timeout.as_millis() as u64,
                "idle timeout too close to keepalive interval; raising it"
            );
            self.idle_timeout = self.keepalive_interval * 2;
        }
        self
    }
}

/// Aborts the keepalive task when dropped.
#[derive(Debug)]
pub(crate) struct KeepaliveGuard(JoinHandle<()>);

impl Drop for KeepaliveGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Queues a `ping` on `outbound` every `every` until the queue closes.
///
/// A full queue skips the ping; the lobby drops that peer on its own.
pub(crate) fn spawn_keepalive(outbound: Outbound, every: Duration) -> KeepaliveGuard {
    KeepaliveGuard(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match outbound.try_send(ServerMessage::Ping) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Closed(_)) => break,
            }
        }
    }))
}
