//! Liveness deadline for one session.

use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// A resettable deadline.
///
/// Any inbound record pushes the deadline `window` into the future. The
/// session's select loop awaits [`expired`](Self::expired) alongside
/// `recv`, so a reset and a timeout can never interleave: whichever
/// branch the loop takes first is the one that happened.
#[derive(Debug)]
pub(crate) struct Heartbeat {
    window: Duration,
    deadline: Instant,
}

impl Heartbeat {
    /// Starts a deadline that fires `window` from now.
    pub(crate) fn arm(window: Duration) -> Self {
        Self {
            window,
            deadline: Instant::now() + window,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.deadline = Instant::now() + self.window;
    }

    pub(crate) fn deadline(&self) -> Instant {
        self.deadline
    }

    /// A future that completes once the current deadline passes.
    pub(crate) fn expired(&self) -> Sleep {
        tokio::time::sleep_until(self.deadline())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_arm_sets_deadline_one_window_ahead() {
        let start = Instant::now();
        let hb = Heartbeat::arm(Duration::from_secs(10));
        assert_eq!(hb.deadline() - start, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_pushes_deadline_from_now() {
        let mut hb = Heartbeat::arm(Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(7)).await;
        hb.reset();
        assert_eq!(hb.deadline() - Instant::now(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_completes_at_deadline() {
        let hb = Heartbeat::arm(Duration::from_secs(10));
        let start = Instant::now();
        hb.expired().await;
        assert!(Instant::now() - start >= Duration::from_secs(10));
    }
}
