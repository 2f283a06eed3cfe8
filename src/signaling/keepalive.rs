//! Cancellable periodic keepalive schedule owned by one signaling session.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Keepalive schedule. Disarmed until the session id is known.
///
/// Cancelling drops the underlying interval, so no tick can fire after
/// [`KeepaliveTimer::cancel`] returns.
#[derive(Debug)]
pub struct KeepaliveTimer {
    period: Duration,
    interval: Option<Interval>,
}

impl KeepaliveTimer {
    /// Creates a disarmed timer with the given period.
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    /// Starts ticking; the first tick fires one full period from now.
    pub fn arm(&mut self) {
        let mut interval = time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    /// Stops ticking.
    pub fn cancel(&mut self) {
        self.interval = None;
    }

    /// Returns `true` while the timer is armed.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    /// Completes at the next tick. Never completes while disarmed.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
