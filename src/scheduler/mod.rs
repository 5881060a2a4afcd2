//! Periodic sweep scheduling.
//!
//! [`ScanTimer`] yields once per scan period until its [`CancelToken`] is
//! cancelled. It keeps the countdown shown on the dashboard and can be
//! reset after a manual sweep.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

/// Handle that stops a [`ScanTimer`].
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Interval timer for scheduled sweeps.
pub struct ScanTimer {
    period: Duration,
    interval: Interval,
    next_at: Instant,
    cancel: watch::Receiver<bool>,
    cancel_live: bool,
}

impl ScanTimer {
    /// Create a timer whose first scan is due one period from now.
    pub fn new(period: Duration) -> (Self, CancelToken) {
        let (tx, rx) = watch::channel(false);
        let next_at = Instant::now() + period;
        let mut interval = interval_at(next_at, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let timer = Self {
            period,
            interval,
            next_at,
            cancel: rx,
            cancel_live: true,
        };
        (timer, CancelToken { tx: Arc::new(tx) })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait for the next scan. Returns `None` once cancelled.
    pub async fn next_due(&mut self) -> Option<()> {
        loop {
            if *self.cancel.borrow() {
                return None;
            }

            tokio::select! {
                _ = self.interval.tick() => {
                    self.next_at = Instant::now() + self.period;
                    return Some(());
                }
                changed = self.cancel.changed(), if self.cancel_live => {
                    if changed.is_err() {
                        // Every token is gone; only the interval can fire now.
                        self.cancel_live = false;
                    }
                }
            }
        }
    }

    /// Restart the countdown, e.g. after a manual sweep.
    pub fn reset(&mut self) {
        self.interval.reset();
        self.next_at = Instant::now() + self.period;
        debug!("Scan countdown reset to {}s", self.period.as_secs());
    }

    /// Whole seconds until the next scan.
    pub fn seconds_until_next(&self) -> u64 {
        self.next_at.saturating_duration_since(Instant::now()).as_secs()
    }
}

/// Format a countdown as `m:ss`.
pub fn format_countdown(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(1200), "20:00");
        assert_eq!(format_countdown(61), "1:01");
        assert_eq!(format_countdown(9), "0:09");
        assert_eq!(format_countdown(0), "0:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_scan_waits_one_period() {
        let (mut timer, _token) = ScanTimer::new(Duration::from_secs(1200));
        assert_eq!(timer.seconds_until_next(), 1200);

        {
            let mut due = task::spawn(timer.next_due());
            assert_pending!(due.poll());
        }

        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(timer.seconds_until_next(), 600);

        assert_eq!(timer.next_due().await, Some(()));
        assert_eq!(timer.seconds_until_next(), 1200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_repeatedly() {
        let (mut timer, _token) = ScanTimer::new(Duration::from_secs(10));
        let start = Instant::now();
        for _ in 0..3 {
            assert_eq!(timer.next_due().await, Some(()));
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(30) && elapsed < Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_wait() {
        let (mut timer, token) = ScanTimer::new(Duration::from_secs(10));
        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(timer.next_due().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting() {
        let (mut timer, token) = ScanTimer::new(Duration::from_secs(3600));
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let mut due = task::spawn(timer.next_due());
        assert_pending!(due.poll());
        drop(due);

        assert_eq!(timer.next_due().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_token_keeps_ticking() {
        let (mut timer, token) = ScanTimer::new(Duration::from_secs(5));
        drop(token);
        let mut due = task::spawn(timer.next_due());
        assert_pending!(due.poll());
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_ready_eq!(due.poll(), Some(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_restarts_countdown() {
        let (mut timer, _token) = ScanTimer::new(Duration::from_secs(100));
        tokio::time::advance(Duration::from_secs(70)).await;
        assert_eq!(timer.seconds_until_next(), 30);

        timer.reset();
        assert_eq!(timer.seconds_until_next(), 100);
    }
}
