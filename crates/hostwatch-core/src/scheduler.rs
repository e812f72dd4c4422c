//! Periodic refresh requests.
//!
//! While running, [`RefreshScheduler`] yields one tick per period and the
//! owner answers each tick with [`RefreshScheduler::fire`], which emits one
//! `request_update` through the channel. Ticks are never queued: if the owner
//! falls behind, the next tick is pushed back rather than bursting.

use std::time::Duration;

use log::{debug, trace};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use crate::channel::{ChannelManager, SendOutcome};
use crate::protocol::REQUEST_UPDATE;

/// Default refresh period.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug)]
pub struct RefreshScheduler {
    period: Duration,
    interval: Option<Interval>,
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_INTERVAL)
    }
}

impl RefreshScheduler {
    /// A stopped scheduler. A zero period is bumped to 1 ms.
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Begin ticking; the first tick is one period from now. Returns false if
    /// already running (the existing timer is kept, never duplicated).
    pub fn start(&mut self) -> bool {
        if self.interval.is_some() {
            return false;
        }
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        debug!("refresh scheduler started ({} ms)", self.period.as_millis());
        true
    }

    /// Stop ticking. Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        if self.interval.take().is_none() {
            return false;
        }
        debug!("refresh scheduler stopped");
        true
    }

    /// Wait for the next tick. Never resolves while stopped. Cancel-safe.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }

    /// Emit one refresh request. Dropped by the channel while not Connected.
    pub fn fire(&self, channel: &mut ChannelManager) -> SendOutcome {
        let outcome = channel.send(REQUEST_UPDATE);
        trace!("refresh tick: {outcome:?}");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_and_stop_are_idempotent() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let mut scheduler = RefreshScheduler::new(Duration::from_millis(50));
            assert!(!scheduler.is_running());
            assert!(scheduler.start());
            assert!(!scheduler.start());
            assert!(scheduler.is_running());
            assert!(scheduler.stop());
            assert!(!scheduler.stop());
            assert!(!scheduler.is_running());
        });
    }

    #[test]
    fn zero_period_is_bumped() {
        assert_eq!(
            RefreshScheduler::new(Duration::ZERO).period(),
            Duration::from_millis(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let mut scheduler = RefreshScheduler::new(Duration::from_millis(1000));
        scheduler.start();
        let began = Instant::now();

        scheduler.tick().await;
        assert_eq!(began.elapsed(), Duration::from_millis(1000));
        scheduler.tick().await;
        assert_eq!(began.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_scheduler_never_ticks() {
        let mut scheduler = RefreshScheduler::new(Duration::from_millis(10));
        scheduler.start();
        scheduler.stop();
        let waited = tokio::time::timeout(Duration::from_secs(60), scheduler.tick()).await;
        assert!(waited.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_does_not_double_the_rate() {
        let mut scheduler = RefreshScheduler::new(Duration::from_millis(100));
        scheduler.start();
        scheduler.start();
        let began = Instant::now();
        let mut ticks = 0;
        while began.elapsed() < Duration::from_millis(1000) {
            scheduler.tick().await;
            ticks += 1;
        }
        assert_eq!(ticks, 10);
    }

    #[test]
    fn fire_while_disconnected_is_dropped() {
        let scheduler = RefreshScheduler::default();
        let mut channel = ChannelManager::default();
        assert_eq!(scheduler.fire(&mut channel), SendOutcome::Dropped);
    }
}
