//! Fixed-period refresh ticks.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::info;

use super::error::{ListError, ListResult};

/// Invokes a callback every `period` until stopped.
///
/// Ticks sit on a fixed grid anchored at `start`, so a slow callback does
/// not push later ticks back. Missed ticks are skipped, not bursted.
#[derive(Debug, Default)]
pub struct PollingScheduler {
  handle: Option<JoinHandle<()>>,
  period: Option<Duration>,
}

impl PollingScheduler {
  pub fn new() -> Self {
    Self::default()
  }

  /// Start ticking, replacing any running schedule.
  ///
  /// The first tick fires one full period after this call.
  pub fn start<F>(&mut self, period: Duration, mut callback: F) -> ListResult<()>
  where
    F: FnMut() + Send + 'static,
  {
    if period.is_zero() {
      return Err(ListError::validation("polling period must be non-zero"));
    }
    self.stop();

    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    self.handle = Some(tokio::spawn(async move {
      loop {
        interval.tick().await;
        callback();
      }
    }));
    self.period = Some(period);
    info!(period_ms = period.as_millis() as u64, "polling started");
    Ok(())
  }

  /// Stop ticking. Safe to call when not running.
  pub fn stop(&mut self) {
    if let Some(handle) = self.handle.take() {
      handle.abort();
      info!("polling stopped");
    }
    self.period = None;
  }

  pub fn is_running(&self) -> bool {
    self.handle.is_some()
  }

  pub fn period(&self) -> Option<Duration> {
    self.period
  }
}

impl Drop for PollingScheduler {
  fn drop(&mut self) {
    self.stop();
  }
}
