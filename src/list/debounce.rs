//! Trailing-edge debouncer for free-text filter fields.

use std::time::Duration;
use tokio::task::JoinHandle;

/// Delays a callback until input has been quiet for the given delay.
///
/// Each call to `schedule` cancels the previously scheduled callback of the
/// same instance, so a burst of keystrokes runs only the last callback.
/// Independent fields should each own their own `Debouncer`.
#[derive(Debug, Default)]
pub struct Debouncer {
  pending: Option<JoinHandle<()>>,
}

impl Debouncer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Schedule `f` to run after `delay`, replacing any pending callback.
  ///
  /// Fire-and-forget: nothing is returned to await.
  pub fn schedule<F>(&mut self, delay: Duration, f: F)
  where
    F: FnOnce() + Send + 'static,
  {
    self.cancel();
    self.pending = Some(tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      f();
    }));
  }

  /// Drop the pending callback, if any.
  pub fn cancel(&mut self) {
    if let Some(handle) = self.pending.take() {
      handle.abort();
    }
  }

  /// Whether a callback is scheduled and has not run yet.
  pub fn is_pending(&self) -> bool {
    self
      .pending
      .as_ref()
      .map(|h| !h.is_finished())
      .unwrap_or(false)
  }
}

impl Drop for Debouncer {
  fn drop(&mut self) {
    self.cancel();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::{Arc, Mutex};

  #[tokio::test(start_paused = true)]
  async fn test_burst_runs_only_last_callback_once() {
    let mut debouncer = Debouncer::new();
    let calls = Arc::new(Mutex::new(Vec::new()));

    for text in ["p", "pi", "piz", "pizz", "pizza"] {
      let calls = calls.clone();
      debouncer.schedule(Duration::from_millis(400), move || {
        calls.lock().unwrap().push(text);
      });
      tokio::time::sleep(Duration::from_millis(100)).await;
    }

    assert!(calls.lock().unwrap().is_empty());
    assert!(debouncer.is_pending());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(*calls.lock().unwrap(), vec!["pizza"]);
    assert!(!debouncer.is_pending());
  }

  #[tokio::test(start_paused = true)]
  async fn test_cancel_prevents_callback() {
    let mut debouncer = Debouncer::new();
    let count = Arc::new(AtomicU32::new(0));

    let c = count.clone();
    debouncer.schedule(Duration::from_millis(200), move || {
      c.fetch_add(1, Ordering::SeqCst);
    });
    debouncer.cancel();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(count.load(Ordering::SeqCst), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_cancel_without_pending_is_noop() {
    let mut debouncer = Debouncer::new();
    debouncer.cancel();
    assert!(!debouncer.is_pending());
  }

  #[tokio::test(start_paused = true)]
  async fn test_independent_instances_do_not_reset_each_other() {
    let mut search = Debouncer::new();
    let mut category = Debouncer::new();
    let count = Arc::new(AtomicU32::new(0));

    let c = count.clone();
    search.schedule(Duration::from_millis(300), move || {
      c.fetch_add(1, Ordering::SeqCst);
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    let c = count.clone();
    category.schedule(Duration::from_millis(300), move || {
      c.fetch_add(10, Ordering::SeqCst);
    });
    tokio::time::sleep(Duration::from_millis(150)).await;

    // search fired at 300ms, category still pending
    assert_eq!(count.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(count.load(Ordering::SeqCst), 11);
  }
}
