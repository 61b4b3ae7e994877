//! Sequence-gated async fetching for list views and dashboard panels.
//!
//! A `FetchController<D>` owns the fetching logic (a closure producing a
//! future), the loading/success/failure state, and a channel through which
//! spawned fetches report back. Every `refresh` is tagged with an increasing
//! sequence number and only the response of the last-issued request is ever
//! applied, whatever order responses complete in.
//!
//! # Example
//!
//! ```ignore
//! let source = client.clone();
//! let mut orders: ListFetchController<Order> = FetchController::new(move |params| {
//!     let source = source.clone();
//!     async move { source.fetch_list(&params).await }
//! });
//!
//! orders.refresh(&query, RefreshMode::Blocking);
//!
//! // In event loop tick
//! if orders.poll() {
//!     // State changed, re-render
//! }
//! ```

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use tokio::sync::mpsc;
use tracing::debug;

use super::error::{ListError, ListResult};
use super::query_state::{QueryParams, QueryState};
use super::source::Page;

/// The state of a fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult<D> {
  /// Nothing has been requested yet
  Idle,
  /// A request is outstanding
  Loading,
  /// The latest request succeeded
  Success(D),
  /// The latest request failed
  Failure(ListError),
}

impl<D> FetchResult<D> {
  pub fn is_loading(&self) -> bool {
    matches!(self, FetchResult::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, FetchResult::Success(_))
  }

  pub fn is_failure(&self) -> bool {
    matches!(self, FetchResult::Failure(_))
  }

  pub fn error(&self) -> Option<&ListError> {
    match self {
      FetchResult::Failure(e) => Some(e),
      _ => None,
    }
  }
}

/// Whether previously loaded data stays visible while a refresh runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
  /// Hide prior data until the response lands (table skeleton)
  #[default]
  Blocking,
  /// Keep prior data on screen (background refresh, no flash)
  Silent,
}

/// What happens to previously loaded data when a refresh fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
  /// Drop it; the view falls back to its empty state
  #[default]
  Clear,
  /// Keep showing it next to the error
  Retain,
}

type FetcherFn<D> = Box<dyn Fn(QueryParams) -> BoxFuture<'static, ListResult<D>> + Send + Sync>;

/// Async fetch state for one logical target (a table or a panel).
pub struct FetchController<D> {
  result: FetchResult<D>,
  /// Last successful payload while a newer request is loading or failed
  previous: Option<D>,
  mode: RefreshMode,
  error_policy: ErrorPolicy,
  fetcher: FetcherFn<D>,
  tx: mpsc::UnboundedSender<(u64, ListResult<D>)>,
  rx: mpsc::UnboundedReceiver<(u64, ListResult<D>)>,
  /// Sequence of the most recently issued request
  issued: u64,
  /// Responses with a sequence at or below this are ignored
  abandoned_through: u64,
  fetched_at: Option<DateTime<Utc>>,
}

/// A controller whose payload is one page of entities.
pub type ListFetchController<T> = FetchController<Page<T>>;

impl<D: Send + 'static> FetchController<D> {
  /// Create a controller from a fetcher closure.
  ///
  /// The closure receives the serialized query parameters and is called
  /// once per `refresh`.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn(QueryParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ListResult<D>> + Send + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      result: FetchResult::Idle,
      previous: None,
      mode: RefreshMode::default(),
      error_policy: ErrorPolicy::default(),
      fetcher: Box::new(move |params| fetcher(params).boxed()),
      tx,
      rx,
      issued: 0,
      abandoned_through: 0,
      fetched_at: None,
    }
  }

  pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
    self.error_policy = policy;
    self
  }

  pub fn error_policy(&self) -> ErrorPolicy {
    self.error_policy
  }

  pub fn state(&self) -> &FetchResult<D> {
    &self.result
  }

  pub fn is_loading(&self) -> bool {
    self.result.is_loading()
  }

  pub fn error(&self) -> Option<&ListError> {
    self.result.error()
  }

  /// Sequence number of the most recently issued request.
  pub fn latest_sequence(&self) -> u64 {
    self.issued
  }

  /// When the currently visible payload was last fetched successfully.
  pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
    self.fetched_at
  }

  /// The payload to display, taking refresh mode and error policy into
  /// account.
  pub fn data(&self) -> Option<&D> {
    match &self.result {
      FetchResult::Success(data) => Some(data),
      FetchResult::Loading if self.mode == RefreshMode::Silent => self.previous.as_ref(),
      FetchResult::Failure(_) if self.error_policy == ErrorPolicy::Retain => {
        self.previous.as_ref()
      }
      _ => None,
    }
  }

  /// Mutable access to the visible payload, for in-place patches.
  pub fn data_mut(&mut self) -> Option<&mut D> {
    match &mut self.result {
      FetchResult::Success(data) => Some(data),
      FetchResult::Loading if self.mode == RefreshMode::Silent => self.previous.as_mut(),
      FetchResult::Failure(_) if self.error_policy == ErrorPolicy::Retain => {
        self.previous.as_mut()
      }
      _ => None,
    }
  }

  /// Issue a fetch for the given query state.
  ///
  /// Any request still in flight is superseded: its response will be
  /// discarded when it arrives.
  pub fn refresh(&mut self, query: &QueryState, mode: RefreshMode) -> u64 {
    self.issue(query.to_params(), mode)
  }

  /// Issue a fetch with explicit parameters (panels with no query state).
  pub fn issue(&mut self, params: QueryParams, mode: RefreshMode) -> u64 {
    self.issued += 1;
    let seq = self.issued;
    debug!(seq, params = %params.to_query_string(), "issuing fetch");

    if let FetchResult::Success(data) = std::mem::replace(&mut self.result, FetchResult::Loading) {
      self.previous = Some(data);
    }
    self.mode = mode;

    let future = (self.fetcher)(params);
    let tx = self.tx.clone();
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - the controller may have been dropped
      let _ = tx.send((seq, result));
    });

    seq
  }

  /// Stop tracking the outstanding request. Its response will be ignored.
  ///
  /// The state falls back to the last successful payload, or `Idle`.
  pub fn cancel(&mut self) {
    if self.abandoned_through == self.issued {
      return;
    }
    debug!(seq = self.issued, "abandoning outstanding fetch");
    self.abandoned_through = self.issued;
    if self.result.is_loading() {
      self.result = match self.previous.take() {
        Some(data) => FetchResult::Success(data),
        None => FetchResult::Idle,
      };
    }
  }

  /// Apply completed responses. Returns `true` if the state changed.
  ///
  /// Call this in the event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;

    while let Ok((seq, result)) = self.rx.try_recv() {
      if seq != self.issued || seq <= self.abandoned_through {
        debug!(seq, latest = self.issued, "discarding superseded response");
        continue;
      }

      match result {
        Ok(data) => {
          self.result = FetchResult::Success(data);
          self.previous = None;
          self.fetched_at = Some(Utc::now());
        }
        Err(error) => {
          debug!(seq, %error, "fetch failed");
          if self.error_policy == ErrorPolicy::Clear {
            self.previous = None;
          }
          self.result = FetchResult::Failure(error);
        }
      }
      changed = true;
    }

    changed
  }
}

// The fetcher is boxed and the channel is owned, so this is not Clone.

impl<D: std::fmt::Debug> std::fmt::Debug for FetchController<D> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FetchController")
      .field("result", &self.result)
      .field("issued", &self.issued)
      .field("mode", &self.mode)
      .field("error_policy", &self.error_policy)
      .field("fetched_at", &self.fetched_at)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  fn page(items: Vec<&'static str>) -> Page<&'static str> {
    let total = items.len() as u64;
    Page {
      items,
      total,
      page: 1,
      page_count: 1,
    }
  }

  /// Fetcher whose latency and payload depend on the `search` parameter.
  fn keyed_controller() -> ListFetchController<&'static str> {
    FetchController::new(|params: QueryParams| async move {
      match params.get("search") {
        Some("p") => {
          tokio::time::sleep(Duration::from_millis(800)).await;
          Ok(page(vec!["pasta", "pizza", "paneer"]))
        }
        Some("pi") => {
          tokio::time::sleep(Duration::from_millis(550)).await;
          Ok(page(vec!["pizza"]))
        }
        _ => Ok(page(vec!["everything"])),
      }
    })
  }

  #[tokio::test]
  async fn test_fetch_success() {
    let mut controller = FetchController::new(|_| async { Ok::<_, ListError>(vec![1, 2, 3]) });
    assert!(matches!(controller.state(), FetchResult::Idle));

    controller.refresh(&QueryState::new(20), RefreshMode::Blocking);
    assert!(controller.is_loading());

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(controller.poll());
    assert!(controller.state().is_success());
    assert_eq!(controller.data(), Some(&vec![1, 2, 3]));
    assert!(controller.fetched_at().is_some());
  }

  #[tokio::test]
  async fn test_fetch_failure() {
    let mut controller: FetchController<i32> =
      FetchController::new(|_| async { Err(ListError::server(500, "Something went wrong")) });

    controller.refresh(&QueryState::new(20), RefreshMode::Blocking);
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(controller.poll());
    assert_eq!(
      controller.error(),
      Some(&ListError::server(500, "Something went wrong"))
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_last_issued_wins_over_last_completed() {
    let mut controller = keyed_controller();

    let mut first = QueryState::new(20);
    first.set("search", Some("p".into()));
    controller.refresh(&first, RefreshMode::Blocking);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut second = first.clone();
    second.set("search", Some("pi".into()));
    controller.refresh(&second, RefreshMode::Blocking);

    // second completes at ~600ms
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(controller.poll());
    assert_eq!(controller.data().map(|p| p.items.clone()), Some(vec!["pizza"]));

    // first completes at ~800ms and must be ignored
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!controller.poll());
    assert_eq!(controller.data().map(|p| p.items.clone()), Some(vec!["pizza"]));
  }

  #[tokio::test(start_paused = true)]
  async fn test_stale_response_arriving_first_is_not_shown() {
    let mut controller = keyed_controller();

    let mut slow = QueryState::new(20);
    slow.set("search", Some("pi".into()));
    controller.refresh(&slow, RefreshMode::Blocking);

    let fast = QueryState::new(20);
    controller.refresh(&fast, RefreshMode::Blocking);

    // both resolve before we poll; only the second may apply
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(controller.poll());
    assert_eq!(
      controller.data().map(|p| p.items.clone()),
      Some(vec!["everything"])
    );
    assert_eq!(controller.latest_sequence(), 2);
  }

  #[tokio::test]
  async fn test_silent_refresh_keeps_previous_data_visible() {
    let counter = Arc::new(AtomicU32::new(0));
    let c = counter.clone();
    let mut controller = FetchController::new(move |_| {
      let c = c.clone();
      async move {
        let n = c.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, ListError>(n)
      }
    });

    let query = QueryState::new(20);
    controller.refresh(&query, RefreshMode::Blocking);
    assert_eq!(controller.data(), None);
    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.poll();
    assert_eq!(controller.data(), Some(&0));

    controller.refresh(&query, RefreshMode::Silent);
    assert!(controller.is_loading());
    assert_eq!(controller.data(), Some(&0));

    controller.refresh(&query, RefreshMode::Blocking);
    assert_eq!(controller.data(), None);

    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.poll();
    assert_eq!(controller.data(), Some(&2));
  }

  #[tokio::test]
  async fn test_error_policy_clear_and_retain() {
    let fail = Arc::new(AtomicU32::new(0));

    for policy in [ErrorPolicy::Clear, ErrorPolicy::Retain] {
      fail.store(0, Ordering::SeqCst);
      let f = fail.clone();
      let mut controller = FetchController::new(move |_| {
        let f = f.clone();
        async move {
          if f.load(Ordering::SeqCst) == 1 {
            Err(ListError::NetworkFailure("connection refused".into()))
          } else {
            Ok(42)
          }
        }
      })
      .with_error_policy(policy);

      let query = QueryState::new(20);
      controller.refresh(&query, RefreshMode::Blocking);
      tokio::time::sleep(Duration::from_millis(10)).await;
      controller.poll();
      assert_eq!(controller.data(), Some(&42));

      fail.store(1, Ordering::SeqCst);
      controller.refresh(&query, RefreshMode::Blocking);
      tokio::time::sleep(Duration::from_millis(10)).await;
      controller.poll();
      assert!(controller.state().is_failure());

      match policy {
        ErrorPolicy::Clear => assert_eq!(controller.data(), None),
        ErrorPolicy::Retain => assert_eq!(controller.data(), Some(&42)),
      }
    }
  }

  #[tokio::test]
  async fn test_cancel_ignores_outstanding_response() {
    let mut controller = FetchController::new(|_| async {
      tokio::time::sleep(Duration::from_millis(30)).await;
      Ok::<_, ListError>("late")
    });

    controller.refresh(&QueryState::new(20), RefreshMode::Blocking);
    controller.cancel();
    assert!(matches!(controller.state(), FetchResult::Idle));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!controller.poll());
    assert!(matches!(controller.state(), FetchResult::Idle));
  }

  #[tokio::test]
  async fn test_cancel_restores_previous_success() {
    let counter = Arc::new(AtomicU32::new(0));
    let c = counter.clone();
    let mut controller = FetchController::new(move |_| {
      let c = c.clone();
      async move { Ok::<_, ListError>(c.fetch_add(1, Ordering::SeqCst)) }
    });

    let query = QueryState::new(20);
    controller.refresh(&query, RefreshMode::Blocking);
    tokio::time::sleep(Duration::from_millis(10)).await;
    controller.poll();

    controller.refresh(&query, RefreshMode::Blocking);
    controller.cancel();
    assert_eq!(controller.state(), &FetchResult::Success(0));

    // A later refresh is tracked again
    controller.refresh(&query, RefreshMode::Blocking);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(controller.poll());
    assert_eq!(controller.data(), Some(&2));
  }
}
