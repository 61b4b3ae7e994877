//! Per-page session: the one object a view owns to drive a list.
//!
//! A `PageSession` bundles the query state, the fetch controller, the
//! optimistic mutator, the polling scheduler and per-field debouncers for a
//! single list view. Views call intent methods from key handlers, call
//! `poll()` on every tick, and render from `snapshot()`.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::debounce::Debouncer;
use super::error::{ListError, ListResult};
use super::fetch::{ErrorPolicy, FetchController, FetchResult, ListFetchController, RefreshMode};
use super::mutation::{MutationOutcome, OptimisticMutator};
use super::pagination::Pagination;
use super::polling::PollingScheduler;
use super::query_state::{FilterValue, QueryState};
use super::source::{DataSource, Entity, Page};

/// Page sizes offered when cycling with the page-size intent.
pub const PAGE_SIZES: &[u32] = &[10, 20, 50, 100];

/// Per-call-site policy for a session.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
  /// Quiet period for debounced filter fields
  pub debounce: Duration,
  /// Auto-refresh period
  pub poll_period: Duration,
  /// Mode for user-triggered refreshes; polling is always silent
  pub refresh_mode: RefreshMode,
  pub error_policy: ErrorPolicy,
}

impl Default for SessionOptions {
  fn default() -> Self {
    Self {
      debounce: Duration::from_millis(400),
      poll_period: Duration::from_secs(30),
      refresh_mode: RefreshMode::Blocking,
      error_policy: ErrorPolicy::Clear,
    }
  }
}

#[derive(Debug)]
enum SessionEvent {
  FilterSettled {
    key: String,
    value: Option<FilterValue>,
  },
  PollTick,
}

/// What changed during a `poll()`.
#[derive(Debug)]
pub struct SessionUpdate<Id> {
  pub changed: bool,
  pub outcomes: Vec<MutationOutcome<Id>>,
}

/// Read-only view of a session for rendering.
#[derive(Debug)]
pub struct SessionSnapshot<'a, T: Entity> {
  pub query: &'a QueryState,
  pub result: &'a FetchResult<Page<T>>,
  /// Data to display (may be stale during a silent refresh)
  pub page: Option<&'a Page<T>>,
  pub pagination: Option<Pagination>,
  pub pending: Vec<&'a T::Id>,
  pub expanded: Option<&'a T::Id>,
  pub polling: bool,
  pub fetched_at: Option<DateTime<Utc>>,
}

impl<'a, T: Entity> SessionSnapshot<'a, T> {
  pub fn items(&self) -> &'a [T] {
    self.page.map(|p| p.items.as_slice()).unwrap_or(&[])
  }

  pub fn is_pending(&self, id: &T::Id) -> bool {
    self.pending.contains(&id)
  }

  pub fn is_expanded(&self, id: &T::Id) -> bool {
    self.expanded == Some(id)
  }
}

/// Owns all list state for one page.
pub struct PageSession<T: Entity> {
  source: Arc<dyn DataSource<T>>,
  query: QueryState,
  /// Query of the last issued fetch, to skip redundant requests
  requested: Option<QueryState>,
  controller: ListFetchController<T>,
  mutator: OptimisticMutator<T>,
  poller: PollingScheduler,
  debouncers: HashMap<String, Debouncer>,
  options: SessionOptions,
  expanded: Option<T::Id>,
  /// Total from the last successful fetch for the current filters; bounds
  /// navigation while a page is loading or after a failed load
  known_total: Option<u64>,
  events_tx: mpsc::UnboundedSender<SessionEvent>,
  events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<T: Entity> PageSession<T> {
  pub fn new(source: Arc<dyn DataSource<T>>, query: QueryState, options: SessionOptions) -> Self {
    let fetch_source = source.clone();
    let controller = FetchController::new(move |params| {
      let source = fetch_source.clone();
      async move { source.fetch_list(&params).await }
    })
    .with_error_policy(options.error_policy);
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    Self {
      source,
      query,
      requested: None,
      controller,
      mutator: OptimisticMutator::new(),
      poller: PollingScheduler::new(),
      debouncers: HashMap::new(),
      options,
      expanded: None,
      known_total: None,
      events_tx,
      events_rx,
    }
  }

  // ---------------------------------------------------------------------
  // Accessors
  // ---------------------------------------------------------------------

  pub fn query(&self) -> &QueryState {
    &self.query
  }

  pub fn state(&self) -> &FetchResult<Page<T>> {
    self.controller.state()
  }

  pub fn options(&self) -> &SessionOptions {
    &self.options
  }

  pub fn page(&self) -> Option<&Page<T>> {
    self.controller.data()
  }

  pub fn items(&self) -> &[T] {
    self.page().map(|p| p.items.as_slice()).unwrap_or(&[])
  }

  pub fn is_loading(&self) -> bool {
    self.controller.is_loading()
  }

  pub fn is_pending(&self, id: &T::Id) -> bool {
    self.mutator.is_pending(id)
  }

  pub fn is_polling(&self) -> bool {
    self.poller.is_running()
  }

  pub fn expanded(&self) -> Option<&T::Id> {
    self.expanded.as_ref()
  }

  /// Position of the current page. While nothing is visible (blocking
  /// load, cleared failure) it falls back to the last known total.
  pub fn pagination(&self) -> Option<Pagination> {
    match self.page() {
      Some(page) => Some(page.pagination(self.query.page_size())),
      None => self
        .known_total
        .map(|total| Pagination::new(total, self.query.page(), self.query.page_size())),
    }
  }

  pub fn snapshot(&self) -> SessionSnapshot<'_, T> {
    SessionSnapshot {
      query: &self.query,
      result: self.controller.state(),
      page: self.controller.data(),
      pagination: self.pagination(),
      pending: self.mutator.pending().map(|p| &p.id).collect(),
      expanded: self.expanded.as_ref(),
      polling: self.poller.is_running(),
      fetched_at: self.controller.fetched_at(),
    }
  }

  // ---------------------------------------------------------------------
  // Intents
  // ---------------------------------------------------------------------

  /// Initial load.
  pub fn load(&mut self) {
    self.fetch(self.options.refresh_mode);
  }

  /// Re-fetch the current query regardless of whether it changed.
  pub fn refresh(&mut self) {
    self.fetch(self.options.refresh_mode);
  }

  /// Set a filter immediately (selects, tabs, toggles).
  pub fn set_filter(&mut self, key: &str, value: Option<FilterValue>) -> bool {
    if let Some(debouncer) = self.debouncers.get_mut(key) {
      debouncer.cancel();
    }
    if self.query.set(key, value) {
      self.on_filters_changed();
      true
    } else {
      false
    }
  }

  /// Set a free-text filter once typing pauses.
  ///
  /// Each key has its own debouncer; typing in one field never delays
  /// another.
  pub fn set_filter_debounced(&mut self, key: &str, value: Option<FilterValue>) {
    let tx = self.events_tx.clone();
    let owned_key = key.to_string();
    self
      .debouncers
      .entry(key.to_string())
      .or_default()
      .schedule(self.options.debounce, move || {
        let _ = tx.send(SessionEvent::FilterSettled {
          key: owned_key,
          value,
        });
      });
  }

  /// Clear all filters (page size and sort survive).
  pub fn reset_filters(&mut self) -> bool {
    for debouncer in self.debouncers.values_mut() {
      debouncer.cancel();
    }
    if self.query.reset() {
      self.on_filters_changed();
      true
    } else {
      false
    }
  }

  /// Navigate to `page`. No-op below 1, past the last page, on the
  /// current page, or before any load has reported a total.
  pub fn go_to_page(&mut self, page: u32) -> bool {
    let allowed = self
      .pagination()
      .is_some_and(|pagination| pagination.can_go_to(page));
    if !allowed || !self.query.set_page(page) {
      return false;
    }
    self.on_query_changed();
    true
  }

  pub fn next_page(&mut self) -> bool {
    self.go_to_page(self.query.page().saturating_add(1))
  }

  pub fn prev_page(&mut self) -> bool {
    self.go_to_page(self.query.page().saturating_sub(1))
  }

  pub fn change_page_size(&mut self, page_size: u32) -> bool {
    if self.query.set_page_size(page_size) {
      self.on_query_changed();
      true
    } else {
      false
    }
  }

  /// Step through [`PAGE_SIZES`].
  pub fn cycle_page_size(&mut self) -> bool {
    let current = self.query.page_size();
    let next = PAGE_SIZES
      .iter()
      .copied()
      .find(|&size| size > current)
      .unwrap_or(PAGE_SIZES[0]);
    self.change_page_size(next)
  }

  /// Apply `patch` to entity `id` optimistically and commit it.
  ///
  /// `NotFound`, `Busy` and `ValidationFailure` are returned before any
  /// network call is made.
  pub fn trigger_mutation(&mut self, id: &T::Id, patch: T::Patch) -> ListResult<()> {
    let items = self
      .controller
      .data_mut()
      .map(|page| page.items.as_mut_slice())
      .ok_or_else(|| ListError::NotFound(format!("{} {}", T::KIND, id)))?;

    let source = self.source.clone();
    let commit_id = id.clone();
    let commit_patch = patch.clone();
    self.mutator.apply_patch(items, id, patch, async move {
      source.mutate(&commit_id, &commit_patch).await
    })
  }

  pub fn start_polling(&mut self) -> ListResult<()> {
    let tx = self.events_tx.clone();
    self.poller.start(self.options.poll_period, move || {
      let _ = tx.send(SessionEvent::PollTick);
    })
  }

  pub fn stop_polling(&mut self) {
    self.poller.stop();
  }

  pub fn toggle_polling(&mut self) -> ListResult<bool> {
    if self.poller.is_running() {
      self.stop_polling();
      Ok(false)
    } else {
      self.start_polling()?;
      Ok(true)
    }
  }

  /// Expand or collapse a row. Presentation only; never fetches.
  pub fn toggle_expanded(&mut self, id: &T::Id) {
    if self.expanded.as_ref() == Some(id) {
      self.expanded = None;
    } else {
      self.expanded = Some(id.clone());
    }
  }

  // ---------------------------------------------------------------------
  // Event loop
  // ---------------------------------------------------------------------

  /// Drain settled filters and poll ticks, apply fetch responses, resolve
  /// mutations. Call on every tick.
  pub fn poll(&mut self) -> SessionUpdate<T::Id> {
    let mut changed = false;

    while let Ok(event) = self.events_rx.try_recv() {
      match event {
        SessionEvent::FilterSettled { key, value } => {
          if self.query.set(&key, value) {
            self.on_filters_changed();
            changed = true;
          }
        }
        SessionEvent::PollTick => {
          // Advisory refresh; a request already in flight covers it
          if !self.controller.is_loading() {
            debug!(kind = T::KIND, "poll tick refresh");
            self.fetch(RefreshMode::Silent);
          }
        }
      }
    }

    if self.controller.poll() {
      if let FetchResult::Success(page) = self.controller.state() {
        self.known_total = Some(page.total);
      }
      changed = true;
    }

    let items = self
      .controller
      .data_mut()
      .map(|page| page.items.as_mut_slice());
    let outcomes = self.mutator.poll(items);
    changed |= !outcomes.is_empty();

    SessionUpdate { changed, outcomes }
  }

  /// Filters decide the total, so the old one no longer bounds navigation.
  fn on_filters_changed(&mut self) {
    self.known_total = None;
    self.on_query_changed();
  }

  fn on_query_changed(&mut self) {
    self.expanded = None;
    let redundant =
      self.requested.as_ref() == Some(&self.query) && !self.controller.state().is_failure();
    if redundant {
      debug!(kind = T::KIND, "query unchanged since last request, skipping fetch");
      return;
    }
    self.fetch(self.options.refresh_mode);
  }

  fn fetch(&mut self, mode: RefreshMode) {
    self.controller.refresh(&self.query, mode);
    self.requested = Some(self.query.clone());
  }
}

impl<T: Entity> std::fmt::Debug for PageSession<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PageSession")
      .field("kind", &T::KIND)
      .field("query", &self.query)
      .field("controller", &self.controller)
      .field("mutator", &self.mutator)
      .field("expanded", &self.expanded)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::list::query_state::QueryParams;
  use async_trait::async_trait;
  use std::sync::Mutex;

  #[derive(Debug, Clone, PartialEq)]
  struct Stock {
    id: u32,
    name: String,
    quantity: i64,
  }

  #[derive(Debug, Clone, PartialEq)]
  struct StockPatch {
    quantity: i64,
  }

  impl Entity for Stock {
    type Id = u32;
    type Patch = StockPatch;
    const KIND: &'static str = "stock";

    fn id(&self) -> u32 {
      self.id
    }

    fn apply_patch(&mut self, patch: &StockPatch) {
      self.quantity = patch.quantity;
    }

    fn validate_patch(patch: &StockPatch) -> ListResult<()> {
      if patch.quantity < 0 {
        return Err(ListError::validation("quantity must be >= 0"));
      }
      Ok(())
    }
  }

  /// In-memory source over 95 rows with a configurable latency and
  /// mutation outcome. Records every request it receives.
  struct FakeSource {
    total: u64,
    latency: Duration,
    reject_mutations: bool,
    requests: Mutex<Vec<QueryParams>>,
    mutations: Mutex<Vec<(u32, i64)>>,
  }

  impl FakeSource {
    fn new() -> Self {
      Self {
        total: 95,
        latency: Duration::from_millis(100),
        reject_mutations: false,
        requests: Mutex::new(Vec::new()),
        mutations: Mutex::new(Vec::new()),
      }
    }

    fn request_count(&self) -> usize {
      self.requests.lock().unwrap().len()
    }

    fn last_request(&self) -> QueryParams {
      self.requests.lock().unwrap().last().cloned().unwrap()
    }
  }

  #[async_trait]
  impl DataSource<Stock> for FakeSource {
    async fn fetch_list(&self, params: &QueryParams) -> ListResult<Page<Stock>> {
      self.requests.lock().unwrap().push(params.clone());
      tokio::time::sleep(self.latency).await;

      let page: u32 = params.get("page").unwrap().parse().unwrap();
      let per_page: u32 = params.get("per_page").unwrap().parse().unwrap();
      let first = u64::from((page - 1) * per_page);
      let last = (first + u64::from(per_page)).min(self.total);
      let items = (first..last)
        .map(|i| Stock {
          id: i as u32 + 1,
          name: format!("item {}", i + 1),
          quantity: 5,
        })
        .collect();

      Ok(Page {
        items,
        total: self.total,
        page,
        page_count: crate::list::pagination::page_count(self.total, per_page),
      })
    }

    async fn mutate(&self, id: &u32, patch: &StockPatch) -> ListResult<Option<StockPatch>> {
      self.mutations.lock().unwrap().push((*id, patch.quantity));
      tokio::time::sleep(Duration::from_millis(50)).await;
      if self.reject_mutations {
        Err(ListError::server(500, "stock update failed"))
      } else {
        Ok(Some(patch.clone()))
      }
    }
  }

  fn session(source: Arc<FakeSource>) -> PageSession<Stock> {
    PageSession::new(source, QueryState::new(20), SessionOptions::default())
  }

  /// Let spawned fetches start without letting them finish.
  async fn flush() {
    tokio::time::sleep(Duration::from_millis(10)).await;
  }

  async fn settle(session: &mut PageSession<Stock>) -> SessionUpdate<u32> {
    tokio::time::sleep(Duration::from_millis(500)).await;
    session.poll()
  }

  #[tokio::test(start_paused = true)]
  async fn test_load_and_page_bounds() {
    let source = Arc::new(FakeSource::new());
    let mut session = session(source.clone());

    session.load();
    assert!(session.is_loading());
    settle(&mut session).await;

    let pagination = session.pagination().unwrap();
    assert_eq!(pagination.page_count, 5);
    assert_eq!(session.items().len(), 20);

    assert!(!session.go_to_page(6));
    assert!(!session.go_to_page(0));
    assert!(!session.go_to_page(1));
    assert_eq!(source.request_count(), 1);

    assert!(session.go_to_page(5));
    flush().await;
    assert_eq!(source.request_count(), 2);
    assert_eq!(source.last_request().get("page"), Some("5"));

    settle(&mut session).await;
    assert_eq!(session.items().len(), 15);
    assert_eq!(session.query().page(), 5);
  }

  #[tokio::test(start_paused = true)]
  async fn test_navigation_while_loading_stays_in_bounds() {
    let source = Arc::new(FakeSource::new());
    let mut session = session(source.clone());

    // no total known before the first load
    assert!(!session.next_page());

    session.load();
    settle(&mut session).await;
    assert!(session.go_to_page(4));
    settle(&mut session).await;

    // rapid presses while the blocking fetch for page 5 is outstanding
    assert!(session.next_page());
    assert!(session.is_loading());
    assert!(session.page().is_none());
    assert!(!session.next_page());
    assert!(!session.next_page());
    assert_eq!(session.query().page(), 5);
    assert_eq!(session.pagination().map(|p| p.page_count), Some(5));

    assert!(session.prev_page());
    assert_eq!(session.query().page(), 4);
    settle(&mut session).await;
    assert_eq!(session.query().page(), 4);
    assert_eq!(session.items().len(), 20);
  }

  #[tokio::test(start_paused = true)]
  async fn test_filter_change_resets_to_first_page() {
    let source = Arc::new(FakeSource::new());
    let mut session = session(source.clone());
    session.load();
    settle(&mut session).await;

    session.go_to_page(3);
    settle(&mut session).await;
    assert_eq!(session.query().page(), 3);

    assert!(session.set_filter("status", Some("Pending".into())));
    assert_eq!(session.query().page(), 1);
    flush().await;
    let params = source.last_request();
    assert_eq!(params.get("page"), Some("1"));
    assert_eq!(params.get("status"), Some("Pending"));

    // "all" removes the key and fetches again
    assert!(session.set_filter("status", Some("all".into())));
    flush().await;
    assert!(!source.last_request().contains("status"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_debounced_search_issues_one_fetch() {
    let source = Arc::new(FakeSource::new());
    let mut session = session(source.clone());
    session.load();
    settle(&mut session).await;
    let before = source.request_count();

    for text in ["s", "sa", "sal", "sala", "salad"] {
      session.set_filter_debounced("search", Some(text.into()));
      tokio::time::sleep(Duration::from_millis(100)).await;
      session.poll();
    }
    assert_eq!(source.request_count(), before);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(session.poll().changed);
    flush().await;
    assert_eq!(source.request_count(), before + 1);
    assert_eq!(source.last_request().get("search"), Some("salad"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_immediate_filter_cancels_pending_debounce() {
    let source = Arc::new(FakeSource::new());
    let mut session = session(source.clone());
    session.load();
    settle(&mut session).await;

    session.set_filter_debounced("search", Some("old".into()));
    session.set_filter("search", Some("new".into()));
    settle(&mut session).await;

    assert_eq!(
      session.query().filter("search"),
      Some(&FilterValue::from("new"))
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_stock_edit_rolls_back() {
    let mut fake = FakeSource::new();
    fake.reject_mutations = true;
    let source = Arc::new(fake);
    let mut session = session(source.clone());
    session.load();
    settle(&mut session).await;

    session
      .trigger_mutation(&3, StockPatch { quantity: 12 })
      .unwrap();
    assert_eq!(session.items()[2].quantity, 12);
    assert!(session.snapshot().is_pending(&3));

    let update = settle(&mut session).await;
    assert_eq!(session.items()[2].quantity, 5);
    assert_eq!(update.outcomes.len(), 1);
    assert_eq!(
      update.outcomes[0].error(),
      Some(&ListError::server(500, "stock update failed"))
    );
    assert!(!session.is_pending(&3));
  }

  #[tokio::test(start_paused = true)]
  async fn test_mutation_preconditions_fail_without_network_call() {
    let source = Arc::new(FakeSource::new());
    let mut session = session(source.clone());

    // nothing loaded yet
    let err = session
      .trigger_mutation(&1, StockPatch { quantity: 1 })
      .unwrap_err();
    assert!(matches!(err, ListError::NotFound(_)));

    session.load();
    settle(&mut session).await;

    let err = session
      .trigger_mutation(&1, StockPatch { quantity: -2 })
      .unwrap_err();
    assert!(matches!(err, ListError::ValidationFailure(_)));

    let err = session
      .trigger_mutation(&500, StockPatch { quantity: 2 })
      .unwrap_err();
    assert!(matches!(err, ListError::NotFound(_)));

    session
      .trigger_mutation(&1, StockPatch { quantity: 2 })
      .unwrap();
    let err = session
      .trigger_mutation(&1, StockPatch { quantity: 3 })
      .unwrap_err();
    assert!(matches!(err, ListError::Busy(_)));

    flush().await;
    assert_eq!(*source.mutations.lock().unwrap(), vec![(1, 2)]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_polling_refreshes_silently() {
    let source = Arc::new(FakeSource::new());
    let mut session = session(source.clone());
    session.load();
    settle(&mut session).await;

    session.start_polling().unwrap();
    assert!(session.snapshot().polling);

    tokio::time::sleep(Duration::from_millis(30_010)).await;
    session.poll();
    flush().await;
    assert_eq!(source.request_count(), 2);
    // data stays visible while the background refresh runs
    assert!(session.is_loading());
    assert_eq!(session.items().len(), 20);

    session.stop_polling();
    tokio::time::sleep(Duration::from_secs(90)).await;
    session.poll();
    assert_eq!(source.request_count(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_expansion_is_cleared_by_navigation_only() {
    let source = Arc::new(FakeSource::new());
    let mut session = session(source.clone());
    session.load();
    settle(&mut session).await;
    let requests = source.request_count();

    session.toggle_expanded(&4);
    assert_eq!(session.expanded(), Some(&4));
    assert_eq!(source.request_count(), requests);

    session.refresh();
    settle(&mut session).await;
    assert_eq!(session.expanded(), Some(&4));

    session.next_page();
    assert_eq!(session.expanded(), None);

    session.toggle_expanded(&30);
    session.toggle_expanded(&30);
    assert_eq!(session.expanded(), None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_cycle_page_size() {
    let source = Arc::new(FakeSource::new());
    let mut session = session(source.clone());
    session.load();
    settle(&mut session).await;

    assert!(session.cycle_page_size());
    assert_eq!(session.query().page_size(), 50);
    flush().await;
    assert_eq!(source.last_request().get("per_page"), Some("50"));

    session.cycle_page_size();
    session.cycle_page_size();
    assert_eq!(session.query().page_size(), 10);
  }
}
