//! Filter, sort and pagination parameters for a list view.

use std::fmt;
use tracing::warn;

/// Parameter name for the current page.
pub const PAGE_KEY: &str = "page";
/// Parameter name for the page size, as the admin API expects it.
pub const PAGE_SIZE_KEY: &str = "per_page";
/// Parameter name for the sort field.
pub const SORT_KEY: &str = "sort";
/// Filter value meaning "no filter".
pub const ALL_SENTINEL: &str = "all";

/// A single filter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
  Text(String),
  Number(i64),
}

impl FilterValue {
  /// Empty text and the "all" sentinel mean the filter is off.
  pub fn is_inactive(&self) -> bool {
    match self {
      FilterValue::Text(s) => {
        let s = s.trim();
        s.is_empty() || s.eq_ignore_ascii_case(ALL_SENTINEL)
      }
      FilterValue::Number(_) => false,
    }
  }
}

impl fmt::Display for FilterValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FilterValue::Text(s) => f.write_str(s),
      FilterValue::Number(n) => write!(f, "{}", n),
    }
  }
}

impl From<&str> for FilterValue {
  fn from(s: &str) -> Self {
    FilterValue::Text(s.to_string())
  }
}

impl From<String> for FilterValue {
  fn from(s: String) -> Self {
    FilterValue::Text(s)
  }
}

impl From<i64> for FilterValue {
  fn from(n: i64) -> Self {
    FilterValue::Number(n)
  }
}

impl From<bool> for FilterValue {
  fn from(b: bool) -> Self {
    FilterValue::Text(b.to_string())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
  Asc,
  Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
  pub field: String,
  pub direction: SortDirection,
}

impl Sort {
  pub fn asc(field: impl Into<String>) -> Self {
    Self {
      field: field.into(),
      direction: SortDirection::Asc,
    }
  }

  pub fn desc(field: impl Into<String>) -> Self {
    Self {
      field: field.into(),
      direction: SortDirection::Desc,
    }
  }

  /// Wire form: `field` or `-field`
  fn as_param(&self) -> String {
    match self.direction {
      SortDirection::Asc => self.field.clone(),
      SortDirection::Desc => format!("-{}", self.field),
    }
  }
}

/// Ordered request parameters produced by [`QueryState::to_params`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
  pub fn get(&self, key: &str) -> Option<&str> {
    self
      .0
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, v)| v.as_str())
  }

  pub fn contains(&self, key: &str) -> bool {
    self.get(key).is_some()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn keys(&self) -> Vec<&str> {
    self.0.iter().map(|(k, _)| k.as_str()).collect()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Append a parameter, keeping order. Used by data sources that map
  /// filter keys onto backend-specific names.
  pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
    self.0.push((key.into(), value.into()));
  }

  /// Encode as `application/x-www-form-urlencoded`.
  pub fn to_query_string(&self) -> String {
    url::form_urlencoded::Serializer::new(String::new())
      .extend_pairs(self.iter())
      .finish()
  }
}

/// The current filter, sort and pagination state of one list view.
///
/// Filters are sparse: inactive values are never stored. Any change other
/// than the page itself sends the view back to page 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
  filters: Vec<(String, FilterValue)>,
  page: u32,
  page_size: u32,
  sort: Option<Sort>,
}

impl QueryState {
  pub fn new(page_size: u32) -> Self {
    Self {
      filters: Vec::new(),
      page: 1,
      page_size: page_size.max(1),
      sort: None,
    }
  }

  /// Builder-style default filter, e.g. a date-range preset.
  pub fn with_filter(mut self, key: &str, value: impl Into<FilterValue>) -> Self {
    self.set(key, Some(value.into()));
    self
  }

  pub fn page(&self) -> u32 {
    self.page
  }

  pub fn page_size(&self) -> u32 {
    self.page_size
  }

  pub fn filter(&self, key: &str) -> Option<&FilterValue> {
    self
      .filters
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, v)| v)
  }

  pub fn filters(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
    self.filters.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn has_filters(&self) -> bool {
    !self.filters.is_empty()
  }

  /// Set or clear a filter. Returns whether the state changed.
  ///
  /// `None`, blank text and `"all"` remove the key. A changed filter
  /// resets the page to 1.
  pub fn set(&mut self, key: &str, value: Option<FilterValue>) -> bool {
    if key == PAGE_KEY || key == PAGE_SIZE_KEY || key == SORT_KEY {
      warn!(key, "ignoring reserved key passed as a filter");
      return false;
    }

    let value = value.filter(|v| !v.is_inactive());
    let position = self.filters.iter().position(|(k, _)| k == key);

    let changed = match (position, value) {
      (Some(idx), None) => {
        self.filters.remove(idx);
        true
      }
      (Some(idx), Some(value)) => {
        if self.filters[idx].1 == value {
          false
        } else {
          self.filters[idx].1 = value;
          true
        }
      }
      (None, Some(value)) => {
        self.filters.push((key.to_string(), value));
        true
      }
      (None, None) => false,
    };

    if changed {
      self.page = 1;
    }
    changed
  }

  /// Move to page `p`. Pages start at 1.
  pub fn set_page(&mut self, page: u32) -> bool {
    if page < 1 || page == self.page {
      return false;
    }
    self.page = page;
    true
  }

  /// Change the page size; a change resets the page to 1.
  pub fn set_page_size(&mut self, page_size: u32) -> bool {
    if page_size < 1 || page_size == self.page_size {
      return false;
    }
    self.page_size = page_size;
    self.page = 1;
    true
  }

  pub fn set_sort(&mut self, sort: Option<Sort>) -> bool {
    if self.sort == sort {
      return false;
    }
    self.sort = sort;
    self.page = 1;
    true
  }

  /// Clear every filter, keeping page size and sort.
  pub fn reset(&mut self) -> bool {
    let changed = !self.filters.is_empty() || self.page != 1;
    self.filters.clear();
    self.page = 1;
    changed
  }

  /// Serialize to request parameters: page, page size, sort, then active
  /// filters in insertion order.
  pub fn to_params(&self) -> QueryParams {
    let mut params = QueryParams::default();
    params.push(PAGE_KEY, self.page.to_string());
    params.push(PAGE_SIZE_KEY, self.page_size.to_string());
    if let Some(sort) = &self.sort {
      params.push(SORT_KEY, sort.as_param());
    }
    for (key, value) in &self.filters {
      params.push(key.clone(), value.to_string());
    }
    params
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_filter_round_trip_through_all() {
    let mut state = QueryState::new(20);
    assert!(state.set("status", Some("Pending".into())));

    let params = state.to_params();
    assert_eq!(params.keys(), vec!["page", "per_page", "status"]);
    assert_eq!(params.get("page"), Some("1"));
    assert_eq!(params.get("per_page"), Some("20"));
    assert_eq!(params.get("status"), Some("Pending"));

    assert!(state.set("status", Some("all".into())));
    assert!(!state.to_params().contains("status"));
  }

  #[test]
  fn test_inactive_values_are_not_stored() {
    let mut state = QueryState::new(20);
    assert!(!state.set("search", Some("".into())));
    assert!(!state.set("search", Some("   ".into())));
    assert!(!state.set("role", Some("ALL".into())));
    assert!(!state.set("role", None));
    assert!(!state.has_filters());
  }

  #[test]
  fn test_filter_change_resets_page() {
    let mut state = QueryState::new(20);
    state.set_page(4);
    assert_eq!(state.page(), 4);

    state.set("search", Some("salad".into()));
    assert_eq!(state.page(), 1);

    state.set_page(3);
    state.set("search", None);
    assert_eq!(state.page(), 1);
  }

  #[test]
  fn test_setting_same_value_is_not_a_change() {
    let mut state = QueryState::new(20).with_filter("status", "pending");
    state.set_page(2);
    assert!(!state.set("status", Some("pending".into())));
    assert_eq!(state.page(), 2);
  }

  #[test]
  fn test_insertion_order_is_stable() {
    let mut state = QueryState::new(10);
    state.set("search", Some("rice".into()));
    state.set("category", Some("Main".into()));
    state.set("search", Some("curry".into()));

    let params = state.to_params();
    assert_eq!(params.keys(), vec!["page", "per_page", "search", "category"]);
    assert_eq!(params.get("search"), Some("curry"));
  }

  #[test]
  fn test_reserved_keys_are_rejected() {
    let mut state = QueryState::new(20);
    assert!(!state.set("page", Some(FilterValue::Number(3))));
    assert!(!state.set("per_page", Some(FilterValue::Number(50))));
    assert_eq!(state.page(), 1);
    assert_eq!(state.page_size(), 20);
  }

  #[test]
  fn test_set_page_bounds() {
    let mut state = QueryState::new(20);
    assert!(!state.set_page(0));
    assert!(!state.set_page(1));
    assert!(state.set_page(2));
  }

  #[test]
  fn test_page_size_change_resets_page() {
    let mut state = QueryState::new(20);
    state.set_page(3);
    assert!(state.set_page_size(50));
    assert_eq!(state.page(), 1);
    assert!(!state.set_page_size(0));
    assert!(!state.set_page_size(50));
  }

  #[test]
  fn test_reset_keeps_page_size_and_sort() {
    let mut state = QueryState::new(50).with_filter("role", "ADMIN");
    assert!(state.set_sort(Some(Sort::desc("created_at"))));
    state.set_page(2);

    assert!(state.reset());
    assert!(!state.has_filters());
    assert_eq!(state.page(), 1);
    assert_eq!(state.page_size(), 50);
    assert_eq!(state.to_params().get("sort"), Some("-created_at"));
  }

  #[test]
  fn test_sort_change_resets_page() {
    let mut state = QueryState::new(20);
    state.set_page(4);
    assert!(state.set_sort(Some(Sort::asc("name"))));
    assert_eq!(state.page(), 1);
    assert_eq!(state.to_params().get("sort"), Some("name"));

    assert!(!state.set_sort(Some(Sort::asc("name"))));
    assert!(state.set_sort(None));
    assert!(!state.to_params().contains("sort"));
  }

  #[test]
  fn test_equality_ignores_nothing_relevant() {
    let a = QueryState::new(20).with_filter("status", "pending");
    let mut b = QueryState::new(20);
    assert_ne!(a, b);
    b.set("status", Some("pending".into()));
    assert_eq!(a, b);
  }

  #[test]
  fn test_query_string_encoding() {
    let state = QueryState::new(20)
      .with_filter("search", "chicken & rice")
      .with_filter("admin_id", 7i64);
    assert_eq!(
      state.to_params().to_query_string(),
      "page=1&per_page=20&search=chicken+%26+rice&admin_id=7"
    );
  }
}
