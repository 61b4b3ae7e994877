//! The data-source seam between the list controller and a transport.

use async_trait::async_trait;
use std::fmt::{Debug, Display};
use std::hash::Hash;

use super::error::ListResult;
use super::pagination::Pagination;
use super::query_state::QueryParams;

/// One page of a list response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub total: u64,
  pub page: u32,
  pub page_count: u32,
}

impl<T> Page<T> {
  pub fn pagination(&self, page_size: u32) -> Pagination {
    Pagination {
      page_count: self.page_count.max(1),
      ..Pagination::new(self.total, self.page, page_size)
    }
  }
}

/// A record held in a list view and addressable by id.
pub trait Entity: Clone + Debug + PartialEq + Send + Sync + 'static {
  type Id: Clone + Eq + Hash + Display + Debug + Send + Sync + 'static;

  /// A partial update, applied locally and sent to the backend.
  type Patch: Clone + Debug + Send + Sync + 'static;

  /// Human-readable kind used in messages ("order", "user").
  const KIND: &'static str;

  fn id(&self) -> Self::Id;

  /// Apply a patch in place. Also used to reconcile server-returned fields.
  fn apply_patch(&mut self, patch: &Self::Patch);

  /// Local precondition check before a patch is applied or sent.
  fn validate_patch(_patch: &Self::Patch) -> ListResult<()> {
    Ok(())
  }
}

/// Asynchronous backend for one entity kind.
#[async_trait]
pub trait DataSource<T: Entity>: Send + Sync {
  /// Fetch one page of records for the given parameters.
  async fn fetch_list(&self, params: &QueryParams) -> ListResult<Page<T>>;

  /// Persist a patch, returning any canonical fields the server reported.
  async fn mutate(&self, id: &T::Id, patch: &T::Patch) -> ListResult<Option<T::Patch>>;
}
