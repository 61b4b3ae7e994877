//! Page arithmetic shared by every paginated view.

use std::ops::RangeInclusive;

/// Number of pages for `total` items, never less than 1.
pub fn page_count(total: u64, page_size: u32) -> u32 {
  let page_size = u64::from(page_size.max(1));
  let pages = total.div_ceil(page_size).max(1);
  u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Position of the current page within a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
  pub total: u64,
  pub page: u32,
  pub page_size: u32,
  pub page_count: u32,
}

impl Pagination {
  pub fn new(total: u64, page: u32, page_size: u32) -> Self {
    Self {
      total,
      page: page.max(1),
      page_size: page_size.max(1),
      page_count: page_count(total, page_size),
    }
  }

  /// Whether `page` is a valid, different page to navigate to.
  pub fn can_go_to(&self, page: u32) -> bool {
    page >= 1 && page <= self.page_count && page != self.page
  }

  pub fn has_prev(&self) -> bool {
    self.page > 1
  }

  pub fn has_next(&self) -> bool {
    self.page < self.page_count
  }

  /// Page buttons to display: up to `width` pages around the current one,
  /// shifted at either edge so the count stays constant when possible.
  pub fn window(&self, width: u32) -> RangeInclusive<u32> {
    let width = width.clamp(1, self.page_count);
    let current = self.page.min(self.page_count);

    let mut start = current.saturating_sub(width / 2).max(1);
    let end = (start + width - 1).min(self.page_count);
    if end - start + 1 < width {
      start = (end + 1).saturating_sub(width).max(1);
    }
    start..=end
  }

  /// 1-based indices of the first and last item on this page, `(0, 0)`
  /// for an empty result.
  pub fn showing(&self) -> (u64, u64) {
    if self.total == 0 {
      return (0, 0);
    }
    let size = u64::from(self.page_size);
    let first = u64::from(self.page - 1) * size + 1;
    let last = (u64::from(self.page) * size).min(self.total);
    (first.min(self.total), last)
  }
}
