use chrono::{DateTime, Utc};
use ratatui::prelude::*;
use std::time::Duration;

use crate::list::Pagination;
use crate::ui::renderfns::utils::relative_age;

/// Number of page links shown around the current page
pub const PAGE_WINDOW: u32 = 5;

/// "Showing 21–40 of 95"
pub fn showing_label(pagination: &Pagination) -> String {
  let (from, to) = pagination.showing();
  format!("Showing {}–{} of {}", from, to, pagination.total)
}

/// "‹ 1 [2] 3 4 5 ›", with the arrows dimmed out at the edges by the caller
pub fn window_label(pagination: &Pagination) -> String {
  pagination
    .window(PAGE_WINDOW)
    .map(|p| {
      if p == pagination.page {
        format!("[{}]", p)
      } else {
        p.to_string()
      }
    })
    .collect::<Vec<_>>()
    .join(" ")
}

/// Bottom line of a list page: range, page links, page size and refresh
/// state.
pub fn pagination_line(
  pagination: &Pagination,
  polling: Option<Duration>,
  fetched_at: Option<DateTime<Utc>>,
  now: DateTime<Utc>,
) -> Line<'static> {
  let arrow = |enabled: bool| {
    if enabled {
      Style::default().fg(Color::Cyan)
    } else {
      Style::default().fg(Color::DarkGray)
    }
  };

  let mut spans = vec![
    Span::raw(" "),
    Span::styled(showing_label(pagination), Style::default().fg(Color::White)),
    Span::raw("   "),
    Span::styled("‹ ", arrow(pagination.has_prev())),
    Span::styled(window_label(pagination), Style::default().fg(Color::Yellow)),
    Span::styled(" ›", arrow(pagination.has_next())),
    Span::raw("   "),
    Span::styled(
      format!("{}/page", pagination.page_size),
      Style::default().fg(Color::DarkGray),
    ),
  ];

  if let Some(period) = polling {
    spans.push(Span::raw("   "));
    spans.push(Span::styled(
      format!("auto {}s", period.as_secs()),
      Style::default().fg(Color::Green),
    ));
  }

  if let Some(at) = fetched_at {
    spans.push(Span::raw("   "));
    spans.push(Span::styled(
      format!("refreshed {}", relative_age(at, now)),
      Style::default().fg(Color::DarkGray),
    ));
  }

  Line::from(spans)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_showing_label() {
    assert_eq!(
      showing_label(&Pagination::new(95, 2, 20)),
      "Showing 21–40 of 95"
    );
    assert_eq!(
      showing_label(&Pagination::new(95, 5, 20)),
      "Showing 81–95 of 95"
    );
  }

  #[test]
  fn test_window_label() {
    assert_eq!(window_label(&Pagination::new(95, 2, 20)), "1 [2] 3 4 5");
    assert_eq!(window_label(&Pagination::new(500, 10, 20)), "8 9 [10] 11 12");
    assert_eq!(window_label(&Pagination::new(0, 1, 20)), "[1]");
  }

  #[test]
  fn test_pagination_line_mentions_auto_refresh() {
    let now = Utc::now();
    let line = pagination_line(
      &Pagination::new(95, 1, 20),
      Some(Duration::from_secs(30)),
      Some(now),
      now,
    );
    let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
    assert!(text.contains("Showing 1–20 of 95"));
    assert!(text.contains("auto 30s"));
    assert!(text.contains("refreshed just now"));
  }
}
