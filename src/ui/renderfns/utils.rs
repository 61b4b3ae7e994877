use chrono::{DateTime, Utc};
use ratatui::prelude::Color;

use crate::api::types::{OrderStatus, StockStatus};

/// Truncate a string to a maximum number of characters, adding "..." if
/// truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Format a rupee amount
pub fn money(amount: f64) -> String {
  format!("₹{:.2}", amount)
}

pub fn order_status_color(status: OrderStatus) -> Color {
  match status {
    OrderStatus::Completed => Color::Green,
    OrderStatus::Pending => Color::Yellow,
    OrderStatus::Cancelled => Color::Red,
    OrderStatus::Unknown => Color::White,
  }
}

pub fn stock_status_color(status: StockStatus) -> Color {
  match status {
    StockStatus::InStock => Color::Green,
    StockStatus::LowStock => Color::Yellow,
    StockStatus::OutOfStock => Color::Red,
  }
}

/// Color for an audit action badge
pub fn action_color(action: &str) -> Color {
  match action {
    "CREATE" => Color::Green,
    "UPDATE" => Color::Cyan,
    "DELETE" => Color::Red,
    "LOGIN" | "LOGOUT" => Color::Magenta,
    "EXPORT" => Color::Blue,
    "RETRAIN" | "STATUS_CHANGE" => Color::Yellow,
    _ => Color::White,
  }
}

pub fn risk_color(risk: &str) -> Color {
  match risk {
    "High" => Color::Red,
    "Medium" => Color::Yellow,
    _ => Color::Green,
  }
}

/// Model confidence in percent
pub fn confidence_color(pct: f64) -> Color {
  if pct < 60.0 {
    Color::Red
  } else if pct < 85.0 {
    Color::Yellow
  } else {
    Color::Green
  }
}

/// "just now", "42s ago", "3m ago", "2h ago"
pub fn relative_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
  let secs = (now - then).num_seconds().max(0);
  match secs {
    0..=4 => "just now".to_string(),
    5..=59 => format!("{}s ago", secs),
    60..=3599 => format!("{}m ago", secs / 60),
    _ => format!("{}h ago", secs / 3600),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("Masala Dosa ☕☕☕", 13), "Masala Dos...");
  }

  #[test]
  fn test_money() {
    assert_eq!(money(18.5), "₹18.50");
  }

  #[test]
  fn test_status_colors() {
    assert_eq!(order_status_color(OrderStatus::Completed), Color::Green);
    assert_eq!(order_status_color(OrderStatus::Cancelled), Color::Red);
    assert_eq!(stock_status_color(StockStatus::LowStock), Color::Yellow);
    assert_eq!(action_color("DELETE"), Color::Red);
    assert_eq!(risk_color("High"), Color::Red);
    assert_eq!(confidence_color(59.9), Color::Red);
    assert_eq!(confidence_color(88.5), Color::Green);
  }

  #[test]
  fn test_relative_age() {
    let now = Utc::now();
    assert_eq!(relative_age(now, now), "just now");
    assert_eq!(relative_age(now - Duration::seconds(42), now), "42s ago");
    assert_eq!(relative_age(now - Duration::seconds(200), now), "3m ago");
    assert_eq!(relative_age(now - Duration::hours(2), now), "2h ago");
    // clock skew never shows negative ages
    assert_eq!(relative_age(now + Duration::seconds(30), now), "just now");
  }
}
