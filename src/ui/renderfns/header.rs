use crate::ui::view::Shortcut;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with logo, context, and the current view's shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  page: &str,
  shortcuts: &[Shortcut],
) {
  let mut spans = vec![
    Span::styled(" hbadmin ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", title), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", page),
      Style::default().fg(Color::Yellow).bold(),
    ),
    Span::raw(" "),
  ];

  let mut sorted: Vec<&Shortcut> = shortcuts.iter().collect();
  sorted.sort_by_key(|s| s.priority);

  for shortcut in sorted {
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// Extract the host from an API URL
pub fn extract_domain(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_domain() {
    assert_eq!(
      extract_domain("https://admin.healthbite.app"),
      "admin.healthbite.app"
    );
    assert_eq!(
      extract_domain("https://healthbite.example/api"),
      "healthbite.example"
    );
    assert_eq!(extract_domain("http://localhost:8000"), "localhost:8000");
  }
}
