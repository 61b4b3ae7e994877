use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the footer bar with view breadcrumb and a transient status message
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumb: &[String], status: Option<&str>) {
  let mut spans = vec![Span::raw(" ")];

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
    }

    let style = if i == breadcrumb.len() - 1 {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };

    spans.push(Span::styled(part.clone(), style));
  }

  if let Some(message) = status {
    spans.push(Span::styled("  │  ", Style::default().fg(Color::DarkGray)));
    spans.push(Span::styled(
      message.to_string(),
      Style::default().fg(Color::Yellow),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}
