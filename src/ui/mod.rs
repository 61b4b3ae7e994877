pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::ListState;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let shortcuts = app.shortcuts();
  renderfns::draw_header(
    frame,
    chunks[0],
    app.title(),
    &app.page_label(),
    &shortcuts,
  );

  if let Some(view) = app.current_view_mut() {
    view.render(frame, chunks[1]);
  }

  let breadcrumb = app.view_breadcrumb();
  let status = app.status_message();
  renderfns::draw_footer(frame, chunks[2], &breadcrumb, status.as_deref());

  // Overlay goes last so it sits above the view
  app.command_input().render_overlay(frame, chunks[1]);
}

/// Keep a list selection inside `0..len`, selecting the first row when
/// there is none and clearing it for an empty list.
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  match state.selected() {
    _ if len == 0 => state.select(None),
    Some(idx) if idx >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    Some(_) => {}
  }
}
