use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by search input that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Text changed (each keystroke; empty string on cancel)
  Changed(String),
  /// Overlay closed with Enter, the text stays applied
  Submitted(String),
}

/// Free-text search overlay opened with `/`
#[derive(Debug, Clone)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
  hint: &'static str,
}

impl SearchInput {
  /// `hint` describes what the search matches, e.g. "order id or customer"
  pub fn new(hint: &'static str) -> Self {
    Self {
      input: TextInput::new(),
      active: false,
      hint,
    }
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn query(&self) -> &str {
    self.input.value()
  }

  /// Open the overlay, keeping the current text for editing
  pub fn activate(&mut self) {
    self.active = true;
  }

  /// Forget the text without emitting anything (filters were reset)
  pub fn clear(&mut self) {
    self.input.clear();
  }

  /// Handle a key event
  /// Call this regardless of active state - it handles activation too
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<SearchEvent> {
    if !self.active {
      if key.code == KeyCode::Char('/') {
        self.activate();
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(text) => {
        self.active = false;
        KeyResult::Event(SearchEvent::Submitted(text))
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input.clear();
        KeyResult::Event(SearchEvent::Changed(String::new()))
      }
      InputResult::Consumed => {
        KeyResult::Event(SearchEvent::Changed(self.input.value().to_string()))
      }
      // Swallow everything else while the overlay is open
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  /// Render the search overlay if active
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width, 3.min(area.height));

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" Search: {} ", self.hint));

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let input_line = Line::from(vec![
      Span::styled("/", Style::default().fg(Color::Yellow)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(input_line), inner);
  }
}
