use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// A value typed for a specific row. The row id is captured when the
/// prompt opens, so later selection changes or refreshes can't redirect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSubmit<Id> {
  pub target: Id,
  pub value: String,
}

/// Modal single-line prompt bound to one row
#[derive(Debug, Clone)]
pub struct EditPrompt<Id> {
  target: Id,
  title: String,
  input: TextInput,
}

impl<Id: Clone> EditPrompt<Id> {
  pub fn new(target: Id, title: impl Into<String>, initial: &str) -> Self {
    Self {
      target,
      title: title.into(),
      input: TextInput::with_value(initial),
    }
  }

  pub fn target(&self) -> &Id {
    &self.target
  }

  /// `Event` on Enter, `NotHandled` on Esc (the caller closes the prompt).
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<PromptSubmit<Id>> {
    match self.input.handle_key(key) {
      InputResult::Submitted(value) => KeyResult::Event(PromptSubmit {
        target: self.target.clone(),
        value,
      }),
      InputResult::Cancelled => KeyResult::NotHandled,
      InputResult::Consumed | InputResult::NotHandled => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let width = 40.min(area.width);
    let height = 3.min(area.height);
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    let overlay_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", self.title));
    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    let line = Line::from(vec![
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(line), inner);
  }
}
