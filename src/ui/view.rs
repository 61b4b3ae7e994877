use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl Shortcut {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
}

/// Trait for view behavior
///
/// Views handle their own input modes (search, edit prompts) and return
/// actions for the App to execute: App → View → Components.
///
/// Views that load data own a `PageSession` or `FetchController` and drain
/// it in `tick()`.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Whether a text input inside the view owns the keyboard, so the App
  /// must not intercept `:`
  fn captures_input(&self) -> bool {
    false
  }

  /// Transient message for the footer (mutation results, errors)
  fn status_message(&self) -> Option<String> {
    None
  }

  /// Called on each tick to drain async results and timers
  fn tick(&mut self) {}

  /// Get keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("r", "refresh").with_priority(20),
      Shortcut::new("q", "back").with_priority(90),
    ]
  }
}
