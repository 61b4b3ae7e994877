//! One generic view for every paginated admin page.
//!
//! `ListPageView<T>` owns a `PageSession<T>` and binds its intents to keys.
//! What differs per entity (columns, detail lines, filters, row actions)
//! comes from the `PageRows` impl in `pages.rs`.

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use std::sync::Arc;

use crate::list::{
  DataSource, Entity, FetchResult, FilterValue, ListError, ListResult, MutationOutcome,
  PageSession, QueryState, SessionOptions,
};
use crate::ui::components::{EditPrompt, KeyResult, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::pagination_line;
use crate::ui::view::{Shortcut, View, ViewAction};

/// Filter param used by the `/` search overlay
pub const SEARCH_PARAM: &str = "search";

/// A filter bound to a key that cycles through fixed values. The first
/// value is the "show everything" choice.
#[derive(Debug, Clone, Copy)]
pub struct FilterCycle {
  pub key: char,
  pub param: &'static str,
  pub label: &'static str,
  pub values: &'static [&'static str],
}

impl FilterCycle {
  /// Value after `current`; unknown or missing values restart the cycle.
  pub fn next_value(&self, current: Option<&FilterValue>) -> &'static str {
    let current = current.map(|v| v.to_string());
    let position = current.and_then(|c| {
      self
        .values
        .iter()
        .position(|v| v.eq_ignore_ascii_case(&c))
    });
    match position {
      Some(i) => self.values[(i + 1) % self.values.len()],
      None => self.values.get(1).copied().unwrap_or(self.values[0]),
    }
  }
}

/// What a row key does
#[derive(Debug, Clone, PartialEq)]
pub enum RowAction<P> {
  /// Apply this patch right away
  Mutate(P),
  /// Ask for a value first; `PageRows::parse_prompt` turns it into a patch
  Prompt { title: String, initial: String },
}

/// Per-entity presentation and bindings for `ListPageView`
pub trait PageRows: Entity {
  const TITLE: &'static str;
  /// What `/` searches, shown in the overlay title
  const SEARCH_HINT: &'static str;

  fn filters() -> &'static [FilterCycle] {
    &[]
  }

  fn columns() -> Line<'static>;

  fn row(&self) -> Line<'static>;

  /// Lines shown under an expanded row
  fn details(&self) -> Vec<Line<'static>>;

  /// Row-level action for a key, if any
  fn action(&self, _key: char) -> Option<RowAction<Self::Patch>> {
    None
  }

  fn parse_prompt(_input: &str) -> ListResult<Self::Patch> {
    Err(ListError::validation("nothing to edit"))
  }

  fn action_shortcuts() -> Vec<Shortcut> {
    Vec::new()
  }
}

pub struct ListPageView<T: PageRows> {
  session: PageSession<T>,
  list_state: ListState,
  search: SearchInput,
  prompt: Option<EditPrompt<T::Id>>,
  status: Option<String>,
}

impl<T: PageRows> ListPageView<T> {
  pub fn new(source: Arc<dyn DataSource<T>>, page_size: u32, options: SessionOptions) -> Self {
    let mut session = PageSession::new(source, QueryState::new(page_size), options);
    session.load();

    Self {
      session,
      list_state: ListState::default(),
      search: SearchInput::new(T::SEARCH_HINT),
      prompt: None,
      status: None,
    }
  }

  fn selected(&self) -> Option<&T> {
    self
      .list_state
      .selected()
      .and_then(|idx| self.session.items().get(idx))
  }

  fn set_status(&mut self, message: impl Into<String>) {
    self.status = Some(message.into());
  }

  fn cycle_filter(&mut self, filter: FilterCycle) {
    let next = filter.next_value(self.session.query().filter(filter.param));
    self
      .session
      .set_filter(filter.param, Some(FilterValue::from(next)));
    self.set_status(format!("{}: {}", filter.label, next));
  }

  fn run_action(&mut self, key: char) -> bool {
    let Some(row) = self.selected() else {
      return false;
    };
    let id = row.id();
    match row.action(key) {
      Some(RowAction::Mutate(patch)) => {
        self.mutate(&id, patch);
        true
      }
      Some(RowAction::Prompt { title, initial }) => {
        self.prompt = Some(EditPrompt::new(id, title, &initial));
        true
      }
      None => false,
    }
  }

  fn mutate(&mut self, id: &T::Id, patch: T::Patch) {
    match self.session.trigger_mutation(id, patch) {
      Ok(()) => self.set_status(format!("saving {} {}…", T::KIND, id)),
      Err(e) => self.set_status(e.to_string()),
    }
  }

  fn handle_prompt_key(&mut self, key: KeyEvent) {
    let Some(prompt) = self.prompt.as_mut() else {
      return;
    };
    match prompt.handle_key(key) {
      KeyResult::Event(submit) => {
        self.prompt = None;
        match T::parse_prompt(&submit.value) {
          Ok(patch) => self.mutate(&submit.target, patch),
          Err(e) => self.set_status(e.to_string()),
        }
      }
      KeyResult::NotHandled => self.prompt = None,
      KeyResult::Handled => {}
    }
  }

  fn report(&mut self, outcome: MutationOutcome<T::Id>) {
    match outcome {
      MutationOutcome::Committed(id) => self.set_status(format!("{} {} saved", T::KIND, id)),
      MutationOutcome::RolledBack { id, error } => {
        self.set_status(format!("{} {} reverted: {}", T::KIND, id, error))
      }
    }
  }

  fn title(&self) -> String {
    let total = self.session.page().map(|p| p.total);
    match (self.session.state(), total) {
      (FetchResult::Failure(e), _) => format!(" {} (error: {}) ", T::TITLE, e),
      (FetchResult::Loading, Some(total)) => format!(" {} ({}) ⟳ ", T::TITLE, total),
      (FetchResult::Loading, None) => format!(" {} (loading...) ", T::TITLE),
      (_, Some(total)) => format!(" {} ({}) ", T::TITLE, total),
      (_, None) => format!(" {} ", T::TITLE),
    }
  }

  fn filter_bar(&self) -> Line<'static> {
    let query = self.session.query();
    let mut spans = vec![Span::raw(" ")];

    for filter in T::filters() {
      let value = query
        .filter(filter.param)
        .map(|v| v.to_string())
        .unwrap_or_else(|| filter.values[0].to_string());
      let active = query.filter(filter.param).is_some();
      spans.push(Span::styled(
        format!("<{}>", filter.key),
        Style::default().fg(Color::Cyan),
      ));
      spans.push(Span::styled(
        format!(" {}: ", filter.label),
        Style::default().fg(Color::DarkGray),
      ));
      spans.push(Span::styled(
        value,
        if active {
          Style::default().fg(Color::Yellow).bold()
        } else {
          Style::default().fg(Color::White)
        },
      ));
      spans.push(Span::raw("   "));
    }

    if let Some(search) = query.filter(SEARCH_PARAM) {
      spans.push(Span::styled("search: ", Style::default().fg(Color::DarkGray)));
      spans.push(Span::styled(
        format!("\"{}\"", search),
        Style::default().fg(Color::Yellow),
      ));
      spans.push(Span::raw("   "));
    }

    if query.has_filters() {
      spans.push(Span::styled("<x> reset", Style::default().fg(Color::DarkGray)));
    }

    Line::from(spans)
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.session.items().len();
    ensure_valid_selection(&mut self.list_state, len);

    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Column headings
        Constraint::Min(0),    // Rows
      ])
      .split(inner);

    if len == 0 {
      let content = match self.session.state() {
        FetchResult::Loading | FetchResult::Idle => "Loading...".to_string(),
        FetchResult::Failure(e) if e.is_remote() => format!("{}\n\nPress 'r' to retry.", e),
        FetchResult::Failure(e) => e.to_string(),
        FetchResult::Success(_) if self.session.query().has_filters() => {
          format!("No {} match the current filters.", T::TITLE.to_lowercase())
        }
        FetchResult::Success(_) => format!("No {} yet.", T::TITLE.to_lowercase()),
      };
      let paragraph = Paragraph::new(content).style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, inner);
      return;
    }

    frame.render_widget(
      Paragraph::new(T::columns()).style(Style::default().fg(Color::DarkGray).bold()),
      chunks[0],
    );

    let snapshot = self.session.snapshot();
    let items: Vec<ListItem> = snapshot
      .items()
      .iter()
      .map(|entity| {
        let id = entity.id();
        let marker = if snapshot.is_pending(&id) {
          Span::styled("~ ", Style::default().fg(Color::Yellow))
        } else {
          Span::raw("  ")
        };
        let mut row = T::row(entity);
        row.spans.insert(0, marker);

        let mut lines = vec![row];
        if snapshot.is_expanded(&id) {
          lines.extend(entity.details().into_iter().map(|mut line| {
            line.spans.insert(0, Span::raw("      "));
            line
          }));
        }
        ListItem::new(Text::from(lines))
      })
      .collect();

    let list = List::new(items)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[1], &mut self.list_state);
  }
}

impl<T: PageRows> View for ListPageView<T> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.prompt.is_some() {
      self.handle_prompt_key(key);
      return ViewAction::None;
    }

    // Let search component try to handle first
    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(text)) => {
        self
          .session
          .set_filter_debounced(SEARCH_PARAM, Some(FilterValue::from(text)));
        return ViewAction::None;
      }
      KeyResult::Event(SearchEvent::Submitted(text)) => {
        self
          .session
          .set_filter(SEARCH_PARAM, Some(FilterValue::from(text)));
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Enter => {
        if let Some(id) = self.selected().map(|row| row.id()) {
          self.session.toggle_expanded(&id);
        }
      }
      KeyCode::Char('n') | KeyCode::Char(']') | KeyCode::Right => {
        if self.session.next_page() {
          self.list_state.select(Some(0));
        }
      }
      KeyCode::Char('p') | KeyCode::Char('[') | KeyCode::Left => {
        if self.session.prev_page() {
          self.list_state.select(Some(0));
        }
      }
      KeyCode::Char('g') => {
        self.session.go_to_page(1);
      }
      KeyCode::Char('G') => {
        if let Some(pagination) = self.session.pagination() {
          self.session.go_to_page(pagination.page_count);
        }
      }
      KeyCode::Char('+') => {
        if self.session.cycle_page_size() {
          self.set_status(format!("{} per page", self.session.query().page_size()));
        }
      }
      KeyCode::Char('r') => self.session.refresh(),
      KeyCode::Char('a') => match self.session.toggle_polling() {
        Ok(true) => {
          let secs = self.session.options().poll_period.as_secs();
          self.set_status(format!("auto-refresh every {}s", secs));
        }
        Ok(false) => self.set_status("auto-refresh off"),
        Err(e) => self.set_status(e.to_string()),
      },
      KeyCode::Char('x') => {
        self.search.clear();
        self.session.reset_filters();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      KeyCode::Char(c) => {
        if let Some(filter) = T::filters().iter().find(|f| f.key == c).copied() {
          self.cycle_filter(filter);
        } else {
          self.run_action(c);
        }
      }
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Filters
        Constraint::Min(3),    // List
        Constraint::Length(1), // Pagination
      ])
      .split(area);

    frame.render_widget(Paragraph::new(self.filter_bar()), chunks[0]);
    self.render_list(frame, chunks[1]);

    if let Some(pagination) = self.session.pagination() {
      let polling = self
        .session
        .is_polling()
        .then(|| self.session.options().poll_period);
      let line = pagination_line(
        &pagination,
        polling,
        self.session.snapshot().fetched_at,
        Utc::now(),
      );
      frame.render_widget(Paragraph::new(line), chunks[2]);
    }

    self.search.render_overlay(frame, chunks[1]);
    if let Some(prompt) = &self.prompt {
      prompt.render_overlay(frame, chunks[1]);
    }
  }

  fn breadcrumb_label(&self) -> String {
    match self.session.pagination() {
      Some(p) if p.page_count > 1 => format!("{} [{}/{}]", T::TITLE, p.page, p.page_count),
      _ => T::TITLE.to_string(),
    }
  }

  fn captures_input(&self) -> bool {
    self.search.is_active() || self.prompt.is_some()
  }

  fn status_message(&self) -> Option<String> {
    self.status.clone()
  }

  fn tick(&mut self) {
    let update = self.session.poll();
    for outcome in update.outcomes {
      self.report(outcome);
    }
    if update.changed {
      ensure_valid_selection(&mut self.list_state, self.session.items().len());
    }
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    let mut shortcuts = vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("/", "search").with_priority(20),
      Shortcut::new("n/p", "page").with_priority(30),
      Shortcut::new("+", "size").with_priority(40),
      Shortcut::new("a", "auto").with_priority(50),
      Shortcut::new("⏎", "expand").with_priority(60),
    ];
    shortcuts.extend(T::action_shortcuts());
    shortcuts
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const STATUS: FilterCycle = FilterCycle {
    key: 'f',
    param: "status",
    label: "status",
    values: &["all", "pending", "completed", "cancelled"],
  };

  #[test]
  fn test_filter_cycle_from_nothing_picks_first_real_value() {
    assert_eq!(STATUS.next_value(None), "pending");
  }

  #[test]
  fn test_filter_cycle_wraps_back_to_all() {
    let cancelled = FilterValue::from("cancelled");
    assert_eq!(STATUS.next_value(Some(&cancelled)), "all");
    let pending = FilterValue::from("Pending");
    assert_eq!(STATUS.next_value(Some(&pending)), "completed");
  }

  #[test]
  fn test_filter_cycle_unknown_value_restarts() {
    let odd = FilterValue::from("refunded");
    assert_eq!(STATUS.next_value(Some(&odd)), "pending");
  }
}
