use crate::api::types::{AuditLog, FoodItem, InventoryItem, Order, User};
use crate::api::AdminClient;
use crate::commands::CommandAction;
use crate::config::{Config, PageKind};
use crate::event::{Event, EventHandler};
use crate::list::{DataSource, ErrorPolicy};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::{AiMonitorView, AnalyticsView, DashboardView, ListPageView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// `:` command overlay
  command_input: CommandInput,

  /// Application configuration
  config: Config,

  /// Admin API client shared by every view
  client: Arc<AdminClient>,

  /// App-level message (unknown command), cleared on the next key
  status: Option<String>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let client = Arc::new(AdminClient::new(&config)?);

    let mut app = Self {
      view_stack: Vec::new(),
      command_input: CommandInput::new(),
      config,
      client,
      status: None,
      should_quit: false,
    };
    app.open_page(app.config.default_page);
    Ok(app)
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(100));
    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => {
          if let Some(view) = self.view_stack.last_mut() {
            view.tick();
          }
        }
        None => break,
      }
    }
    Ok(())
  }

  fn list_page<T>(&self, error_policy: ErrorPolicy) -> Box<dyn View>
  where
    T: ui::views::PageRows,
    AdminClient: DataSource<T>,
  {
    let source: Arc<dyn DataSource<T>> = self.client.clone();
    Box::new(ListPageView::<T>::new(
      source,
      self.config.lists.page_size,
      self.config.session_options(error_policy),
    ))
  }

  fn build_view(&self, page: PageKind) -> Box<dyn View> {
    match page {
      PageKind::Dashboard => Box::new(DashboardView::new(
        self.client.clone(),
        self.config.dashboard_poll_period(),
      )),
      PageKind::Orders => self.list_page::<Order>(ErrorPolicy::Clear),
      PageKind::Users => self.list_page::<User>(ErrorPolicy::Clear),
      PageKind::Foods => self.list_page::<FoodItem>(ErrorPolicy::Clear),
      PageKind::Inventory => self.list_page::<InventoryItem>(ErrorPolicy::Clear),
      PageKind::Audit => self.list_page::<AuditLog>(ErrorPolicy::Clear),
      PageKind::Ai => Box::new(AiMonitorView::new(
        self.client.clone(),
        self.config.lists.page_size,
        self.config.session_options(ErrorPolicy::Clear),
        self.config.ai_status_poll_period(),
      )),
      PageKind::Analytics => Box::new(AnalyticsView::new(
        self.client.clone(),
        self.config.analytics.default_range,
      )),
    }
  }

  /// Replace the whole stack with a fresh root view
  fn open_page(&mut self, page: PageKind) {
    info!(page = page.label(), "opening page");
    let view = self.build_view(page);
    self.view_stack.clear();
    self.view_stack.push(view);
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }
    self.status = None;

    // A view's own text input gets every key, including ':'
    let view_captures = self
      .view_stack
      .last()
      .is_some_and(|view| view.captures_input());

    if !view_captures {
      match self.command_input.handle_key(key) {
        KeyResult::Event(event) => {
          self.handle_command(event);
          return;
        }
        KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    let Some(view) = self.view_stack.last_mut() else {
      return;
    };
    match view.handle_key(key) {
      ViewAction::None => {}
      ViewAction::Push(next) => self.view_stack.push(next),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  fn handle_command(&mut self, event: CommandEvent) {
    match event {
      CommandEvent::Run(CommandAction::Open(page)) => self.open_page(page),
      CommandEvent::Run(CommandAction::Quit) => self.should_quit = true,
      CommandEvent::Unknown(name) if name.is_empty() => {}
      CommandEvent::Unknown(name) => {
        warn!(command = %name, "unknown command");
        self.status = Some(format!("unknown command: {}", name));
      }
      CommandEvent::Cancelled => {}
    }
  }

  // Accessors for UI rendering
  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command_input
  }

  /// Header title: the configured one, else the API host
  pub fn title(&self) -> &str {
    self
      .config
      .title
      .as_deref()
      .unwrap_or_else(|| ui::renderfns::extract_domain(&self.config.api.url))
  }

  pub fn page_label(&self) -> String {
    self
      .view_stack
      .first()
      .map(|view| view.breadcrumb_label())
      .unwrap_or_default()
  }

  pub fn shortcuts(&self) -> Vec<Shortcut> {
    self
      .view_stack
      .last()
      .map(|view| view.shortcuts())
      .unwrap_or_default()
  }

  pub fn status_message(&self) -> Option<String> {
    self
      .status
      .clone()
      .or_else(|| self.view_stack.last().and_then(|view| view.status_message()))
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|view| view.breadcrumb_label())
      .collect()
  }
}

