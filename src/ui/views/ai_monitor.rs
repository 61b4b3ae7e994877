//! The AI monitor: model status above the recommendation log.
//!
//! The status panel loads once when the page opens. While the model is
//! retraining it polls `ai/status` on a `PollingScheduler` and stops as
//! soon as the model reports anything else.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::dashboard::{panel, placeholder_lines};
use super::list_page::ListPageView;
use super::pages::timestamp;
use crate::api::types::{AiLog, AiStatus, RetrainAck};
use crate::api::AdminClient;
use crate::list::{
  DataSource, ErrorPolicy, FetchController, FetchResult, PollingScheduler, QueryParams,
  RefreshMode, SessionOptions,
};
use crate::ui::view::{Shortcut, View, ViewAction};

pub struct AiMonitorView {
  logs: ListPageView<AiLog>,
  status: FetchController<AiStatus>,
  retrain: FetchController<RetrainAck>,
  poller: PollingScheduler,
  poll_period: Duration,
  ticks_tx: mpsc::UnboundedSender<()>,
  ticks_rx: mpsc::UnboundedReceiver<()>,
  message: Option<String>,
}

impl AiMonitorView {
  pub fn new(
    client: Arc<AdminClient>,
    page_size: u32,
    options: SessionOptions,
    poll_period: Duration,
  ) -> Self {
    let source: Arc<dyn DataSource<AiLog>> = client.clone();
    let logs = ListPageView::new(source, page_size, options);

    let c = client.clone();
    let status = FetchController::new(move |_| {
      let c = c.clone();
      async move { c.ai_status().await }
    })
    .with_error_policy(ErrorPolicy::Retain);

    let c = client;
    let retrain = FetchController::new(move |_| {
      let c = c.clone();
      async move { c.retrain_model().await }
    });

    let (ticks_tx, ticks_rx) = mpsc::unbounded_channel();
    let mut view = Self {
      logs,
      status,
      retrain,
      poller: PollingScheduler::new(),
      poll_period,
      ticks_tx,
      ticks_rx,
      message: None,
    };
    view.status.issue(QueryParams::default(), RefreshMode::Blocking);
    view
  }

  fn is_retraining(&self) -> bool {
    self.retrain.is_loading() || self.status.data().is_some_and(AiStatus::is_retraining)
  }

  fn start_retrain(&mut self) {
    if self.is_retraining() {
      self.message = Some("model is already retraining".into());
      return;
    }
    info!("requesting model retrain");
    self.retrain.issue(QueryParams::default(), RefreshMode::Blocking);
    self.message = Some("requesting retrain…".into());
  }

  fn start_polling(&mut self) {
    if self.poller.is_running() {
      return;
    }
    let tx = self.ticks_tx.clone();
    if let Err(e) = self.poller.start(self.poll_period, move || {
      let _ = tx.send(());
    }) {
      warn!(%e, "status polling not started");
      self.message = Some(e.to_string());
    }
  }

  fn on_retrain(&mut self) {
    let outcome = match self.retrain.state() {
      FetchResult::Success(ack) => Ok(ack.message.clone()),
      FetchResult::Failure(e) => Err(e.clone()),
      _ => return,
    };
    match outcome {
      Ok(message) => {
        self.message = Some(message.unwrap_or_else(|| "retraining started".into()));
        self.start_polling();
        self.status.issue(QueryParams::default(), RefreshMode::Silent);
      }
      Err(e) => self.message = Some(format!("retrain failed: {}", e)),
    }
  }

  /// Keep the poller in step with the latest reported status.
  fn on_status(&mut self) {
    let (retraining, label) = match self.status.state() {
      FetchResult::Success(status) => (status.is_retraining(), status.status.clone()),
      _ => return,
    };
    if retraining {
      self.start_polling();
    } else if self.poller.is_running() {
      self.poller.stop();
      info!(status = %label, "retraining finished");
      self.message = Some(format!("retraining finished: {}", label));
    }
  }

  fn status_lines(status: &AiStatus) -> Vec<Line<'static>> {
    let color = match status.status.to_ascii_lowercase().as_str() {
      "active" => Color::Green,
      "degraded" => Color::Yellow,
      "retraining" => Color::Cyan,
      _ => Color::White,
    };
    let dim = Style::default().fg(Color::DarkGray);
    vec![
      Line::from(vec![
        Span::styled(format!(" ● {}", status.status), Style::default().fg(color).bold()),
        Span::styled("   version ", dim),
        Span::raw(status.version.clone()),
        Span::styled("   last trained ", dim),
        Span::raw(timestamp(status.last_trained.as_deref())),
        Span::styled("   predictions ", dim),
        Span::raw(status.total_predictions.to_string()),
      ]),
      Line::from(vec![
        Span::styled(" accuracy ", dim),
        Span::raw(percent(status.accuracy)),
        Span::styled("   precision ", dim),
        Span::raw(percent(status.precision)),
        Span::styled("   recall ", dim),
        Span::raw(percent(status.recall)),
        Span::styled("   f1 ", dim),
        Span::raw(percent(status.f1)),
      ]),
    ]
  }

  fn render_status(&self, frame: &mut Frame, area: Rect) {
    let lines = match self.status.data() {
      Some(status) => Self::status_lines(status),
      None => placeholder_lines(self.status.state()),
    };
    let title = if self.poller.is_running() {
      "Model ⟳"
    } else {
      "Model"
    };
    let paragraph = Paragraph::new(lines).block(panel(title, self.status.error().is_some()));
    frame.render_widget(paragraph, area);
  }
}

fn percent(value: Option<f64>) -> String {
  value
    .map(|v| format!("{:.1}%", v))
    .unwrap_or_else(|| "—".to_string())
}

impl View for AiMonitorView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.logs.captures_input() {
      return self.logs.handle_key(key);
    }
    match key.code {
      KeyCode::Char('T') => {
        self.start_retrain();
        ViewAction::None
      }
      KeyCode::Char('r') => {
        self.message = None;
        if !self.status.is_loading() {
          self.status.issue(QueryParams::default(), RefreshMode::Blocking);
        }
        self.logs.handle_key(key)
      }
      _ => {
        self.message = None;
        self.logs.handle_key(key)
      }
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(4), // Model status
        Constraint::Min(5),    // Recommendation log
      ])
      .split(area);

    self.render_status(frame, chunks[0]);
    self.logs.render(frame, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    "AI monitor".to_string()
  }

  fn captures_input(&self) -> bool {
    self.logs.captures_input()
  }

  fn status_message(&self) -> Option<String> {
    self.message.clone().or_else(|| self.logs.status_message())
  }

  fn tick(&mut self) {
    while self.ticks_rx.try_recv().is_ok() {
      if !self.status.is_loading() {
        self.status.issue(QueryParams::default(), RefreshMode::Silent);
      }
    }
    if self.retrain.poll() {
      self.on_retrain();
    }
    if self.status.poll() {
      self.on_status();
    }
    self.logs.tick();
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    let mut shortcuts = self.logs.shortcuts();
    shortcuts.push(Shortcut::new("T", "retrain").with_priority(75));
    shortcuts
  }
}
