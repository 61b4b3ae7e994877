//! The dashboard: four independent panels on one screen.
//!
//! Each panel has its own `FetchController`, so one failing endpoint never
//! blanks the others. The orders-by-hour chart refreshes silently on a
//! `PollingScheduler`; the rest reload on `r`.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{BarChart, Block, Borders, List, ListItem, Paragraph, Wrap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

use crate::api::types::{AuditSummary, HourlyOrders, Overview, RiskAlert};
use crate::api::AdminClient;
use crate::list::{
  ErrorPolicy, FetchController, FetchResult, PollingScheduler, QueryParams, RefreshMode,
};
use crate::ui::renderfns::{money, risk_color, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};

pub struct DashboardView {
  overview: FetchController<Overview>,
  alerts: FetchController<Vec<RiskAlert>>,
  hourly: FetchController<HourlyOrders>,
  audit: FetchController<AuditSummary>,
  poller: PollingScheduler,
  ticks_tx: mpsc::UnboundedSender<()>,
  ticks_rx: mpsc::UnboundedReceiver<()>,
  status: Option<String>,
}

impl DashboardView {
  pub fn new(client: Arc<AdminClient>, poll_period: Duration) -> Self {
    let c = client.clone();
    let overview = FetchController::new(move |_| {
      let c = c.clone();
      async move { c.overview().await }
    })
    .with_error_policy(ErrorPolicy::Retain);

    let c = client.clone();
    let alerts = FetchController::new(move |_| {
      let c = c.clone();
      async move { c.alerts().await }
    });

    let c = client.clone();
    let hourly = FetchController::new(move |_| {
      let c = c.clone();
      async move { c.orders_by_hour().await }
    });

    let c = client;
    let audit = FetchController::new(move |_| {
      let c = c.clone();
      async move { c.audit_summary().await }
    });

    Self::with_panels(overview, alerts, hourly, audit, poll_period)
  }

  fn with_panels(
    overview: FetchController<Overview>,
    alerts: FetchController<Vec<RiskAlert>>,
    hourly: FetchController<HourlyOrders>,
    audit: FetchController<AuditSummary>,
    poll_period: Duration,
  ) -> Self {
    let (ticks_tx, ticks_rx) = mpsc::unbounded_channel();
    let mut view = Self {
      overview,
      alerts,
      hourly,
      audit,
      poller: PollingScheduler::new(),
      ticks_tx,
      ticks_rx,
      status: None,
    };

    view.refresh_all();
    let tx = view.ticks_tx.clone();
    if let Err(e) = view.poller.start(poll_period, move || {
      let _ = tx.send(());
    }) {
      warn!(%e, "dashboard polling not started");
      view.status = Some(e.to_string());
    }
    view
  }

  fn refresh_all(&mut self) {
    self.overview.issue(QueryParams::default(), RefreshMode::Blocking);
    self.alerts.issue(QueryParams::default(), RefreshMode::Blocking);
    self.hourly.issue(QueryParams::default(), RefreshMode::Blocking);
    self.audit.issue(QueryParams::default(), RefreshMode::Blocking);
  }

  fn render_kpis(&self, frame: &mut Frame, area: Rect) {
    let cells = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Ratio(1, 4); 4])
      .split(area);

    let tiles: [(&str, Vec<Line<'static>>); 4] = match self.overview.data() {
      Some(o) => [
        ("Revenue today", revenue_lines(o)),
        (
          "Orders today",
          kpi_lines(o.orders.value.to_string(), format!("{} pending", o.orders.pending)),
        ),
        (
          "Users",
          kpi_lines(
            o.users.value.to_string(),
            format!("+{} this month", o.users.new_this_month),
          ),
        ),
        (
          "Low stock",
          kpi_lines(o.low_stock.value.to_string(), "items at or below reorder".into()),
        ),
      ],
      None => {
        let placeholder = placeholder_lines(self.overview.state());
        [
          ("Revenue today", placeholder.clone()),
          ("Orders today", placeholder.clone()),
          ("Users", placeholder.clone()),
          ("Low stock", placeholder),
        ]
      }
    };

    for ((title, lines), cell) in tiles.into_iter().zip(cells.iter()) {
      let paragraph = Paragraph::new(lines)
        .block(panel(title, self.overview.error().is_some()))
        .alignment(Alignment::Center);
      frame.render_widget(paragraph, *cell);
    }
  }

  fn render_alerts(&self, frame: &mut Frame, area: Rect) {
    let block = panel("Risk alerts", self.alerts.error().is_some());
    match self.alerts.data() {
      Some(alerts) if alerts.is_empty() => {
        let text = Paragraph::new("No risk alerts.")
          .style(Style::default().fg(Color::DarkGray))
          .block(block);
        frame.render_widget(text, area);
      }
      Some(alerts) => {
        let items: Vec<ListItem> = alerts.iter().map(|a| ListItem::new(alert_line(a))).collect();
        frame.render_widget(List::new(items).block(block), area);
      }
      None => {
        let text = Paragraph::new(placeholder_lines(self.alerts.state()))
          .wrap(Wrap { trim: true })
          .block(block);
        frame.render_widget(text, area);
      }
    }
  }

  fn render_hourly(&self, frame: &mut Frame, area: Rect) {
    let title = match self.hourly.data().and_then(|h| h.peak()) {
      Some((hour, count)) => format!("Orders by hour (peak {} · {})", hour, count),
      None => "Orders by hour".to_string(),
    };
    let block = panel(&title, self.hourly.error().is_some());

    match self.hourly.data() {
      Some(hourly) if hourly.total() > 0 => {
        let bars: Vec<(&str, u64)> = hourly
          .hours
          .iter()
          .map(String::as_str)
          .zip(hourly.counts.iter().copied())
          .collect();
        let chart = BarChart::default()
          .block(block)
          .data(bars.as_slice())
          .bar_width(3)
          .bar_gap(1)
          .bar_style(Style::default().fg(Color::Green))
          .value_style(Style::default().fg(Color::Black).bg(Color::Green));
        frame.render_widget(chart, area);
      }
      Some(_) => {
        let text = Paragraph::new("No orders yet today.")
          .style(Style::default().fg(Color::DarkGray))
          .block(block);
        frame.render_widget(text, area);
      }
      None => {
        let text = Paragraph::new(placeholder_lines(self.hourly.state()))
          .wrap(Wrap { trim: true })
          .block(block);
        frame.render_widget(text, area);
      }
    }
  }

  fn render_audit(&self, frame: &mut Frame, area: Rect) {
    let lines = match self.audit.data() {
      Some(summary) => vec![audit_line(summary)],
      None => placeholder_lines(self.audit.state()),
    };
    let paragraph = Paragraph::new(lines).block(panel("Audit", self.audit.error().is_some()));
    frame.render_widget(paragraph, area);
  }
}

pub(super) fn panel(title: &str, failed: bool) -> Block<'static> {
  let color = if failed { Color::Red } else { Color::Blue };
  Block::default()
    .title(format!(" {} ", title))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(color))
}

fn kpi_lines(value: String, caption: String) -> Vec<Line<'static>> {
  vec![
    Line::from(Span::styled(value, Style::default().fg(Color::White).bold())),
    Line::from(Span::styled(caption, Style::default().fg(Color::DarkGray))),
  ]
}

fn revenue_lines(overview: &Overview) -> Vec<Line<'static>> {
  let change = overview.revenue.change;
  let (arrow, color) = if change >= 0.0 {
    ("▲", Color::Green)
  } else {
    ("▼", Color::Red)
  };
  vec![
    Line::from(Span::styled(
      money(overview.revenue.value),
      Style::default().fg(Color::White).bold(),
    )),
    Line::from(Span::styled(
      format!("{} {:.1}% vs last week", arrow, change.abs()),
      Style::default().fg(color),
    )),
  ]
}

fn alert_line(alert: &RiskAlert) -> Line<'static> {
  let emoji = alert.emoji.clone().unwrap_or_else(|| "•".into());
  Line::from(vec![
    Span::raw(format!("{} ", emoji)),
    Span::styled(
      format!("{:<8}", alert.risk),
      Style::default().fg(risk_color(&alert.risk)),
    ),
    Span::raw(format!(" {:<24}", truncate(&alert.item, 24))),
    Span::styled(
      format!(" {}", alert.flag),
      Style::default().fg(Color::DarkGray),
    ),
  ])
}

fn audit_line(summary: &AuditSummary) -> Line<'static> {
  let critical = if summary.critical_actions > 0 {
    Style::default().fg(Color::Red).bold()
  } else {
    Style::default().fg(Color::DarkGray)
  };
  Line::from(vec![
    Span::raw(format!(" {} actions total", summary.total_actions)),
    Span::styled("  │  ", Style::default().fg(Color::DarkGray)),
    Span::raw(format!("{} today", summary.todays_actions)),
    Span::styled("  │  ", Style::default().fg(Color::DarkGray)),
    Span::raw(format!("{} active admins", summary.active_admins)),
    Span::styled("  │  ", Style::default().fg(Color::DarkGray)),
    Span::styled(format!("{} critical", summary.critical_actions), critical),
  ])
}

/// What a panel shows while it has no data
pub(super) fn placeholder_lines<D>(state: &FetchResult<D>) -> Vec<Line<'static>> {
  match state {
    FetchResult::Failure(e) => vec![Line::from(Span::styled(
      e.to_string(),
      Style::default().fg(Color::Red),
    ))],
    _ => vec![Line::from(Span::styled(
      "Loading...",
      Style::default().fg(Color::DarkGray),
    ))],
  }
}

impl View for DashboardView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.status = None;
        self.refresh_all();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(4), // KPI tiles
        Constraint::Min(6),    // Alerts and chart
        Constraint::Length(3), // Audit summary
      ])
      .split(area);
    let middle = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
      .split(rows[1]);

    self.render_kpis(frame, rows[0]);
    self.render_alerts(frame, middle[0]);
    self.render_hourly(frame, middle[1]);
    self.render_audit(frame, rows[2]);
  }

  fn breadcrumb_label(&self) -> String {
    "Dashboard".to_string()
  }

  fn status_message(&self) -> Option<String> {
    self.status.clone()
  }

  fn tick(&mut self) {
    while self.ticks_rx.try_recv().is_ok() {
      if !self.hourly.is_loading() {
        self.hourly.issue(QueryParams::default(), RefreshMode::Silent);
      }
    }
    self.overview.poll();
    self.alerts.poll();
    self.hourly.poll();
    self.audit.poll();
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("r", "refresh").with_priority(20),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::{CountKpi, OrdersKpi, RevenueKpi, UsersKpi};
  use axum::http::StatusCode;
  use axum::routing::get;
  use axum::{Json, Router};
  use serde_json::{json, Value};
  use std::sync::atomic::{AtomicU64, Ordering};

  async fn spawn_server() -> String {
    let app = Router::new()
      .route(
        "/api/admin/overview",
        get(|| async {
          (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "overview unavailable"})),
          )
        }),
      )
      .route(
        "/api/admin/alerts",
        get(|| async {
          Json(json!([{
            "id": 4, "item": "Masala Dosa", "flag": "High sodium",
            "risk": "High", "emoji": "🥞", "category": "Breakfast"
          }]))
        }),
      )
      .route(
        "/api/admin/analytics/orders-by-hour-today",
        get(|| async { Json(json!({"hours": ["9AM", "10AM"], "counts": [3, 7]})) }),
      )
      .route(
        "/api/admin/audit/summary",
        get(|| async {
          Json::<Value>(json!({
            "total_actions": 120, "todays_actions": 8,
            "active_admins": 2, "critical_actions": 1
          }))
        }),
      );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
  }

  async fn settle(view: &mut DashboardView) {
    for _ in 0..100 {
      view.tick();
      let pending = [
        view.overview.is_loading(),
        view.alerts.is_loading(),
        view.hourly.is_loading(),
        view.audit.is_loading(),
      ];
      if !pending.contains(&true) {
        return;
      }
      tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("dashboard panels never settled");
  }

  #[tokio::test]
  async fn test_panels_fail_independently() {
    let url = spawn_server().await;
    let client = AdminClient::with_token(&url, "token", Duration::from_secs(5)).unwrap();
    let mut view = DashboardView::new(Arc::new(client), Duration::from_secs(300));

    settle(&mut view).await;

    assert!(view.overview.error().is_some());
    assert_eq!(view.alerts.data().map(|a| a.len()), Some(1));
    assert_eq!(view.hourly.data().and_then(|h| h.peak()), Some(("10AM", 7)));
    assert_eq!(view.audit.data().map(|s| s.critical_actions), Some(1));
  }

  fn fixed<D: Clone + Send + Sync + 'static>(data: D) -> FetchController<D> {
    FetchController::new(move |_| {
      let data = data.clone();
      async move { Ok(data) }
    })
  }

  fn overview() -> Overview {
    Overview {
      revenue: RevenueKpi {
        value: 820.0,
        change: 3.5,
      },
      orders: OrdersKpi {
        value: 41,
        pending: 5,
      },
      users: UsersKpi {
        value: 380,
        new_this_month: 12,
      },
      low_stock: CountKpi { value: 2 },
    }
  }

  fn hourly_counts(view: &DashboardView) -> Option<Vec<u64>> {
    view.hourly.data().map(|h| h.counts.clone())
  }

  #[tokio::test(start_paused = true)]
  async fn test_hourly_chart_refreshes_silently_on_poll_tick() {
    let fetches = Arc::new(AtomicU64::new(0));
    let counter = fetches.clone();
    let hourly = FetchController::new(move |_| {
      let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
      async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(HourlyOrders {
          hours: vec!["9AM".into()],
          counts: vec![n],
        })
      }
    });
    let summary = AuditSummary {
      total_actions: 10,
      todays_actions: 1,
      active_admins: 1,
      critical_actions: 0,
    };
    let mut view = DashboardView::with_panels(
      fixed(overview()),
      fixed(Vec::new()),
      hourly,
      fixed(summary),
      Duration::from_secs(300),
    );

    settle(&mut view).await;
    assert_eq!(hourly_counts(&view), Some(vec![1]));

    tokio::time::sleep(Duration::from_secs(299)).await;
    view.tick();
    assert!(!view.hourly.is_loading());
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    view.tick();
    assert!(view.hourly.is_loading());
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
    // The previous bars stay up while the refresh is in flight
    assert_eq!(hourly_counts(&view), Some(vec![1]));

    settle(&mut view).await;
    assert_eq!(hourly_counts(&view), Some(vec![2]));
    assert_eq!(view.overview.latest_sequence(), 1);
    assert_eq!(view.audit.latest_sequence(), 1);
  }

  #[test]
  fn test_placeholder_shows_error_text() {
    let state: FetchResult<()> = FetchResult::Failure(crate::list::ListError::server(500, "boom"));
    let lines = placeholder_lines(&state);
    assert!(lines[0].spans[0].content.contains("boom"));

    let loading: FetchResult<()> = FetchResult::Loading;
    assert_eq!(placeholder_lines(&loading)[0].spans[0].content, "Loading...");
  }
}
