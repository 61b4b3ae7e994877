//! The analytics page: ten panels scoped by one date range.
//!
//! Every panel has its own `FetchController`, but all of them take their
//! parameters from one shared `QueryState` whose `period` filter holds the
//! range preset. Changing the range re-issues every panel at once; a panel
//! that fails shows its error without blanking the rest.

use chrono::{Days, Local, NaiveDate};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

use super::dashboard::{panel, placeholder_lines};
use crate::api::types::{
  AiImpact, AnalyticsSummary, CategoryHeatmap, Distribution, PopularFood, RangePreset,
  RiskTrends, SalesTrend, TopSpender, TrendKpi,
};
use crate::api::AdminClient;
use crate::list::{
  ErrorPolicy, FetchController, FilterValue, ListResult, QueryParams, QueryState, RefreshMode,
};
use crate::ui::renderfns::{money, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};

const PERIOD: &str = "period";

/// Request parameters for the range held in `query`, ending `today`.
///
/// Sends the explicit `from`/`to` dates plus the preset itself.
fn range_params(query: &QueryState, today: NaiveDate) -> QueryParams {
  let preset = preset_of(query);
  let from = today - Days::new(preset.days());
  let mut params = QueryParams::default();
  params.push("from", from.format("%Y-%m-%d").to_string());
  params.push("to", today.format("%Y-%m-%d").to_string());
  params.push(PERIOD, preset.as_str());
  params
}

fn preset_of(query: &QueryState) -> RangePreset {
  query
    .filter(PERIOD)
    .and_then(|v| RangePreset::from_param(&v.to_string()))
    .unwrap_or_default()
}

/// Horizontal bar of `value` relative to `max`, at most `width` cells
fn bar(value: f64, max: f64, width: usize) -> String {
  if max <= 0.0 || value <= 0.0 {
    return String::new();
  }
  let cells = ((value / max) * width as f64).round() as usize;
  "█".repeat(cells.clamp(1, width.max(1)))
}

fn change(pct: f64) -> Span<'static> {
  let (arrow, color) = if pct >= 0.0 {
    ("▲", Color::Green)
  } else {
    ("▼", Color::Red)
  };
  Span::styled(
    format!(" {} {:.1}%", arrow, pct.abs()),
    Style::default().fg(color),
  )
}

fn dim(text: impl Into<String>) -> Span<'static> {
  Span::styled(text.into(), Style::default().fg(Color::DarkGray))
}

// ============================================================================
// Panel bodies
// ============================================================================

/// A panel payload that draws itself in `width` columns.
trait PanelBody: Send + 'static {
  fn lines(&self, width: usize) -> Vec<Line<'static>>;
}

impl PanelBody for AnalyticsSummary {
  fn lines(&self, _width: usize) -> Vec<Line<'static>> {
    let kpi = |label: &str, value: String, trend: &TrendKpi| {
      vec![
        dim(format!(" {} ", label)),
        Span::styled(value, Style::default().fg(Color::White).bold()),
        change(trend.change),
        Span::raw("    "),
      ]
    };
    let mut spans = kpi("Revenue", money(self.revenue.value), &self.revenue);
    spans.extend(kpi("Orders", format!("{:.0}", self.orders.value), &self.orders));
    spans.extend(kpi(
      "Avg order",
      money(self.avg_order_value.value),
      &self.avg_order_value,
    ));
    spans.extend(kpi(
      "New users",
      format!("{:.0}", self.new_users.value),
      &self.new_users,
    ));
    vec![Line::from(spans)]
  }
}

impl PanelBody for SalesTrend {
  fn lines(&self, width: usize) -> Vec<Line<'static>> {
    let max = self.revenue.iter().copied().fold(0.0, f64::max);
    let bar_width = width.saturating_sub(28);
    self
      .dates
      .iter()
      .zip(&self.revenue)
      .zip(&self.orders)
      .map(|((date, revenue), orders)| {
        Line::from(vec![
          dim(format!("{:<7}", truncate(date, 7))),
          Span::raw(format!("{:>10}", money(*revenue))),
          dim(format!(" {:>4} ", orders)),
          Span::styled(bar(*revenue, max, bar_width), Style::default().fg(Color::Green)),
        ])
      })
      .collect()
  }
}

impl PanelBody for Distribution {
  fn lines(&self, width: usize) -> Vec<Line<'static>> {
    let max = self.max();
    let bar_width = width.saturating_sub(24);
    self
      .entries()
      .map(|(label, value)| {
        Line::from(vec![
          Span::raw(format!("{:<14}", truncate(label, 14))),
          Span::raw(format!("{:>8.0} ", value)),
          Span::styled(bar(value, max, bar_width), Style::default().fg(Color::Cyan)),
        ])
      })
      .collect()
  }
}

impl PanelBody for Vec<PopularFood> {
  fn lines(&self, width: usize) -> Vec<Line<'static>> {
    let name_width = width.saturating_sub(20).max(8);
    self
      .iter()
      .map(|food| {
        Line::from(vec![
          Span::raw(format!(
            "{:<w$}",
            truncate(&food.name, name_width),
            w = name_width
          )),
          Span::raw(format!("{:>5}", food.orders)),
          change(food.trend),
        ])
      })
      .collect()
  }
}

impl PanelBody for CategoryHeatmap {
  fn lines(&self, _width: usize) -> Vec<Line<'static>> {
    let max = self
      .data
      .iter()
      .map(|(_, _, value)| *value)
      .max()
      .unwrap_or(0);
    let mut header = vec![Span::raw("     ")];
    header.extend(
      self
        .categories
        .iter()
        .map(|c| dim(format!("{:>6}", truncate(c, 5)))),
    );

    let mut lines = vec![Line::from(header)];
    for (d, day) in self.days.iter().enumerate() {
      let mut spans = vec![dim(format!("{:<5}", truncate(day, 4)))];
      for c in 0..self.categories.len() {
        let cell = match self.cell(d, c) {
          Some(value) => {
            let hot = max > 0 && value * 3 >= max * 2;
            let style = if hot {
              Style::default().fg(Color::Red).bold()
            } else {
              Style::default().fg(Color::White)
            };
            Span::styled(format!("{:>6}", value), style)
          }
          None => dim(format!("{:>6}", "·")),
        };
        spans.push(cell);
      }
      lines.push(Line::from(spans));
    }
    lines
  }
}

impl PanelBody for RiskTrends {
  fn lines(&self, _width: usize) -> Vec<Line<'static>> {
    let span = match (self.labels.first(), self.labels.last()) {
      (Some(first), Some(last)) => format!("{} → {}", first, last),
      _ => String::new(),
    };
    let mut lines = vec![Line::from(dim(span))];
    for series in &self.datasets {
      let (first, last) = match (series.data.first(), series.data.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => continue,
      };
      let delta = last as i64 - first as i64;
      let color = if delta > 0 { Color::Yellow } else { Color::Green };
      lines.push(Line::from(vec![
        Span::raw(format!("{:<12}", truncate(&series.label, 12))),
        Span::raw(format!("{:>5} → {:<5}", first, last)),
        Span::styled(format!("{:+}", delta), Style::default().fg(color)),
      ]));
    }
    lines
  }
}

impl PanelBody for Vec<TopSpender> {
  fn lines(&self, _width: usize) -> Vec<Line<'static>> {
    self
      .iter()
      .enumerate()
      .map(|(rank, spender)| {
        Line::from(vec![
          dim(format!("{}. ", rank + 1)),
          Span::raw(format!("{:<18}", truncate(&spender.name, 18))),
          Span::raw(format!("{:>10}", money(spender.spent))),
          dim(format!("  {} orders", spender.orders)),
        ])
      })
      .collect()
  }
}

impl PanelBody for AiImpact {
  fn lines(&self, _width: usize) -> Vec<Line<'static>> {
    vec![
      Line::from(vec![
        dim("served      "),
        Span::raw(self.recommendations_served.to_string()),
      ]),
      Line::from(vec![
        dim("accepted    "),
        Span::raw(format!("{:.1}%", self.acceptance_rate)),
      ]),
      Line::from(vec![
        dim("health      "),
        Span::raw(format!("{:+.0}%", self.health_improvement_score)),
      ]),
      Line::from(vec![
        dim("top item    "),
        Span::raw(
          self
            .top_item_recommended
            .clone()
            .unwrap_or_else(|| "—".into()),
        ),
      ]),
    ]
  }
}

// ============================================================================
// Panels
// ============================================================================

/// One panel's fetch state, driven the same way whatever its payload.
trait Panel {
  fn title(&self) -> &'static str;
  fn issue(&mut self, params: QueryParams, mode: RefreshMode);
  fn poll(&mut self) -> bool;
  fn is_loading(&self) -> bool;
  fn has_data(&self) -> bool;
  fn failed(&self) -> bool;
  fn render(&self, frame: &mut Frame, area: Rect);
}

struct AnalyticsPanel<D> {
  title: &'static str,
  controller: FetchController<D>,
}

impl<D: PanelBody> AnalyticsPanel<D> {
  fn new<F, Fut>(title: &'static str, fetcher: F) -> Self
  where
    F: Fn(QueryParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ListResult<D>> + Send + 'static,
  {
    Self {
      title,
      controller: FetchController::new(fetcher).with_error_policy(ErrorPolicy::Clear),
    }
  }
}

impl<D: PanelBody> Panel for AnalyticsPanel<D> {
  fn title(&self) -> &'static str {
    self.title
  }

  fn issue(&mut self, params: QueryParams, mode: RefreshMode) {
    self.controller.issue(params, mode);
  }

  fn poll(&mut self) -> bool {
    self.controller.poll()
  }

  fn is_loading(&self) -> bool {
    self.controller.is_loading()
  }

  fn has_data(&self) -> bool {
    self.controller.data().is_some()
  }

  fn failed(&self) -> bool {
    self.controller.error().is_some()
  }

  fn render(&self, frame: &mut Frame, area: Rect) {
    let width = area.width.saturating_sub(2) as usize;
    let lines = match self.controller.data() {
      Some(data) => data.lines(width),
      None => placeholder_lines(self.controller.state()),
    };
    let paragraph = Paragraph::new(lines).block(panel(self.title, self.failed()));
    frame.render_widget(paragraph, area);
  }
}

/// Box a panel that calls one client method with the range parameters.
macro_rules! range_panel {
  ($client:expr, $title:expr, $method:ident) => {{
    let c = $client.clone();
    Box::new(AnalyticsPanel::new($title, move |params: QueryParams| {
      let c = c.clone();
      async move { c.$method(&params).await }
    })) as Box<dyn Panel>
  }};
}

// ============================================================================
// View
// ============================================================================

pub struct AnalyticsView {
  query: QueryState,
  /// Summary first, then the grid in reading order
  panels: Vec<Box<dyn Panel>>,
  status: Option<String>,
}

impl AnalyticsView {
  pub fn new(client: Arc<AdminClient>, preset: RangePreset) -> Self {
    let panels = vec![
      range_panel!(client, "Summary", analytics_summary),
      range_panel!(client, "Sales", sales_trend),
      range_panel!(client, "Revenue by category", revenue_by_category),
      range_panel!(client, "Popular foods", popular_foods),
      range_panel!(client, "Orders by day and category", category_heatmap),
      range_panel!(client, "Conditions", disease_distribution),
      range_panel!(client, "Risk trends", risk_trends),
      range_panel!(client, "Peak hours", peak_hours),
      range_panel!(client, "Top spenders", top_spenders),
      range_panel!(client, "AI impact", ai_impact),
    ];
    Self::with_panels(panels, preset)
  }

  fn with_panels(panels: Vec<Box<dyn Panel>>, preset: RangePreset) -> Self {
    let mut view = Self {
      query: QueryState::new(1).with_filter(PERIOD, preset.as_str()),
      panels,
      status: None,
    };
    view.refresh_all(RefreshMode::Blocking);
    view
  }

  pub fn preset(&self) -> RangePreset {
    preset_of(&self.query)
  }

  fn refresh_all(&mut self, mode: RefreshMode) {
    let params = range_params(&self.query, Local::now().date_naive());
    for panel in &mut self.panels {
      panel.issue(params.clone(), mode);
    }
  }

  /// Switch the range. Every panel reloads when it actually changes.
  fn set_preset(&mut self, preset: RangePreset) -> bool {
    if !self
      .query
      .set(PERIOD, Some(FilterValue::from(preset.as_str())))
    {
      return false;
    }
    info!(period = preset.as_str(), "analytics range changed");
    self.status = Some(format!("showing {}", preset.label()));
    self.refresh_all(RefreshMode::Blocking);
    true
  }

  fn range_line(&self) -> Line<'static> {
    let params = range_params(&self.query, Local::now().date_naive());
    let from = params.get("from").unwrap_or_default().to_string();
    let to = params.get("to").unwrap_or_default().to_string();
    let mut spans = vec![
      Span::styled("<f>", Style::default().fg(Color::Cyan)),
      dim(" range: "),
      Span::styled(
        self.preset().label(),
        Style::default().fg(Color::Yellow).bold(),
      ),
      dim(format!("  ({} → {})   ", from, to)),
    ];
    for (i, preset) in RangePreset::ALL.iter().enumerate() {
      spans.push(Span::styled(
        format!("<{}>", i + 1),
        Style::default().fg(Color::Cyan),
      ));
      spans.push(dim(format!(" {}  ", preset.as_str())));
    }
    Line::from(spans)
  }
}

impl View for AnalyticsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self.status = None;
    match key.code {
      KeyCode::Char('f') => {
        self.set_preset(self.preset().next());
      }
      KeyCode::Char(c @ '1'..='4') => {
        let idx = c as usize - '1' as usize;
        self.set_preset(RangePreset::ALL[idx]);
      }
      KeyCode::Char('r') => self.refresh_all(RefreshMode::Blocking),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Range
        Constraint::Length(3), // Summary
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
      ])
      .split(area);

    frame.render_widget(Paragraph::new(self.range_line()), rows[0]);

    let Some((summary, grid)) = self.panels.split_first() else {
      return;
    };
    summary.render(frame, rows[1]);

    for (row, chunk) in rows[2..].iter().zip(grid.chunks(3)) {
      let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3); 3])
        .split(*row);
      for (panel, cell) in chunk.iter().zip(cells.iter()) {
        panel.render(frame, *cell);
      }
    }
  }

  fn breadcrumb_label(&self) -> String {
    format!("Analytics ({})", self.preset().as_str())
  }

  fn status_message(&self) -> Option<String> {
    self.status.clone()
  }

  fn tick(&mut self) {
    for panel in &mut self.panels {
      panel.poll();
    }
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("r", "refresh").with_priority(20),
      Shortcut::new("f", "range").with_priority(30),
      Shortcut::new("1-4", "preset").with_priority(40),
    ]
  }
}
