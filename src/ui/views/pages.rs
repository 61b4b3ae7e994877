//! Columns, detail lines, filters and row actions for each admin page.

use ratatui::prelude::*;

use crate::api::types::{
  AiLog, AuditLog, FoodItem, FoodPatch, InventoryItem, InventoryPatch, Order, OrderPatch,
  OrderStatus, Role, User, UserPatch,
};
use crate::list::ListResult;
use crate::ui::renderfns::{
  action_color, confidence_color, money, order_status_color, risk_color, stock_status_color,
  truncate,
};
use crate::ui::view::Shortcut;
use crate::ui::views::list_page::{FilterCycle, PageRows, RowAction};

fn dim(text: impl Into<String>) -> Span<'static> {
  Span::styled(text.into(), Style::default().fg(Color::DarkGray))
}

/// "label: value" detail line
fn field(label: &str, value: impl Into<String>) -> Line<'static> {
  Line::from(vec![
    dim(format!("{}: ", label)),
    Span::raw(value.into()),
  ])
}

/// Backend timestamps are ISO-8601; show them as "YYYY-MM-DD HH:MM"
pub(super) fn timestamp(value: Option<&str>) -> String {
  value
    .map(|v| v.replacen('T', " ", 1).chars().take(16).collect())
    .unwrap_or_else(|| "—".to_string())
}

// ============================================================================
// Orders
// ============================================================================

impl PageRows for Order {
  const TITLE: &'static str = "Orders";
  const SEARCH_HINT: &'static str = "order id or customer";

  fn filters() -> &'static [FilterCycle] {
    &[FilterCycle {
      key: 'f',
      param: "status",
      label: "status",
      values: &["all", "pending", "completed", "cancelled"],
    }]
  }

  fn columns() -> Line<'static> {
    Line::from(format!(
      "  {:<8} {:<22} {:>10}  {:<10} {:>5}  {}",
      "ORDER", "CUSTOMER", "TOTAL", "STATUS", "ITEMS", "PLACED"
    ))
  }

  fn row(&self) -> Line<'static> {
    Line::from(vec![
      Span::styled(format!("#{:<7}", self.id), Style::default().fg(Color::Cyan)),
      Span::raw(format!(" {:<22}", truncate(&self.user_name, 22))),
      Span::raw(format!(" {:>10}", money(self.total_price))),
      Span::styled(
        format!("  {:<10}", self.status),
        Style::default().fg(order_status_color(self.status)),
      ),
      Span::raw(format!(" {:>5}", self.item_count)),
      dim(format!("  {}", timestamp(self.created_at.as_deref()))),
    ])
  }

  fn details(&self) -> Vec<Line<'static>> {
    vec![
      field("email", self.user_email.clone().unwrap_or_else(|| "—".into())),
      field(
        "payment",
        self.payment_method.clone().unwrap_or_else(|| "—".into()),
      ),
      field("placed", timestamp(self.created_at.as_deref())),
    ]
  }

  fn action(&self, key: char) -> Option<RowAction<OrderPatch>> {
    let status = match key {
      's' => self.status.next(),
      'c' => OrderStatus::Completed,
      'X' => OrderStatus::Cancelled,
      _ => return None,
    };
    Some(RowAction::Mutate(OrderPatch { status }))
  }

  fn action_shortcuts() -> Vec<Shortcut> {
    vec![
      Shortcut::new("s", "status").with_priority(70),
      Shortcut::new("c", "complete").with_priority(71),
      Shortcut::new("X", "cancel").with_priority(72),
    ]
  }
}

// ============================================================================
// Users
// ============================================================================

impl PageRows for User {
  const TITLE: &'static str = "Users";
  const SEARCH_HINT: &'static str = "name or email";

  fn filters() -> &'static [FilterCycle] {
    &[FilterCycle {
      key: 'f',
      param: "role",
      label: "role",
      values: &["all", "USER", "ADMIN"],
    }]
  }

  fn columns() -> Line<'static> {
    Line::from(format!(
      "  {:<6} {:<20} {:<28} {:<6} {:<9} {}",
      "ID", "NAME", "EMAIL", "ROLE", "STATUS", "RISK"
    ))
  }

  fn row(&self) -> Line<'static> {
    let role_color = match self.role {
      Role::Admin => Color::Magenta,
      Role::User => Color::White,
    };
    let (status, status_color) = if self.disabled {
      ("disabled", Color::Red)
    } else {
      ("active", Color::Green)
    };
    let risk = self.risk_level.clone().unwrap_or_else(|| "—".into());

    Line::from(vec![
      Span::styled(format!("{:<6}", self.id), Style::default().fg(Color::Cyan)),
      Span::raw(format!(" {:<20}", truncate(&self.name, 20))),
      dim(format!(" {:<28}", truncate(&self.email, 28))),
      Span::styled(format!(" {:<6}", self.role), Style::default().fg(role_color)),
      Span::styled(format!(" {:<9}", status), Style::default().fg(status_color)),
      Span::styled(format!(" {}", risk), Style::default().fg(risk_color(&risk))),
    ])
  }

  fn details(&self) -> Vec<Line<'static>> {
    vec![
      field(
        "profile",
        if self.profile_completed {
          "completed"
        } else {
          "incomplete"
        },
      ),
      field(
        "health score",
        self
          .health_score
          .map(|s| format!("{:.0}", s))
          .unwrap_or_else(|| "—".into()),
      ),
    ]
  }

  fn action(&self, key: char) -> Option<RowAction<UserPatch>> {
    match key {
      'R' => Some(RowAction::Mutate(UserPatch::Role(self.role.toggled()))),
      'd' => Some(RowAction::Mutate(UserPatch::Disabled(!self.disabled))),
      _ => None,
    }
  }

  fn action_shortcuts() -> Vec<Shortcut> {
    vec![
      Shortcut::new("R", "role").with_priority(70),
      Shortcut::new("d", "enable/disable").with_priority(71),
    ]
  }
}

// ============================================================================
// Foods
// ============================================================================

impl PageRows for FoodItem {
  const TITLE: &'static str = "Foods";
  const SEARCH_HINT: &'static str = "dish name";

  fn filters() -> &'static [FilterCycle] {
    &[
      FilterCycle {
        key: 'f',
        param: "category",
        label: "category",
        values: &["all", "Breakfast", "Lunch", "Snacks", "Beverages", "Desserts"],
      },
      FilterCycle {
        key: 'v',
        param: "available_only",
        label: "available only",
        values: &["all", "true"],
      },
    ]
  }

  fn columns() -> Line<'static> {
    Line::from(format!(
      "  {:<6} {:<26} {:<11} {:>9}  {:<12} {:<11} {}",
      "ID", "NAME", "CATEGORY", "PRICE", "DIET", "AVAILABLE", "STOCK"
    ))
  }

  fn row(&self) -> Line<'static> {
    let name = match &self.image_emoji {
      Some(emoji) => format!("{} {}", emoji, self.name),
      None => self.name.clone(),
    };
    let (available, color) = if self.is_available {
      ("yes", Color::Green)
    } else {
      ("no", Color::Red)
    };

    Line::from(vec![
      Span::styled(format!("{:<6}", self.id), Style::default().fg(Color::Cyan)),
      Span::raw(format!(" {:<26}", truncate(&name, 26))),
      dim(format!(" {:<11}", truncate(&self.category, 11))),
      Span::raw(format!(" {:>9}", money(self.price))),
      Span::raw(format!(
        "  {:<12}",
        truncate(self.dietary_type.as_deref().unwrap_or("—"), 12)
      )),
      Span::styled(format!(" {:<11}", available), Style::default().fg(color)),
      Span::raw(
        self
          .stock
          .map(|s| format!(" {}", s))
          .unwrap_or_else(|| " —".into()),
      ),
    ])
  }

  fn details(&self) -> Vec<Line<'static>> {
    vec![
      field(
        "calories",
        self
          .calories
          .map(|c| format!("{:.0} kcal", c))
          .unwrap_or_else(|| "—".into()),
      ),
      field(
        "reorder level",
        self
          .reorder_level
          .map(|l| l.to_string())
          .unwrap_or_else(|| "—".into()),
      ),
    ]
  }

  fn action(&self, key: char) -> Option<RowAction<FoodPatch>> {
    (key == 't').then(|| {
      RowAction::Mutate(FoodPatch {
        is_available: !self.is_available,
      })
    })
  }

  fn action_shortcuts() -> Vec<Shortcut> {
    vec![Shortcut::new("t", "toggle available").with_priority(70)]
  }
}

// ============================================================================
// Inventory
// ============================================================================

impl PageRows for InventoryItem {
  const TITLE: &'static str = "Inventory";
  const SEARCH_HINT: &'static str = "dish name";

  fn columns() -> Line<'static> {
    Line::from(format!(
      "  {:<26} {:<11} {:>12} {:>8}  {}",
      "ITEM", "CATEGORY", "STOCK", "REORDER", "STATUS"
    ))
  }

  fn row(&self) -> Line<'static> {
    let stock = match &self.unit {
      Some(unit) => format!("{} {}", self.current_stock, unit),
      None => self.current_stock.to_string(),
    };
    Line::from(vec![
      Span::raw(format!("{:<26}", truncate(&self.food_name, 26))),
      dim(format!(" {:<11}", truncate(&self.category, 11))),
      Span::raw(format!(" {:>12}", truncate(&stock, 12))),
      Span::raw(format!(" {:>8}", self.reorder_level)),
      Span::styled(
        format!("  {}", self.status.label()),
        Style::default().fg(stock_status_color(self.status)),
      ),
    ])
  }

  fn details(&self) -> Vec<Line<'static>> {
    vec![
      field("food id", self.food_id.to_string()),
      field("last updated", timestamp(self.last_updated.as_deref())),
    ]
  }

  fn action(&self, key: char) -> Option<RowAction<InventoryPatch>> {
    (key == 'e').then(|| RowAction::Prompt {
      title: format!("Stock for {}", truncate(&self.food_name, 24)),
      initial: self.current_stock.to_string(),
    })
  }

  fn parse_prompt(input: &str) -> ListResult<InventoryPatch> {
    InventoryPatch::parse_stock(input)
  }

  fn action_shortcuts() -> Vec<Shortcut> {
    vec![Shortcut::new("e", "edit stock").with_priority(70)]
  }
}

// ============================================================================
// Audit
// ============================================================================

impl PageRows for AuditLog {
  const TITLE: &'static str = "Audit";
  const SEARCH_HINT: &'static str = "summary or table";

  fn filters() -> &'static [FilterCycle] {
    &[
      FilterCycle {
        key: 'f',
        param: "action_type",
        label: "action",
        values: &[
          "all",
          "CREATE",
          "UPDATE",
          "DELETE",
          "STATUS_CHANGE",
          "EXPORT",
          "RETRAIN",
        ],
      },
      FilterCycle {
        key: 't',
        param: "target_table",
        label: "target",
        values: &[
          "all",
          "orders",
          "users",
          "food_items",
          "inventory",
          "health_profiles",
          "ai_model",
        ],
      },
    ]
  }

  fn columns() -> Line<'static> {
    Line::from(format!(
      "  {:<19} {:<4} {:<18} {:<14} {:<16} {}",
      "TIME", "", "ADMIN", "ACTION", "TARGET", "SUMMARY"
    ))
  }

  fn row(&self) -> Line<'static> {
    let action_style = if self.is_critical() {
      Style::default().fg(action_color(&self.action_type)).bold()
    } else {
      Style::default().fg(action_color(&self.action_type))
    };
    Line::from(vec![
      dim(format!("{:<19}", self.timestamp_display.as_deref().unwrap_or("—"))),
      Span::styled(
        format!(" {:<4}", self.admin_initials),
        Style::default().fg(Color::Cyan),
      ),
      Span::raw(format!(" {:<18}", truncate(&self.admin_name, 18))),
      Span::styled(format!(" {:<14}", self.action_type), action_style),
      dim(format!(
        " {:<16}",
        truncate(self.target_table.as_deref().unwrap_or("—"), 16)
      )),
      Span::raw(format!(
        " {}",
        truncate(self.summary.as_deref().unwrap_or(""), 60)
      )),
    ])
  }

  fn details(&self) -> Vec<Line<'static>> {
    vec![
      field("admin role", self.admin_role.clone()),
      field(
        "ip address",
        self.ip_address.clone().unwrap_or_else(|| "—".into()),
      ),
      field("summary", self.summary.clone().unwrap_or_default()),
    ]
  }
}

// ============================================================================
// AI recommendation logs
// ============================================================================

fn verdict_color(action: &str) -> Color {
  match action.to_ascii_lowercase().as_str() {
    "accepted" => Color::Green,
    "rejected" => Color::Red,
    _ => Color::DarkGray,
  }
}

impl PageRows for AiLog {
  const TITLE: &'static str = "Recommendations";
  const SEARCH_HINT: &'static str = "user or food";

  fn filters() -> &'static [FilterCycle] {
    &[
      FilterCycle {
        key: 'f',
        param: "risk",
        label: "risk",
        values: &["all", "low", "moderate", "high"],
      },
      FilterCycle {
        key: 'v',
        param: "action",
        label: "response",
        values: &["all", "accepted", "rejected", "no_response"],
      },
      FilterCycle {
        key: 't',
        param: "period",
        label: "period",
        values: &["all", "today", "7d", "30d"],
      },
    ]
  }

  fn columns() -> Line<'static> {
    Line::from(format!(
      "  {:<16} {:<18} {:<22} {:>6}  {:<12} {}",
      "TIME", "USER", "FOOD", "CONF", "RESPONSE", "REASON"
    ))
  }

  fn row(&self) -> Line<'static> {
    Line::from(vec![
      dim(format!("{:<16}", timestamp(self.created_at.as_deref()))),
      Span::raw(format!(" {:<18}", truncate(&self.user_name, 18))),
      Span::styled(
        format!(" {:<22}", truncate(&self.food_name, 22)),
        Style::default().fg(Color::Cyan),
      ),
      Span::styled(
        format!(" {:>5.1}%", self.confidence),
        Style::default().fg(confidence_color(self.confidence)),
      ),
      Span::styled(
        format!("  {:<12}", self.action),
        Style::default().fg(verdict_color(&self.action)),
      ),
      dim(format!(" {}", truncate(&self.reason, 40))),
    ])
  }

  fn details(&self) -> Vec<Line<'static>> {
    vec![
      field("id", self.id.clone()),
      field("reason", self.reason.clone()),
      field("served", timestamp(self.created_at.as_deref())),
    ]
  }
}
