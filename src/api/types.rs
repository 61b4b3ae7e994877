//! Domain types for the admin pages and their optimistic patches.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::list::{Entity, ListError, ListResult};

/// Accepts `true`/`false` as well as the `0`/`1` integers the backend
/// stores some flags as.
fn bool_from_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Flag {
    Bool(bool),
    Int(i64),
    Null(()),
  }

  Ok(match Flag::deserialize(deserializer)? {
    Flag::Bool(b) => b,
    Flag::Int(i) => i != 0,
    Flag::Null(()) => false,
  })
}

// ============================================================================
// Orders
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Completed,
  Cancelled,
  /// Any status the console doesn't manage
  #[serde(other)]
  Unknown,
}

impl OrderStatus {
  /// Statuses an admin can set.
  pub const SETTABLE: [OrderStatus; 3] = [
    OrderStatus::Pending,
    OrderStatus::Completed,
    OrderStatus::Cancelled,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Completed => "completed",
      OrderStatus::Cancelled => "cancelled",
      OrderStatus::Unknown => "unknown",
    }
  }

  /// Next settable status, used by the status-cycle key.
  pub fn next(&self) -> OrderStatus {
    match self {
      OrderStatus::Pending => OrderStatus::Completed,
      OrderStatus::Completed => OrderStatus::Cancelled,
      OrderStatus::Cancelled | OrderStatus::Unknown => OrderStatus::Pending,
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Order {
  pub id: u64,
  #[serde(default)]
  pub user_name: String,
  pub user_email: Option<String>,
  #[serde(default)]
  pub total_price: f64,
  pub status: OrderStatus,
  pub payment_method: Option<String>,
  pub created_at: Option<String>,
  #[serde(default)]
  pub item_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPatch {
  pub status: OrderStatus,
}

impl Entity for Order {
  type Id = u64;
  type Patch = OrderPatch;
  const KIND: &'static str = "order";

  fn id(&self) -> u64 {
    self.id
  }

  fn apply_patch(&mut self, patch: &OrderPatch) {
    self.status = patch.status;
  }

  fn validate_patch(patch: &OrderPatch) -> ListResult<()> {
    if patch.status == OrderStatus::Unknown {
      return Err(ListError::validation("invalid order status"));
    }
    Ok(())
  }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
  User,
  Admin,
}

impl Role {
  pub fn toggled(&self) -> Role {
    match self {
      Role::User => Role::Admin,
      Role::Admin => Role::User,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Role::User => "USER",
      Role::Admin => "ADMIN",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
  pub id: u64,
  pub name: String,
  pub email: String,
  pub role: Role,
  #[serde(default, deserialize_with = "bool_from_int")]
  pub disabled: bool,
  #[serde(default, deserialize_with = "bool_from_int")]
  pub profile_completed: bool,
  pub risk_level: Option<String>,
  pub health_score: Option<f64>,
}

/// A user change is either a role change or an enable/disable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserPatch {
  Role(Role),
  Disabled(bool),
}

impl Entity for User {
  type Id = u64;
  type Patch = UserPatch;
  const KIND: &'static str = "user";

  fn id(&self) -> u64 {
    self.id
  }

  fn apply_patch(&mut self, patch: &UserPatch) {
    match patch {
      UserPatch::Role(role) => self.role = *role,
      UserPatch::Disabled(disabled) => self.disabled = *disabled,
    }
  }
}

// ============================================================================
// Foods
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FoodItem {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub category: String,
  #[serde(default)]
  pub price: f64,
  pub calories: Option<f64>,
  pub dietary_type: Option<String>,
  pub image_emoji: Option<String>,
  #[serde(default, deserialize_with = "bool_from_int")]
  pub is_available: bool,
  pub stock: Option<i64>,
  pub reorder_level: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoodPatch {
  pub is_available: bool,
}

impl Entity for FoodItem {
  type Id = u64;
  type Patch = FoodPatch;
  const KIND: &'static str = "food item";

  fn id(&self) -> u64 {
    self.id
  }

  fn apply_patch(&mut self, patch: &FoodPatch) {
    self.is_available = patch.is_available;
  }
}

// ============================================================================
// Inventory
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum StockStatus {
  #[serde(rename = "In Stock")]
  InStock,
  #[serde(rename = "Low Stock")]
  LowStock,
  #[serde(rename = "Out of Stock")]
  OutOfStock,
}

impl StockStatus {
  /// Same thresholds the backend uses.
  pub fn for_levels(current_stock: i64, reorder_level: i64) -> Self {
    if current_stock == 0 {
      StockStatus::OutOfStock
    } else if current_stock <= reorder_level {
      StockStatus::LowStock
    } else {
      StockStatus::InStock
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      StockStatus::InStock => "In Stock",
      StockStatus::LowStock => "Low Stock",
      StockStatus::OutOfStock => "Out of Stock",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InventoryItem {
  pub id: u64,
  pub food_id: u64,
  #[serde(default)]
  pub food_name: String,
  #[serde(default)]
  pub category: String,
  pub current_stock: i64,
  pub reorder_level: i64,
  pub unit: Option<String>,
  pub status: StockStatus,
  pub last_updated: Option<String>,
}

/// Stock edit. Fields left `None` are not changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub current_stock: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reorder_level: Option<i64>,
  /// Server-reported timestamp, only present on canonical patches
  #[serde(skip_serializing, default)]
  pub last_updated: Option<String>,
}

impl InventoryPatch {
  /// Parse what the admin typed into the stock prompt.
  pub fn parse_stock(input: &str) -> ListResult<Self> {
    let trimmed = input.trim();
    let current_stock = trimmed
      .parse::<i64>()
      .map_err(|_| ListError::validation(format!("'{}' is not a whole number", trimmed)))?;
    let patch = Self {
      current_stock: Some(current_stock),
      ..Self::default()
    };
    InventoryItem::validate_patch(&patch)?;
    Ok(patch)
  }
}

impl Entity for InventoryItem {
  type Id = u64;
  type Patch = InventoryPatch;
  const KIND: &'static str = "inventory record";

  fn id(&self) -> u64 {
    self.id
  }

  fn apply_patch(&mut self, patch: &InventoryPatch) {
    if let Some(stock) = patch.current_stock {
      self.current_stock = stock;
    }
    if let Some(level) = patch.reorder_level {
      self.reorder_level = level;
    }
    if let Some(updated) = &patch.last_updated {
      self.last_updated = Some(updated.clone());
    }
    self.status = StockStatus::for_levels(self.current_stock, self.reorder_level);
  }

  fn validate_patch(patch: &InventoryPatch) -> ListResult<()> {
    if patch.current_stock.is_none() && patch.reorder_level.is_none() {
      return Err(ListError::validation("nothing to update"));
    }
    if patch.current_stock.is_some_and(|s| s < 0) {
      return Err(ListError::validation("stock cannot be negative"));
    }
    if patch.reorder_level.is_some_and(|l| l < 0) {
      return Err(ListError::validation("reorder level cannot be negative"));
    }
    Ok(())
  }
}

// ============================================================================
// Audit
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuditLog {
  pub id: u64,
  pub timestamp_display: Option<String>,
  #[serde(default)]
  pub admin_name: String,
  #[serde(default)]
  pub admin_initials: String,
  #[serde(default)]
  pub admin_role: String,
  #[serde(default)]
  pub action_type: String,
  pub summary: Option<String>,
  pub target_table: Option<String>,
  pub ip_address: Option<String>,
}

impl AuditLog {
  /// Actions highlighted as critical in the summary panel.
  pub fn is_critical(&self) -> bool {
    matches!(
      self.action_type.as_str(),
      "DELETE" | "RETRAIN" | "STATUS_CHANGE"
    )
  }
}

/// Audit logs are read-only.
impl Entity for AuditLog {
  type Id = u64;
  type Patch = ();
  const KIND: &'static str = "audit log";

  fn id(&self) -> u64 {
    self.id
  }

  fn apply_patch(&mut self, _patch: &()) {}

  fn validate_patch(_patch: &()) -> ListResult<()> {
    Err(ListError::validation("audit logs are read-only"))
  }
}

// ============================================================================
// Dashboard panels
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Overview {
  pub revenue: RevenueKpi,
  pub orders: OrdersKpi,
  pub users: UsersKpi,
  #[serde(rename = "lowStock")]
  pub low_stock: CountKpi,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RevenueKpi {
  pub value: f64,
  /// Percent change against the same day last week
  #[serde(default)]
  pub change: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrdersKpi {
  pub value: u64,
  #[serde(default)]
  pub pending: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UsersKpi {
  pub value: u64,
  #[serde(rename = "newThisMonth", default)]
  pub new_this_month: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CountKpi {
  pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RiskAlert {
  pub id: u64,
  pub item: String,
  pub flag: String,
  pub risk: String,
  pub emoji: Option<String>,
  #[serde(default)]
  pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HourlyOrders {
  pub hours: Vec<String>,
  pub counts: Vec<u64>,
}

impl HourlyOrders {
  /// Hour label and count of the busiest hour so far.
  pub fn peak(&self) -> Option<(&str, u64)> {
    self
      .hours
      .iter()
      .zip(&self.counts)
      .max_by_key(|(_, count)| **count)
      .map(|(hour, count)| (hour.as_str(), *count))
  }

  pub fn total(&self) -> u64 {
    self.counts.iter().sum()
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuditSummary {
  pub total_actions: u64,
  pub todays_actions: u64,
  pub active_admins: u64,
  pub critical_actions: u64,
}

// ============================================================================
// AI monitor
// ============================================================================

/// One recommendation the model served, as shown on the AI monitor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AiLog {
  /// Opaque string ids such as "log-12"
  pub id: String,
  #[serde(default)]
  pub user_name: String,
  #[serde(default)]
  pub food_name: String,
  #[serde(default)]
  pub reason: String,
  /// Percent, 0-100
  #[serde(default)]
  pub confidence: f64,
  #[serde(default)]
  pub action: String,
  pub created_at: Option<String>,
}

/// Recommendation logs are read-only.
impl Entity for AiLog {
  type Id = String;
  type Patch = ();
  const KIND: &'static str = "recommendation";

  fn id(&self) -> String {
    self.id.clone()
  }

  fn apply_patch(&mut self, _patch: &()) {}

  fn validate_patch(_patch: &()) -> ListResult<()> {
    Err(ListError::validation("recommendation logs are read-only"))
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AiStatus {
  pub status: String,
  #[serde(default)]
  pub version: String,
  pub accuracy: Option<f64>,
  pub precision: Option<f64>,
  pub recall: Option<f64>,
  pub f1: Option<f64>,
  pub last_trained: Option<String>,
  #[serde(default)]
  pub total_predictions: u64,
}

impl AiStatus {
  pub fn is_retraining(&self) -> bool {
    self.status.eq_ignore_ascii_case("retraining")
  }
}

/// Reply to a retrain request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetrainAck {
  pub message: Option<String>,
  pub training_id: Option<u64>,
}

// ============================================================================
// Analytics
// ============================================================================

/// Date-range presets offered by the analytics page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangePreset {
  #[serde(rename = "today")]
  Today,
  #[serde(rename = "7d")]
  Week,
  #[default]
  #[serde(rename = "30d")]
  Month,
  #[serde(rename = "90d")]
  Quarter,
}

impl RangePreset {
  pub const ALL: [RangePreset; 4] = [
    RangePreset::Today,
    RangePreset::Week,
    RangePreset::Month,
    RangePreset::Quarter,
  ];

  /// Value of the `period` parameter
  pub fn as_str(&self) -> &'static str {
    match self {
      RangePreset::Today => "today",
      RangePreset::Week => "7d",
      RangePreset::Month => "30d",
      RangePreset::Quarter => "90d",
    }
  }

  pub fn from_param(value: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|p| p.as_str() == value)
  }

  pub fn label(&self) -> &'static str {
    match self {
      RangePreset::Today => "today",
      RangePreset::Week => "last 7 days",
      RangePreset::Month => "last 30 days",
      RangePreset::Quarter => "last 90 days",
    }
  }

  /// Length of the range in days, not counting today
  pub fn days(&self) -> u64 {
    match self {
      RangePreset::Today => 0,
      RangePreset::Week => 7,
      RangePreset::Month => 30,
      RangePreset::Quarter => 90,
    }
  }

  pub fn next(&self) -> RangePreset {
    match self {
      RangePreset::Today => RangePreset::Week,
      RangePreset::Week => RangePreset::Month,
      RangePreset::Month => RangePreset::Quarter,
      RangePreset::Quarter => RangePreset::Today,
    }
  }
}

/// A headline figure with its change against the previous period
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrendKpi {
  pub value: f64,
  #[serde(default)]
  pub change: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalyticsSummary {
  pub revenue: TrendKpi,
  pub orders: TrendKpi,
  pub avg_order_value: TrendKpi,
  pub new_users: TrendKpi,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SalesTrend {
  pub dates: Vec<String>,
  pub revenue: Vec<f64>,
  pub orders: Vec<u64>,
}

/// Labelled values: revenue by category, disease counts, orders per hour.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Distribution {
  pub labels: Vec<String>,
  pub data: Vec<f64>,
}

impl Distribution {
  pub fn entries(&self) -> impl Iterator<Item = (&str, f64)> {
    self
      .labels
      .iter()
      .map(String::as_str)
      .zip(self.data.iter().copied())
  }

  pub fn max(&self) -> f64 {
    self.data.iter().copied().fold(0.0, f64::max)
  }

  /// Label of the largest value
  pub fn peak(&self) -> Option<&str> {
    self
      .entries()
      .fold(None, |best: Option<(&str, f64)>, (label, value)| match best {
        Some((_, top)) if top >= value => best,
        _ => Some((label, value)),
      })
      .map(|(label, _)| label)
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PopularFood {
  pub name: String,
  pub orders: u64,
  #[serde(default)]
  pub revenue: f64,
  /// Percent change in orders
  #[serde(default)]
  pub trend: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CategoryHeatmap {
  pub days: Vec<String>,
  pub categories: Vec<String>,
  /// `[day index, category index, orders]` cells
  pub data: Vec<(usize, usize, u64)>,
}

impl CategoryHeatmap {
  pub fn cell(&self, day: usize, category: usize) -> Option<u64> {
    self
      .data
      .iter()
      .find(|(d, c, _)| *d == day && *c == category)
      .map(|(_, _, value)| *value)
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RiskSeries {
  pub label: String,
  pub data: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RiskTrends {
  pub labels: Vec<String>,
  pub datasets: Vec<RiskSeries>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TopSpender {
  pub name: String,
  pub spent: f64,
  #[serde(default)]
  pub orders: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AiImpact {
  #[serde(default)]
  pub recommendations_served: u64,
  #[serde(default)]
  pub acceptance_rate: f64,
  #[serde(default)]
  pub health_improvement_score: f64,
  pub top_item_recommended: Option<String>,
}
