//! Serde types matching the admin API's envelopes and mutation payloads.
//!
//! Row types deserialize straight into the domain types in `types`; these
//! cover the wrappers around them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::types::{OrderStatus, Role};
use crate::list::Page;

// ============================================================================
// List envelope
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiPage<T> {
  #[serde(default)]
  pub total: u64,
  #[serde(default = "first_page")]
  pub page: u32,
  /// Zero when the list is empty
  #[serde(default)]
  pub pages: u32,
  /// The AI monitor names this `logs`
  #[serde(default = "Vec::new", alias = "logs")]
  pub items: Vec<T>,
}

fn first_page() -> u32 {
  1
}

impl<T> From<ApiPage<T>> for Page<T> {
  fn from(api: ApiPage<T>) -> Self {
    Page {
      items: api.items,
      total: api.total,
      page: api.page.max(1),
      page_count: api.pages.max(1),
    }
  }
}

// ============================================================================
// Error body
// ============================================================================

/// Error payload. Depending on the route the text is under `detail`,
/// `error` or `message`; request validation errors put a list in `detail`.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
  pub detail: Option<Value>,
  pub error: Option<String>,
  pub message: Option<String>,
}

impl ApiErrorBody {
  pub fn message(&self) -> Option<String> {
    let detail = self.detail.as_ref().and_then(|d| match d {
      Value::String(s) => Some(s.clone()),
      Value::Array(errors) => errors
        .iter()
        .filter_map(|e| e.get("msg").and_then(Value::as_str))
        .next()
        .map(str::to_string),
      Value::Null => None,
      other => Some(other.to_string()),
    });
    detail
      .or_else(|| self.error.clone())
      .or_else(|| self.message.clone())
      .filter(|m| !m.trim().is_empty())
  }
}

// ============================================================================
// Mutation requests
// ============================================================================

#[derive(Debug, Serialize)]
pub struct OrderStatusBody {
  pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
pub struct UserRoleBody {
  pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct UserStatusBody {
  /// The backend stores this flag as 0/1
  pub disabled: u8,
}

// ============================================================================
// Mutation responses
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiOrderStatus {
  pub id: u64,
  pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct ApiUserRole {
  pub id: u64,
  pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct ApiUserStatus {
  pub id: u64,
  pub disabled: i64,
}

#[derive(Debug, Deserialize)]
pub struct ApiAvailability {
  pub id: u64,
  pub is_available: bool,
}

/// The retrain endpoint answers 202 even when it refuses, putting the
/// reason in `error`.
#[derive(Debug, Deserialize)]
pub struct ApiRetrain {
  pub message: Option<String>,
  pub training_id: Option<u64>,
  pub error: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_empty_page_has_one_page() {
    let api: ApiPage<u64> =
      serde_json::from_value(json!({"total": 0, "page": 1, "pages": 0, "items": []})).unwrap();
    let page: Page<u64> = api.into();
    assert_eq!(page.page_count, 1);
    assert!(page.items.is_empty());
  }

  #[test]
  fn test_logs_envelope() {
    let api: ApiPage<u64> =
      serde_json::from_value(json!({"total": 120, "page": 2, "pages": 6, "logs": [7, 8]}))
        .unwrap();
    let page: Page<u64> = api.into();
    assert_eq!(page.items, vec![7, 8]);
    assert_eq!(page.page_count, 6);
  }

  #[test]
  fn test_error_body_message_sources() {
    let body: ApiErrorBody = serde_json::from_value(json!({"detail": "Order not found"})).unwrap();
    assert_eq!(body.message().as_deref(), Some("Order not found"));

    let body: ApiErrorBody = serde_json::from_value(json!({
      "detail": [{"loc": ["body", "status"], "msg": "field required", "type": "missing"}]
    }))
    .unwrap();
    assert_eq!(body.message().as_deref(), Some("field required"));

    let body: ApiErrorBody = serde_json::from_value(json!({"error": "boom"})).unwrap();
    assert_eq!(body.message().as_deref(), Some("boom"));

    let body: ApiErrorBody = serde_json::from_value(json!({"message": "  "})).unwrap();
    assert_eq!(body.message(), None);
  }
}
