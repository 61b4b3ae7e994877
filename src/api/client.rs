use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::api::api_types::{
  ApiAvailability, ApiErrorBody, ApiOrderStatus, ApiPage, ApiRetrain, ApiUserRole, ApiUserStatus,
  OrderStatusBody, UserRoleBody, UserStatusBody,
};
use crate::api::types::{
  AiImpact, AiStatus, AnalyticsSummary, AuditSummary, CategoryHeatmap, Distribution, HourlyOrders,
  InventoryPatch, OrderStatus, Overview, PopularFood, RetrainAck, RiskAlert, RiskTrends, Role,
  SalesTrend, TopSpender,
};
use crate::config::Config;
use crate::list::{ListError, ListResult, Page, QueryParams};

/// HealthBite admin API client
#[derive(Clone)]
pub struct AdminClient {
  http: reqwest::Client,
  /// `{api.url}/api/admin/`, always with a trailing slash
  base: Url,
  token: String,
}

impl AdminClient {
  pub fn new(config: &Config) -> color_eyre::Result<Self> {
    let token = Config::get_api_token()?;
    Self::with_token(&config.api.url, token, config.request_timeout())
  }

  pub fn with_token(
    url: &str,
    token: impl Into<String>,
    timeout: Duration,
  ) -> color_eyre::Result<Self> {
    let base = Url::parse(&format!("{}/api/admin/", url.trim_end_matches('/')))
      .map_err(|e| color_eyre::eyre::eyre!("Invalid API url {}: {}", url, e))?;

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| color_eyre::eyre::eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      token: token.into(),
    })
  }

  fn endpoint(&self, path: &str, params: Option<&QueryParams>) -> ListResult<Url> {
    let mut url = self
      .base
      .join(path)
      .map_err(|e| ListError::validation(format!("bad endpoint {}: {}", path, e)))?;
    if let Some(params) = params.filter(|p| !p.is_empty()) {
      url.set_query(Some(&params.to_query_string()));
    }
    Ok(url)
  }

  async fn request<B, R>(
    &self,
    method: Method,
    path: &str,
    params: Option<&QueryParams>,
    body: Option<&B>,
  ) -> ListResult<R>
  where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
  {
    let url = self.endpoint(path, params)?;
    debug!(%method, %url, "admin api request");

    let mut request = self
      .http
      .request(method, url)
      .bearer_auth(&self.token);
    if let Some(body) = body {
      request = request.json(body);
    }

    let response = request.send().await?;
    Self::decode(response).await
  }

  /// Map a response to its payload or to a `ListError`.
  async fn decode<R: DeserializeOwned>(response: Response) -> ListResult<R> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
      let message = serde_json::from_str::<ApiErrorBody>(&text)
        .ok()
        .and_then(|body| body.message())
        .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
      warn!(status = status.as_u16(), %message, "admin api error");
      return Err(ListError::server(status.as_u16(), message));
    }

    let text = if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
      "null"
    } else {
      text.as_str()
    };
    serde_json::from_str(text).map_err(|e| {
      warn!(error = %e, "undecodable admin api response");
      ListError::server(status.as_u16(), "invalid JSON response")
    })
  }

  async fn get<R: DeserializeOwned>(&self, path: &str, params: Option<&QueryParams>) -> ListResult<R> {
    self
      .request::<(), R>(Method::GET, path, params, None)
      .await
  }

  /// Fetch one page of a paginated list endpoint.
  pub async fn list<T: DeserializeOwned>(&self, path: &str, params: &QueryParams) -> ListResult<Page<T>> {
    let page: ApiPage<T> = self.get(path, Some(params)).await?;
    Ok(page.into())
  }

  // ---------------------------------------------------------------------
  // Mutations
  // ---------------------------------------------------------------------

  /// Set an order's status, returning the status the server stored.
  pub async fn update_order_status(&self, id: u64, status: OrderStatus) -> ListResult<OrderStatus> {
    let response: ApiOrderStatus = self
      .request(
        Method::PATCH,
        &format!("orders/{}/status", id),
        None,
        Some(&OrderStatusBody { status }),
      )
      .await?;
    debug!(id = response.id, status = %response.status, "order status updated");
    Ok(response.status)
  }

  pub async fn set_user_role(&self, id: u64, role: Role) -> ListResult<Role> {
    let response: ApiUserRole = self
      .request(
        Method::PATCH,
        &format!("users/{}/role", id),
        None,
        Some(&UserRoleBody { role }),
      )
      .await?;
    debug!(id = response.id, role = %response.role, "user role updated");
    Ok(response.role)
  }

  pub async fn set_user_disabled(&self, id: u64, disabled: bool) -> ListResult<bool> {
    let response: ApiUserStatus = self
      .request(
        Method::PATCH,
        &format!("users/{}/status", id),
        None,
        Some(&UserStatusBody {
          disabled: u8::from(disabled),
        }),
      )
      .await?;
    debug!(id = response.id, disabled = response.disabled, "user status updated");
    Ok(response.disabled != 0)
  }

  /// Flip a food item's availability. The server toggles whatever it has
  /// stored and returns the result.
  pub async fn toggle_food_availability(&self, id: u64) -> ListResult<bool> {
    let response: ApiAvailability = self
      .request::<(), _>(
        Method::PATCH,
        &format!("foods/{}/availability", id),
        None,
        None,
      )
      .await?;
    debug!(id = response.id, available = response.is_available, "availability toggled");
    Ok(response.is_available)
  }

  /// Update stock levels, returning the canonical values.
  pub async fn update_inventory(&self, id: u64, patch: &InventoryPatch) -> ListResult<InventoryPatch> {
    self
      .request(Method::PUT, &format!("inventory/{}", id), None, Some(patch))
      .await
  }

  // ---------------------------------------------------------------------
  // Dashboard panels
  // ---------------------------------------------------------------------

  pub async fn overview(&self) -> ListResult<Overview> {
    self.get("overview", None).await
  }

  pub async fn alerts(&self) -> ListResult<Vec<RiskAlert>> {
    let alerts: Option<Vec<RiskAlert>> = self.get("alerts", None).await?;
    Ok(alerts.unwrap_or_default())
  }

  pub async fn orders_by_hour(&self) -> ListResult<HourlyOrders> {
    self.get("analytics/orders-by-hour-today", None).await
  }

  pub async fn audit_summary(&self) -> ListResult<AuditSummary> {
    self.get("audit/summary", None).await
  }

  // ---------------------------------------------------------------------
  // AI monitor
  // ---------------------------------------------------------------------

  pub async fn ai_status(&self) -> ListResult<AiStatus> {
    self.get("ai/status", None).await
  }

  /// Start a model retrain. Refused while one is already running.
  pub async fn retrain_model(&self) -> ListResult<RetrainAck> {
    let response: ApiRetrain = self
      .request::<(), _>(Method::POST, "ai/retrain", None, None)
      .await?;
    if let Some(error) = response.error {
      warn!(%error, "retrain refused");
      return Err(ListError::server(StatusCode::ACCEPTED.as_u16(), error));
    }
    debug!(training_id = ?response.training_id, "retrain started");
    Ok(RetrainAck {
      message: response.message,
      training_id: response.training_id,
    })
  }

  // ---------------------------------------------------------------------
  // Analytics panels, all scoped by the same date-range parameters
  // ---------------------------------------------------------------------

  pub async fn analytics_summary(&self, params: &QueryParams) -> ListResult<AnalyticsSummary> {
    self.get("analytics/summary", Some(params)).await
  }

  pub async fn sales_trend(&self, params: &QueryParams) -> ListResult<SalesTrend> {
    self.get("analytics/sales", Some(params)).await
  }

  pub async fn revenue_by_category(&self, params: &QueryParams) -> ListResult<Distribution> {
    self.get("analytics/revenue-by-category", Some(params)).await
  }

  pub async fn popular_foods(&self, params: &QueryParams) -> ListResult<Vec<PopularFood>> {
    self.get("analytics/popular-foods", Some(params)).await
  }

  pub async fn category_heatmap(&self, params: &QueryParams) -> ListResult<CategoryHeatmap> {
    self.get("analytics/category-heatmap", Some(params)).await
  }

  pub async fn disease_distribution(&self, params: &QueryParams) -> ListResult<Distribution> {
    self.get("analytics/disease-distribution", Some(params)).await
  }

  pub async fn risk_trends(&self, params: &QueryParams) -> ListResult<RiskTrends> {
    self.get("analytics/risk-trends", Some(params)).await
  }

  pub async fn peak_hours(&self, params: &QueryParams) -> ListResult<Distribution> {
    self.get("analytics/peak-hours", Some(params)).await
  }

  pub async fn top_spenders(&self, params: &QueryParams) -> ListResult<Vec<TopSpender>> {
    self.get("analytics/top-spenders", Some(params)).await
  }

  pub async fn ai_impact(&self, params: &QueryParams) -> ListResult<AiImpact> {
    self.get("analytics/ai-impact", Some(params)).await
  }
}

impl std::fmt::Debug for AdminClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AdminClient")
      .field("base", &self.base.as_str())
      .finish_non_exhaustive()
  }
}
