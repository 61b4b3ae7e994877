//! `DataSource` implementations binding each admin page to its endpoints.

use async_trait::async_trait;

use crate::api::client::AdminClient;
use crate::api::types::{
  AiLog, AuditLog, FoodItem, FoodPatch, InventoryItem, InventoryPatch, Order, OrderPatch, User,
  UserPatch,
};
use crate::list::{DataSource, ListError, ListResult, Page, QueryParams};

#[async_trait]
impl DataSource<Order> for AdminClient {
  async fn fetch_list(&self, params: &QueryParams) -> ListResult<Page<Order>> {
    self.list("orders/", params).await
  }

  async fn mutate(&self, id: &u64, patch: &OrderPatch) -> ListResult<Option<OrderPatch>> {
    let status = self.update_order_status(*id, patch.status).await?;
    Ok(Some(OrderPatch { status }))
  }
}

#[async_trait]
impl DataSource<User> for AdminClient {
  async fn fetch_list(&self, params: &QueryParams) -> ListResult<Page<User>> {
    self.list("users/", params).await
  }

  async fn mutate(&self, id: &u64, patch: &UserPatch) -> ListResult<Option<UserPatch>> {
    let canonical = match patch {
      UserPatch::Role(role) => UserPatch::Role(self.set_user_role(*id, *role).await?),
      UserPatch::Disabled(disabled) => {
        UserPatch::Disabled(self.set_user_disabled(*id, *disabled).await?)
      }
    };
    Ok(Some(canonical))
  }
}

#[async_trait]
impl DataSource<FoodItem> for AdminClient {
  async fn fetch_list(&self, params: &QueryParams) -> ListResult<Page<FoodItem>> {
    self.list("foods/", params).await
  }

  /// The endpoint is a toggle; the local patch is only the guess and the
  /// server's value wins.
  async fn mutate(&self, id: &u64, _patch: &FoodPatch) -> ListResult<Option<FoodPatch>> {
    let is_available = self.toggle_food_availability(*id).await?;
    Ok(Some(FoodPatch { is_available }))
  }
}

#[async_trait]
impl DataSource<InventoryItem> for AdminClient {
  async fn fetch_list(&self, params: &QueryParams) -> ListResult<Page<InventoryItem>> {
    self.list("inventory/", params).await
  }

  async fn mutate(&self, id: &u64, patch: &InventoryPatch) -> ListResult<Option<InventoryPatch>> {
    self.update_inventory(*id, patch).await.map(Some)
  }
}

#[async_trait]
impl DataSource<AuditLog> for AdminClient {
  async fn fetch_list(&self, params: &QueryParams) -> ListResult<Page<AuditLog>> {
    self.list("audit/", params).await
  }

  async fn mutate(&self, _id: &u64, _patch: &()) -> ListResult<Option<()>> {
    Err(ListError::validation("audit logs are read-only"))
  }
}

#[async_trait]
impl DataSource<AiLog> for AdminClient {
  async fn fetch_list(&self, params: &QueryParams) -> ListResult<Page<AiLog>> {
    self.list("ai/logs", params).await
  }

  async fn mutate(&self, _id: &String, _patch: &()) -> ListResult<Option<()>> {
    Err(ListError::validation("recommendation logs are read-only"))
  }
}
