// orderpay/src/store/memory.rs

use crate::model::{Order, OrderPatch, PaymentStatus};
use crate::ports::{AttemptUpdate, ConditionalUpdate, OrderStore};
use anyhow::bail;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Process-local order store. Writes hold the write guard for the whole
/// check-and-apply, so conditional updates are atomic with respect to every
/// other call.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
  orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
    let store = Self::new();
    {
      let mut guard = store.orders.write();
      for order in orders {
        guard.insert(order.order_number.clone(), order);
      }
    }
    store
  }

  pub fn len(&self) -> usize {
    self.orders.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.orders.read().is_empty()
  }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
  #[instrument(skip(self, order), fields(order_id = %order.order_number))]
  async fn insert(&self, order: Order) -> anyhow::Result<()> {
    let mut guard = self.orders.write();
    if guard.contains_key(&order.order_number) {
      bail!("order {} already exists", order.order_number);
    }
    guard.insert(order.order_number.clone(), order);
    Ok(())
  }

  async fn find_by_public_id(&self, order_id: &str) -> anyhow::Result<Option<Order>> {
    Ok(self.orders.read().get(order_id).cloned())
  }

  #[instrument(skip(self, patch))]
  async fn update_by_public_id(&self, order_id: &str, patch: OrderPatch) -> anyhow::Result<Option<Order>> {
    let mut guard = self.orders.write();
    Ok(guard.get_mut(order_id).map(|order| {
      order.apply(patch, Utc::now());
      order.clone()
    }))
  }

  #[instrument(skip(self, patch))]
  async fn update_if_payment_status(
    &self,
    order_id: &str,
    expected: &[PaymentStatus],
    patch: OrderPatch,
  ) -> anyhow::Result<ConditionalUpdate> {
    let mut guard = self.orders.write();
    let Some(order) = guard.get_mut(order_id) else {
      return Ok(ConditionalUpdate::NotFound);
    };
    if !expected.contains(&order.payment_status) {
      debug!(current = %order.payment_status, "conditional update skipped");
      return Ok(ConditionalUpdate::StatusMismatch(order.payment_status));
    }
    order.apply(patch, Utc::now());
    Ok(ConditionalUpdate::Applied(order.clone()))
  }

  #[instrument(skip(self, patch))]
  async fn update_if_current_attempt(
    &self,
    order_id: &str,
    tracking_id: &str,
    expected: &[PaymentStatus],
    patch: OrderPatch,
  ) -> anyhow::Result<AttemptUpdate> {
    let mut guard = self.orders.write();
    let Some(order) = guard.get_mut(order_id) else {
      return Ok(AttemptUpdate::NotFound);
    };
    if order.payment_tracking_id.as_deref() != Some(tracking_id) {
      debug!(current = ?order.payment_tracking_id, "attempt update skipped");
      return Ok(AttemptUpdate::Superseded(order.payment_tracking_id.clone()));
    }
    if !expected.contains(&order.payment_status) {
      debug!(current = %order.payment_status, "attempt update skipped");
      return Ok(AttemptUpdate::StatusMismatch(order.payment_status));
    }
    order.apply(patch, Utc::now());
    Ok(AttemptUpdate::Applied(order.clone()))
  }
}
