// orderpay/src/payments/status.rs

use crate::error::{PaymentError, PaymentResult};
use crate::model::PaymentStatusView;
use crate::ports::OrderStore;
use tracing::instrument;

/// Current payment state of an order. Read-only.
#[instrument(skip(store))]
pub async fn payment_status(store: &dyn OrderStore, order_id: &str) -> PaymentResult<PaymentStatusView> {
  let order_id = order_id.trim();
  if order_id.is_empty() {
    return Err(PaymentError::validation("orderId", "Order ID is required."));
  }

  store
    .find_by_public_id(order_id)
    .await
    .map_err(PaymentError::store)?
    .map(|order| PaymentStatusView::from(&order))
    .ok_or_else(|| PaymentError::NotFound(order_id.to_string()))
}
