// orderpay/src/ports.rs

//! Collaborators the payment flows depend on. The service crate provides the
//! production implementations (PostgreSQL store, PesaPal client, e-mail
//! notifier); [`crate::store::InMemoryOrderStore`] and [`NoopNotifier`] live here.

use crate::error::GatewayError;
use crate::model::{
  AccessToken, GatewayPaymentRequest, Order, OrderPatch, PaymentSession, PaymentStatus, TransactionStatus,
};
use async_trait::async_trait;

/// A payment gateway. Network retries and timeouts are the implementation's
/// business; each call either returns or fails with a classified error.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
  /// Short name for logs and audit entries, e.g. `"pesapal"`.
  fn name(&self) -> &'static str;

  /// Opens a checkout session for `request`.
  async fn initiate(&self, request: &GatewayPaymentRequest) -> Result<PaymentSession, GatewayError>;

  async fn access_token(&self) -> Result<AccessToken, GatewayError>;

  async fn transaction_status(
    &self,
    order_tracking_id: &str,
    token: &AccessToken,
  ) -> Result<TransactionStatus, GatewayError>;
}

/// Result of [`OrderStore::update_if_payment_status`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionalUpdate {
  /// The patch was applied; carries the order as stored afterwards.
  Applied(Order),
  /// The order exists but its payment status was not one of the expected ones.
  StatusMismatch(PaymentStatus),
  NotFound,
}

/// Result of [`OrderStore::update_if_current_attempt`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptUpdate {
  Applied(Order),
  /// The order is on a different payment attempt; carries its tracking id,
  /// `None` while a new attempt is opening.
  Superseded(Option<String>),
  /// Same attempt, but the payment status was not one of the expected ones.
  StatusMismatch(PaymentStatus),
  NotFound,
}

/// Persistence for orders, addressed by their public identifier.
///
/// Implementations must apply each call as a single atomic write per order.
#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Fails if an order with the same public identifier already exists.
  async fn insert(&self, order: Order) -> anyhow::Result<()>;

  async fn find_by_public_id(&self, order_id: &str) -> anyhow::Result<Option<Order>>;

  /// Applies `patch` unconditionally. `Ok(None)` if the order does not exist.
  async fn update_by_public_id(&self, order_id: &str, patch: OrderPatch) -> anyhow::Result<Option<Order>>;

  /// Applies `patch` only while the order's payment status is one of `expected`.
  /// The check and the write happen atomically.
  async fn update_if_payment_status(
    &self,
    order_id: &str,
    expected: &[PaymentStatus],
    patch: OrderPatch,
  ) -> anyhow::Result<ConditionalUpdate>;

  /// Applies `patch` only while the order's recorded tracking id is
  /// `tracking_id` and its payment status is one of `expected`. Both checks
  /// and the write happen atomically.
  async fn update_if_current_attempt(
    &self,
    order_id: &str,
    tracking_id: &str,
    expected: &[PaymentStatus],
    patch: OrderPatch,
  ) -> anyhow::Result<AttemptUpdate>;
}

/// Told about payment outcomes, e.g. to e-mail the customer.
#[async_trait]
pub trait PaymentNotifier: Send + Sync {
  async fn payment_confirmed(&self, order: &Order) -> anyhow::Result<()>;

  async fn payment_failed(&self, order: &Order) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl PaymentNotifier for NoopNotifier {
  async fn payment_confirmed(&self, _order: &Order) -> anyhow::Result<()> {
    Ok(())
  }

  async fn payment_failed(&self, _order: &Order) -> anyhow::Result<()> {
    Ok(())
  }
}
