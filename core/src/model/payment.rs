// orderpay/src/model/payment.rs

use crate::model::order::{Order, PaymentStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Body of a payment initiation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
  pub order_id: String,
  pub amount: Decimal,
  pub phone: String,
  pub email: String,
  #[serde(default)]
  pub description: Option<String>,
}

/// A [`PaymentRequest`] that passed shape validation, with the phone number in
/// canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPayment {
  pub order_id: String,
  pub amount: Decimal,
  pub phone: String,
  pub email: String,
  pub description: Option<String>,
}

/// What the gateway is asked to collect.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPaymentRequest {
  pub order_id: String,
  pub amount: Decimal,
  pub phone: String,
  pub email: String,
  pub description: String,
}

/// A gateway checkout session the customer is redirected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
  pub payment_url: String,
  pub order_tracking_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
  pub token: String,
  pub expires_at: Option<DateTime<Utc>>,
}

/// The gateway's authoritative view of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionStatus {
  pub payment_status_description: String,
  pub confirmation_code: Option<String>,
  pub payment_method: Option<String>,
}

/// Gateway status text reduced to the outcomes the order understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayOutcome {
  Completed,
  Pending,
  Failed,
}

impl GatewayOutcome {
  /// `COMPLETED` and `PENDING` are recognised case-insensitively; every other
  /// value, including empty or unknown text, is a failure.
  pub fn from_description(description: &str) -> Self {
    let description = description.trim();
    if description.eq_ignore_ascii_case("COMPLETED") {
      GatewayOutcome::Completed
    } else if description.eq_ignore_ascii_case("PENDING") {
      GatewayOutcome::Pending
    } else {
      GatewayOutcome::Failed
    }
  }

  pub fn payment_status(&self) -> PaymentStatus {
    match self {
      GatewayOutcome::Completed => PaymentStatus::Paid,
      GatewayOutcome::Pending => PaymentStatus::Pending,
      GatewayOutcome::Failed => PaymentStatus::Failed,
    }
  }
}

/// Identifiers a gateway sends back on its callback. PesaPal spells them
/// `OrderTrackingId` / `OrderMerchantReference`; the camelCase names are
/// accepted too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackParams {
  #[serde(rename = "orderTrackingId", alias = "OrderTrackingId", default)]
  pub order_tracking_id: Option<String>,
  #[serde(
    rename = "merchantReference",
    alias = "OrderMerchantReference",
    alias = "orderMerchantReference",
    default
  )]
  pub merchant_reference: Option<String>,
}

impl CallbackParams {
  pub fn new(order_tracking_id: impl Into<String>, merchant_reference: impl Into<String>) -> Self {
    Self {
      order_tracking_id: Some(order_tracking_id.into()),
      merchant_reference: Some(merchant_reference.into()),
    }
  }

  /// Both identifiers, trimmed, when both are present and non-blank.
  pub fn identifiers(&self) -> Option<(String, String)> {
    let tracking = self.order_tracking_id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    let reference = self.merchant_reference.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    Some((tracking.to_string(), reference.to_string()))
  }

  /// Fills identifiers missing here from `other`.
  pub fn or(self, other: CallbackParams) -> Self {
    Self {
      order_tracking_id: self.order_tracking_id.or(other.order_tracking_id),
      merchant_reference: self.merchant_reference.or(other.merchant_reference),
    }
  }
}

/// What the callback page tells the window that opened the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackSignal {
  Success,
  Pending,
  Failed,
}

impl CallbackSignal {
  pub fn message(&self) -> &'static str {
    match self {
      CallbackSignal::Success => "payment-success",
      CallbackSignal::Pending => "payment-pending",
      CallbackSignal::Failed => "payment-failed",
    }
  }

  /// Signal matching an order's payment status after reconciliation.
  pub fn for_status(status: PaymentStatus) -> Self {
    match status {
      PaymentStatus::Paid => CallbackSignal::Success,
      PaymentStatus::Pending | PaymentStatus::Processing => CallbackSignal::Pending,
      PaymentStatus::Failed | PaymentStatus::Cancelled => CallbackSignal::Failed,
    }
  }
}

/// Payload of the payment status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusView {
  pub order_id: String,
  pub payment_status: PaymentStatus,
  pub transaction_status: Option<String>,
  pub payment_tracking_id: Option<String>,
  #[serde(with = "rust_decimal::serde::float")]
  pub total_amount: Decimal,
  pub payment_initiated_at: Option<DateTime<Utc>>,
  pub paid_at: Option<DateTime<Utc>>,
  pub payment_failed_at: Option<DateTime<Utc>>,
  pub updated_at: DateTime<Utc>,
}

impl From<&Order> for PaymentStatusView {
  fn from(order: &Order) -> Self {
    Self {
      order_id: order.order_number.clone(),
      payment_status: order.payment_status,
      transaction_status: order.transaction_status.clone(),
      payment_tracking_id: order.payment_tracking_id.clone(),
      total_amount: order.total_amount,
      payment_initiated_at: order.payment_initiated_at,
      paid_at: order.paid_at,
      payment_failed_at: order.payment_failed_at,
      updated_at: order.updated_at,
    }
  }
}
