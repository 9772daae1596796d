// orderpay/src/model/order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payment side of an order. See [`PaymentStatus::can_initiate`] and
/// [`PaymentStatus::is_terminal`] for the allowed transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
  Pending,
  Processing,
  Paid,
  Failed,
  Cancelled,
}

impl PaymentStatus {
  /// States from which a new payment attempt may start.
  pub const INITIABLE: [PaymentStatus; 2] = [PaymentStatus::Pending, PaymentStatus::Failed];

  /// States a gateway callback is allowed to move.
  pub const RECONCILABLE: [PaymentStatus; 3] = [PaymentStatus::Pending, PaymentStatus::Processing, PaymentStatus::Failed];

  pub fn as_str(&self) -> &'static str {
    match self {
      PaymentStatus::Pending => "pending",
      PaymentStatus::Processing => "processing",
      PaymentStatus::Paid => "paid",
      PaymentStatus::Failed => "failed",
      PaymentStatus::Cancelled => "cancelled",
    }
  }

  pub fn can_initiate(&self) -> bool {
    Self::INITIABLE.contains(self)
  }

  /// Gateway events never move an order out of a terminal state.
  pub fn is_terminal(&self) -> bool {
    matches!(self, PaymentStatus::Paid | PaymentStatus::Cancelled)
  }
}

impl fmt::Display for PaymentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PaymentStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(PaymentStatus::Pending),
      "processing" => Ok(PaymentStatus::Processing),
      "paid" => Ok(PaymentStatus::Paid),
      "failed" => Ok(PaymentStatus::Failed),
      "cancelled" => Ok(PaymentStatus::Cancelled),
      other => Err(format!("unknown payment status '{other}'")),
    }
  }
}

/// Fulfilment side of an order, advanced by staff rather than payment events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Confirmed,
  Processing,
  Shipped,
  Delivered,
  Cancelled,
}

impl OrderStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Confirmed => "confirmed",
      OrderStatus::Processing => "processing",
      OrderStatus::Shipped => "shipped",
      OrderStatus::Delivered => "delivered",
      OrderStatus::Cancelled => "cancelled",
    }
  }
}

impl FromStr for OrderStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(OrderStatus::Pending),
      "confirmed" => Ok(OrderStatus::Confirmed),
      "processing" => Ok(OrderStatus::Processing),
      "shipped" => Ok(OrderStatus::Shipped),
      "delivered" => Ok(OrderStatus::Delivered),
      "cancelled" => Ok(OrderStatus::Cancelled),
      other => Err(format!("unknown order status '{other}'")),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
  Mpesa,
  Airtel,
  Card,
  Bank,
  Paypal,
  Pesapal,
}

impl PaymentMethod {
  pub fn as_str(&self) -> &'static str {
    match self {
      PaymentMethod::Mpesa => "mpesa",
      PaymentMethod::Airtel => "airtel",
      PaymentMethod::Card => "card",
      PaymentMethod::Bank => "bank",
      PaymentMethod::Paypal => "paypal",
      PaymentMethod::Pesapal => "pesapal",
    }
  }
}

impl FromStr for PaymentMethod {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "mpesa" => Ok(PaymentMethod::Mpesa),
      "airtel" => Ok(PaymentMethod::Airtel),
      "card" => Ok(PaymentMethod::Card),
      "bank" => Ok(PaymentMethod::Bank),
      "paypal" => Ok(PaymentMethod::Paypal),
      "pesapal" => Ok(PaymentMethod::Pesapal),
      other => Err(format!("unknown payment method '{other}'")),
    }
  }
}

/// One `orderStatus` change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
  pub status: OrderStatus,
  pub note: String,
  pub at: DateTime<Utc>,
}

/// Audit record. Entries are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
  pub action: String,
  pub message: String,
  pub at: DateTime<Utc>,
}

impl ActivityEntry {
  pub fn new(action: &str, message: impl Into<String>, at: DateTime<Utc>) -> Self {
    Self {
      action: action.to_string(),
      message: message.into(),
      at,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  /// Public identifier, immutable.
  pub order_number: String,
  #[serde(with = "rust_decimal::serde::float")]
  pub total_amount: Decimal,
  pub payment_method: PaymentMethod,
  pub payment_status: PaymentStatus,
  pub payment_tracking_id: Option<String>,
  /// Raw status text last reported by the gateway.
  pub transaction_status: Option<String>,
  pub payment_error: Option<String>,
  pub payment_initiated_at: Option<DateTime<Utc>>,
  pub paid_at: Option<DateTime<Utc>>,
  pub payment_failed_at: Option<DateTime<Utc>>,
  pub customer_email: Option<String>,
  pub customer_phone: Option<String>,
  pub order_status: OrderStatus,
  pub timeline: Vec<TimelineEntry>,
  pub activity_log: Vec<ActivityEntry>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Order {
  /// A freshly placed order, awaiting payment.
  pub fn place(order_number: impl Into<String>, total_amount: Decimal, payment_method: PaymentMethod, now: DateTime<Utc>) -> Self {
    let order_number = order_number.into();
    Self {
      timeline: vec![TimelineEntry {
        status: OrderStatus::Pending,
        note: "Order placed".to_string(),
        at: now,
      }],
      activity_log: vec![ActivityEntry::new(
        "order_placed",
        format!("Order {order_number} placed for {total_amount}"),
        now,
      )],
      order_number,
      total_amount,
      payment_method,
      payment_status: PaymentStatus::Pending,
      payment_tracking_id: None,
      transaction_status: None,
      payment_error: None,
      payment_initiated_at: None,
      paid_at: None,
      payment_failed_at: None,
      customer_email: None,
      customer_phone: None,
      order_status: OrderStatus::Pending,
      created_at: now,
      updated_at: now,
    }
  }

  /// Applies `patch` in place. Identity, amount and history are never rewritten;
  /// activity entries in the patch are appended.
  pub fn apply(&mut self, patch: OrderPatch, now: DateTime<Utc>) {
    let OrderPatch {
      payment_status,
      payment_tracking_id,
      transaction_status,
      payment_error,
      payment_initiated_at,
      paid_at,
      payment_failed_at,
      customer_email,
      customer_phone,
      activity,
    } = patch;

    if let Some(status) = payment_status {
      self.payment_status = status;
    }
    if let Some(id) = payment_tracking_id {
      self.payment_tracking_id = id;
    }
    if let Some(raw) = transaction_status {
      self.transaction_status = Some(raw);
    }
    if let Some(error) = payment_error {
      self.payment_error = error;
    }
    if let Some(at) = payment_initiated_at {
      self.payment_initiated_at = Some(at);
    }
    if let Some(at) = paid_at {
      self.paid_at = Some(at);
    }
    if let Some(at) = payment_failed_at {
      self.payment_failed_at = Some(at);
    }
    if let Some(email) = customer_email {
      self.customer_email = Some(email);
    }
    if let Some(phone) = customer_phone {
      self.customer_phone = Some(phone);
    }
    self.activity_log.extend(activity);
    self.updated_at = now;
  }
}

/// Partial update of an order's payment fields. `None` leaves a field alone;
/// `Some(None)` on `payment_tracking_id` or `payment_error` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPatch {
  pub payment_status: Option<PaymentStatus>,
  pub payment_tracking_id: Option<Option<String>>,
  pub transaction_status: Option<String>,
  pub payment_error: Option<Option<String>>,
  pub payment_initiated_at: Option<DateTime<Utc>>,
  pub paid_at: Option<DateTime<Utc>>,
  pub payment_failed_at: Option<DateTime<Utc>>,
  pub customer_email: Option<String>,
  pub customer_phone: Option<String>,
  pub activity: Vec<ActivityEntry>,
}

impl OrderPatch {
  pub fn with_activity(mut self, entry: ActivityEntry) -> Self {
    self.activity.push(entry);
    self
  }
}
