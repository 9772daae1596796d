// orderpay/src/error.rs
use crate::flow::FlowError;
use crate::model::PaymentStatus;
use anyhow::Error as AnyhowError;
use std::fmt;
use thiserror::Error;

/// Failures a payment gateway client can report. Clients classify transport
/// errors, HTTP statuses and provider error codes into these variants; callers
/// branch on the variant, never on the message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
  #[error("gateway request timed out: {0}")]
  Timeout(String),

  #[error("gateway unreachable: {0}")]
  Unreachable(String),

  #[error("gateway rejected merchant credentials: {0}")]
  InvalidCredentials(String),

  #[error("amount exceeds gateway limit: {0}")]
  AmountLimitExceeded(String),

  #[error("gateway rejected the request: {0}")]
  Rejected(String),

  #[error("unexpected gateway failure: {0}")]
  Unknown(String),
}

impl GatewayError {
  pub fn kind(&self) -> &'static str {
    match self {
      GatewayError::Timeout(_) => "timeout",
      GatewayError::Unreachable(_) => "unreachable",
      GatewayError::InvalidCredentials(_) => "invalid_credentials",
      GatewayError::AmountLimitExceeded(_) => "amount_limit_exceeded",
      GatewayError::Rejected(_) => "rejected",
      GatewayError::Unknown(_) => "unknown",
    }
  }

  pub fn status_code(&self) -> u16 {
    match self {
      GatewayError::Timeout(_) => 504,
      GatewayError::Unreachable(_) => 503,
      GatewayError::InvalidCredentials(_) | GatewayError::Rejected(_) => 500,
      GatewayError::AmountLimitExceeded(_) => 400,
      GatewayError::Unknown(_) => 500,
    }
  }

  pub fn user_message(&self) -> &'static str {
    match self {
      GatewayError::Timeout(_) => "The payment service took too long to respond. Please try again.",
      GatewayError::Unreachable(_) => "The payment service is currently unavailable. Please try again later.",
      GatewayError::InvalidCredentials(_) | GatewayError::Rejected(_) => {
        "Payment could not be started due to a configuration problem. Please contact support."
      }
      GatewayError::AmountLimitExceeded(_) => "The amount exceeds the limit allowed for this payment method.",
      GatewayError::Unknown(_) => "Payment could not be started. Please try again later.",
    }
  }
}

/// Why a payment attempt was refused without contacting the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
  AlreadyPaid,
  AlreadyProcessing,
  NotPayable(PaymentStatus),
  /// A callback for an attempt that is no longer the order's current one.
  StaleAttempt,
}

impl ConflictReason {
  pub fn for_status(status: PaymentStatus) -> Self {
    match status {
      PaymentStatus::Paid => ConflictReason::AlreadyPaid,
      PaymentStatus::Processing => ConflictReason::AlreadyProcessing,
      other => ConflictReason::NotPayable(other),
    }
  }
}

impl fmt::Display for ConflictReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConflictReason::AlreadyPaid => f.write_str("already paid"),
      ConflictReason::AlreadyProcessing => f.write_str("already processing"),
      ConflictReason::NotPayable(status) => write!(f, "order is {status}"),
      ConflictReason::StaleAttempt => f.write_str("tracking id does not match the current payment attempt"),
    }
  }
}

#[derive(Debug, Error)]
pub enum PaymentError {
  #[error("invalid {field}: {message}")]
  Validation { field: &'static str, message: String },

  #[error("order not found: {0}")]
  NotFound(String),

  #[error("payment conflict: {0}")]
  Conflict(ConflictReason),

  #[error(transparent)]
  Gateway(#[from] GatewayError),

  #[error("order store failure: {source}")]
  Store {
    #[source]
    source: AnyhowError,
  },

  #[error("flow error: {0}")]
  Flow(#[from] FlowError),

  #[error("unexpected payment failure: {0}")]
  Unknown(String),
}

impl PaymentError {
  pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
    PaymentError::Validation {
      field,
      message: message.into(),
    }
  }

  pub fn store(source: AnyhowError) -> Self {
    PaymentError::Store { source }
  }

  /// HTTP-equivalent status.
  pub fn status_code(&self) -> u16 {
    match self {
      PaymentError::Validation { .. } => 400,
      PaymentError::NotFound(_) => 404,
      PaymentError::Conflict(_) => 409,
      PaymentError::Gateway(e) => e.status_code(),
      PaymentError::Store { .. } | PaymentError::Flow(_) | PaymentError::Unknown(_) => 500,
    }
  }

  /// Stable machine-readable code.
  pub fn code(&self) -> &'static str {
    match self {
      PaymentError::Validation { .. } => "validation_error",
      PaymentError::NotFound(_) => "not_found",
      PaymentError::Conflict(ConflictReason::AlreadyPaid) => "already_paid",
      PaymentError::Conflict(ConflictReason::AlreadyProcessing) => "already_processing",
      PaymentError::Conflict(_) => "conflict",
      PaymentError::Gateway(e) => match e {
        GatewayError::Timeout(_) => "gateway_timeout",
        GatewayError::Unreachable(_) => "gateway_unreachable",
        GatewayError::InvalidCredentials(_) => "gateway_credentials",
        GatewayError::AmountLimitExceeded(_) => "amount_limit_exceeded",
        GatewayError::Rejected(_) => "gateway_rejected",
        GatewayError::Unknown(_) => "unknown_error",
      },
      PaymentError::Store { .. } | PaymentError::Flow(_) | PaymentError::Unknown(_) => "unknown_error",
    }
  }

  /// Message safe to show to a customer.
  pub fn user_message(&self) -> String {
    match self {
      PaymentError::Validation { message, .. } => message.clone(),
      PaymentError::NotFound(_) => "Order not found.".to_string(),
      PaymentError::Conflict(ConflictReason::AlreadyPaid) => "This order has already been paid.".to_string(),
      PaymentError::Conflict(ConflictReason::AlreadyProcessing) => {
        "A payment for this order is already in progress.".to_string()
      }
      PaymentError::Conflict(reason) => format!("Payment cannot be started: {reason}."),
      PaymentError::Gateway(e) => e.user_message().to_string(),
      PaymentError::Store { .. } | PaymentError::Flow(_) | PaymentError::Unknown(_) => {
        "Something went wrong while processing the payment. Please try again later.".to_string()
      }
    }
  }

  /// The offending input field, for validation errors.
  pub fn field(&self) -> Option<&'static str> {
    match self {
      PaymentError::Validation { field, .. } => Some(*field),
      _ => None,
    }
  }
}

pub type PaymentResult<T, E = PaymentError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gateway_errors_map_to_http_statuses() {
    assert_eq!(PaymentError::from(GatewayError::Timeout("t".into())).status_code(), 504);
    assert_eq!(PaymentError::from(GatewayError::Unreachable("u".into())).status_code(), 503);
    assert_eq!(PaymentError::from(GatewayError::InvalidCredentials("c".into())).status_code(), 500);
    assert_eq!(PaymentError::from(GatewayError::AmountLimitExceeded("a".into())).status_code(), 400);
    assert_eq!(PaymentError::from(GatewayError::Unknown("x".into())).status_code(), 500);
  }

  #[test]
  fn taxonomy_status_codes() {
    assert_eq!(PaymentError::validation("email", "bad").status_code(), 400);
    assert_eq!(PaymentError::NotFound("ORD-1".into()).status_code(), 404);
    assert_eq!(PaymentError::Conflict(ConflictReason::AlreadyPaid).status_code(), 409);
    assert_eq!(PaymentError::store(anyhow::anyhow!("db down")).status_code(), 500);
  }

  #[test]
  fn conflict_reasons_follow_current_status() {
    assert_eq!(ConflictReason::for_status(PaymentStatus::Paid), ConflictReason::AlreadyPaid);
    assert_eq!(
      ConflictReason::for_status(PaymentStatus::Processing),
      ConflictReason::AlreadyProcessing
    );
    assert_eq!(PaymentError::Conflict(ConflictReason::AlreadyPaid).to_string(), "payment conflict: already paid");
  }

  #[test]
  fn store_details_stay_out_of_user_messages() {
    let err = PaymentError::store(anyhow::anyhow!("connection refused on 10.0.0.3"));
    assert!(!err.user_message().contains("10.0.0.3"));
    assert_eq!(err.code(), "unknown_error");
  }
}
