// orderpay/src/validation.rs

//! Shape checks on payment initiation input. The first violated field wins.

use crate::error::PaymentError;
use crate::model::{PaymentRequest, ValidatedPayment};
use crate::phone::normalize_phone;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

pub const MAX_DESCRIPTION_CHARS: usize = 100;
const MAX_AMOUNT_SCALE: u32 = 2;

static EMAIL_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("email pattern is a valid regex"));

pub fn is_valid_email(email: &str) -> bool {
  EMAIL_RE.is_match(email)
}

/// Checks `orderId`, `amount`, `phone`, `email` and `description`, in that order.
pub fn validate_payment_request(request: &PaymentRequest, country_code: &str) -> Result<ValidatedPayment, PaymentError> {
  let order_id = request.order_id.trim();
  if order_id.is_empty() {
    return Err(PaymentError::validation("orderId", "Order ID is required."));
  }

  if request.amount <= Decimal::ZERO {
    return Err(PaymentError::validation("amount", "Amount must be greater than zero."));
  }
  if request.amount.normalize().scale() > MAX_AMOUNT_SCALE {
    return Err(PaymentError::validation(
      "amount",
      "Amount may have at most two decimal places.",
    ));
  }

  let phone = normalize_phone(&request.phone, country_code)
    .map_err(|e| PaymentError::validation("phone", format!("Invalid phone number: {e}.")))?;

  let email = request.email.trim();
  if !is_valid_email(email) {
    return Err(PaymentError::validation("email", "A valid email address is required."));
  }

  let description = request
    .description
    .as_deref()
    .map(str::trim)
    .filter(|d| !d.is_empty())
    .map(str::to_string);
  if description.as_ref().is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_CHARS) {
    return Err(PaymentError::validation(
      "description",
      format!("Description may be at most {MAX_DESCRIPTION_CHARS} characters."),
    ));
  }

  Ok(ValidatedPayment {
    order_id: order_id.to_string(),
    amount: request.amount,
    phone,
    email: email.to_string(),
    description,
  })
}
