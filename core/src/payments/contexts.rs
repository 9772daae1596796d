// orderpay/src/payments/contexts.rs

//! Context data the payment flows run against. Handlers receive these wrapped
//! in a [`crate::flow::FlowContext`].

use crate::model::{
  AccessToken, CallbackParams, CallbackSignal, Order, PaymentRequest, PaymentSession, PaymentStatus, TransactionStatus,
  ValidatedPayment,
};
use crate::payments::PaymentServices;

#[derive(Clone)]
pub struct InitiationData {
  pub services: PaymentServices,
  pub request: PaymentRequest,
  pub validated: Option<ValidatedPayment>,
  /// The order as last written by this flow.
  pub order: Option<Order>,
  pub session: Option<PaymentSession>,
}

impl InitiationData {
  pub fn new(services: PaymentServices, request: PaymentRequest) -> Self {
    Self {
      services,
      request,
      validated: None,
      order: None,
      session: None,
    }
  }
}

#[derive(Clone)]
pub struct CallbackData {
  pub services: PaymentServices,
  pub params: CallbackParams,
  /// `(order_tracking_id, merchant_reference)`, set once both are known present.
  pub identifiers: Option<(String, String)>,
  pub token: Option<AccessToken>,
  pub transaction: Option<TransactionStatus>,
  pub order: Option<Order>,
  /// New payment status when this callback changed it.
  pub transitioned_to: Option<PaymentStatus>,
  pub signal: CallbackSignal,
}

impl CallbackData {
  pub fn new(services: PaymentServices, params: CallbackParams) -> Self {
    Self {
      services,
      params,
      identifiers: None,
      token: None,
      transaction: None,
      order: None,
      transitioned_to: None,
      signal: CallbackSignal::Failed,
    }
  }
}
