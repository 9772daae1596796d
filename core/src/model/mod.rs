// orderpay/src/model/mod.rs

//! Order entity and the value types exchanged with clients and gateways.

pub mod order;
pub mod payment;

pub use order::{ActivityEntry, Order, OrderPatch, OrderStatus, PaymentMethod, PaymentStatus, TimelineEntry};
pub use payment::{
  AccessToken, CallbackParams, CallbackSignal, GatewayOutcome, GatewayPaymentRequest, PaymentRequest, PaymentSession,
  PaymentStatusView, TransactionStatus, ValidatedPayment,
};
