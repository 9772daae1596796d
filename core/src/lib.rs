// orderpay/src/lib.rs

//! Orderpay: order payment status handling for a storefront paid through a
//! hosted payment gateway.
//!
//! The crate covers:
//!  - Validating payment requests and canonicalising customer phone numbers.
//!  - Initiating a payment: an atomic claim of the order (`pending`/`failed` to
//!    `processing`) before the gateway is called, so an order is never charged
//!    twice and a paid order is never re-initiated.
//!  - Reconciling gateway callbacks against the status fetched back from the
//!    gateway, without ever downgrading a paid order.
//!  - A small flow engine (`flow`) the operations above run on: ordered, named
//!    async steps over shared context data, kept in a type-keyed registry.
//!
//! Persistence, the gateway and notifications are traits in [`ports`]; the
//! service crate supplies PostgreSQL and PesaPal implementations.

pub mod error;
pub mod flow;
pub mod metrics;
pub mod model;
pub mod payments;
pub mod phone;
pub mod ports;
pub mod store;
pub mod validation;

pub use crate::error::{ConflictReason, GatewayError, PaymentError, PaymentResult};
pub use crate::flow::{Flow, FlowContext, FlowError, FlowOutcome, FlowRegistry, StepControl};
pub use crate::metrics::PaymentMetrics;
pub use crate::model::{
  CallbackParams, CallbackSignal, Order, OrderPatch, PaymentMethod, PaymentRequest, PaymentSession, PaymentStatus,
  PaymentStatusView,
};
pub use crate::payments::{
  initiate_payment, payment_status, reconcile_callback, register_payment_flows, PaymentServices, PaymentSettings,
};
pub use crate::ports::{AttemptUpdate, ConditionalUpdate, NoopNotifier, OrderStore, PaymentGateway, PaymentNotifier};
pub use crate::store::InMemoryOrderStore;
