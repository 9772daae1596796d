// orderpay/src/payments/mod.rs

//! The payment operations: initiation, callback reconciliation and the status
//! read. Initiation and reconciliation run as flows in a [`FlowRegistry`].

pub mod callback;
pub mod contexts;
pub mod initiate;
pub mod status;

use crate::error::PaymentError;
use crate::flow::{FlowContext, FlowError, FlowOutcome, FlowRegistry};
use crate::metrics::PaymentMetrics;
use crate::model::{CallbackParams, CallbackSignal, PaymentRequest, PaymentSession};
use crate::phone::DEFAULT_COUNTRY_CODE;
use crate::ports::{OrderStore, PaymentGateway, PaymentNotifier};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{error, info};

pub use contexts::{CallbackData, InitiationData};
pub use status::payment_status;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSettings {
  /// Country code used to canonicalise local phone numbers.
  pub phone_country_code: String,
  /// Prefix of the gateway description when the request carries none.
  pub default_description: String,
}

impl Default for PaymentSettings {
  fn default() -> Self {
    Self {
      phone_country_code: DEFAULT_COUNTRY_CODE.to_string(),
      default_description: "Payment for order".to_string(),
    }
  }
}

/// Everything the payment flows talk to. Cheap to clone.
#[derive(Clone)]
pub struct PaymentServices {
  pub store: Arc<dyn OrderStore>,
  pub gateway: Arc<dyn PaymentGateway>,
  pub notifier: Arc<dyn PaymentNotifier>,
  pub metrics: Arc<PaymentMetrics>,
  pub settings: PaymentSettings,
}

/// Registers the initiation and callback flows.
pub fn register_payment_flows<AppErr>(registry: &FlowRegistry<AppErr>) -> Result<(), FlowError>
where
  AppErr: From<PaymentError> + From<FlowError> + Send + 'static,
{
  registry.register(initiate::build_initiation_flow()?);
  registry.register(callback::build_callback_flow()?);
  info!("payment flows registered");
  Ok(())
}

/// Validates `request`, claims the order and opens a gateway session for it.
pub async fn initiate_payment<AppErr>(
  registry: &FlowRegistry<AppErr>,
  services: &PaymentServices,
  request: PaymentRequest,
) -> Result<PaymentSession, AppErr>
where
  AppErr: From<PaymentError> + From<FlowError> + Send + 'static,
{
  let ctx = FlowContext::new(InitiationData::new(services.clone(), request));
  let outcome = registry.run(ctx.clone()).await?;
  let session = ctx.with(|d| d.session.clone());

  match (outcome, session) {
    (FlowOutcome::Completed, Some(session)) => Ok(session),
    _ => Err(AppErr::from(PaymentError::Unknown(
      "payment initiation ended without a gateway session".to_string(),
    ))),
  }
}

/// Reconciles a gateway callback and returns the signal for the callback page.
/// Never fails: any error is logged and reported as [`CallbackSignal::Failed`].
pub async fn reconcile_callback<AppErr>(
  registry: &FlowRegistry<AppErr>,
  services: &PaymentServices,
  params: CallbackParams,
) -> CallbackSignal
where
  AppErr: From<FlowError> + Send + Display + 'static,
{
  let ctx = FlowContext::new(CallbackData::new(services.clone(), params));
  let signal = match registry.run(ctx.clone()).await {
    Ok(_) => ctx.with(|d| d.signal),
    Err(e) => {
      let reference = ctx.with(|d| d.identifiers.as_ref().map(|(_, r)| r.clone()));
      error!(order_id = ?reference, error = %e, "payment callback could not be reconciled");
      CallbackSignal::Failed
    }
  };
  services.metrics.callback(signal);
  signal
}
